use anyhow::Result;

use super::{AudioResultRecord, MessageRecord};

/// 存储契约，便于测试替换 / Storage contract, easy to substitute in tests
///
/// 只追加；历史仅在显式迁移时回填缺失的旧字段，且迁移可重复执行
/// Append-only; history is touched only by the explicit legacy-field
/// migration, which is idempotent.
pub trait MessageStore: Send + Sync {
    fn append_message(&self, rec: &MessageRecord) -> Result<String>;
    fn append_audio_result(&self, rec: &AudioResultRecord) -> Result<String>;

    /// 回填缺失的`original_content`/`original_language`；返回改动条数
    /// Backfill missing `original_content`/`original_language`; returns the
    /// number of records changed
    fn migrate_legacy_fields(&self) -> Result<usize>;
}
