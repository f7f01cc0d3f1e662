//! 存储模块 - 数据结构定义
//! Storage Module - Data Structure Definitions
//!
//! 持久化本体归外部协作方所有，核心只追加记录；此处保留记录结构、
//! 追加契约与一套内存实现
//! Persistence proper is owned by an external collaborator and the core only
//! appends records; this module keeps the record structs, the append-only
//! contract and an in-memory implementation.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::MessageStore;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 消息记录 / Message record
///
/// 构建期仅由FanoutRouter修改，落库后不可变（只追加）
/// Mutated only by the FanoutRouter during construction, then persisted
/// immutably (append-only).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: String,
    pub from_uid: String,
    pub to_uid: Option<String>,
    pub room_id: Option<String>,
    pub content: String,
    /// 历史记录可能缺失，由迁移回填 / May be absent on legacy records, backfilled by migration
    pub original_content: Option<String>,
    pub original_language: Option<String>,
    #[serde(default)]
    pub translations: HashMap<String, String>,
    pub timestamp: i64,
    pub msg_type: String,
}

/// 语音翻译结果记录 / Audio translation result record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioResultRecord {
    pub result_id: String,
    pub uid: String,
    pub source_language: String,
    pub target_language: String,
    pub original_text: String,
    pub translated_text: String,
    pub timestamp: i64,
}
