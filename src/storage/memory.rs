//! 内存存储实现 / In-memory store implementation

use anyhow::Result;
use parking_lot::RwLock;
use tracing::info;

use crate::lang::DEFAULT_LANG;

use super::traits::MessageStore;
use super::{AudioResultRecord, MessageRecord};

pub struct MemoryStore {
    messages: RwLock<Vec<MessageRecord>>,
    audio_results: RwLock<Vec<AudioResultRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            audio_results: RwLock::new(Vec::new()),
        }
    }

    /// 测试与诊断用快照 / Snapshot for tests and diagnostics
    pub fn messages(&self) -> Vec<MessageRecord> {
        self.messages.read().clone()
    }

    pub fn audio_results(&self) -> Vec<AudioResultRecord> {
        self.audio_results.read().clone()
    }

    /// 预置一条记录（如旧版历史） / Seed a record, e.g. legacy history
    pub fn seed_message(&self, rec: MessageRecord) {
        self.messages.write().push(rec);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore for MemoryStore {
    fn append_message(&self, rec: &MessageRecord) -> Result<String> {
        self.messages.write().push(rec.clone());
        Ok(rec.message_id.clone())
    }

    fn append_audio_result(&self, rec: &AudioResultRecord) -> Result<String> {
        self.audio_results.write().push(rec.clone());
        Ok(rec.result_id.clone())
    }

    fn migrate_legacy_fields(&self) -> Result<usize> {
        let mut changed = 0usize;
        let mut messages = self.messages.write();
        for rec in messages.iter_mut() {
            // 已迁移的记录保持原样 / Already-migrated records stay untouched
            if rec.original_content.is_some() && rec.original_language.is_some() {
                continue;
            }
            if rec.original_content.is_none() {
                rec.original_content = Some(rec.content.clone());
            }
            if rec.original_language.is_none() {
                rec.original_language = Some(DEFAULT_LANG.to_string());
            }
            if let (Some(lang), Some(text)) = (&rec.original_language, &rec.original_content) {
                rec.translations
                    .entry(lang.clone())
                    .or_insert_with(|| text.clone());
            }
            changed += 1;
        }
        if changed > 0 {
            info!("🧳 migrated {} legacy message records", changed);
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn legacy_record(id: &str) -> MessageRecord {
        MessageRecord {
            message_id: id.to_string(),
            from_uid: "alice".into(),
            to_uid: Some("bob".into()),
            room_id: None,
            content: "hello".into(),
            original_content: None,
            original_language: None,
            translations: HashMap::new(),
            timestamp: 1,
            msg_type: "message".into(),
        }
    }

    #[test]
    fn append_is_append_only() {
        let store = MemoryStore::new();
        let id = store.append_message(&legacy_record("m1")).unwrap();
        assert_eq!(id, "m1");
        store.append_message(&legacy_record("m2")).unwrap();
        assert_eq!(store.messages().len(), 2);
    }

    #[test]
    fn migration_backfills_legacy_fields() {
        let store = MemoryStore::new();
        store.seed_message(legacy_record("m1"));
        let changed = store.migrate_legacy_fields().unwrap();
        assert_eq!(changed, 1);
        let rec = &store.messages()[0];
        assert_eq!(rec.original_content.as_deref(), Some("hello"));
        assert_eq!(rec.original_language.as_deref(), Some("en"));
        assert_eq!(rec.translations.get("en").map(String::as_str), Some("hello"));
    }

    #[test]
    fn migration_is_idempotent() {
        let store = MemoryStore::new();
        store.seed_message(legacy_record("m1"));
        store.migrate_legacy_fields().unwrap();
        let before = store.messages();
        let changed = store.migrate_legacy_fields().unwrap();
        assert_eq!(changed, 0);
        let after = store.messages();
        assert_eq!(before[0].original_content, after[0].original_content);
        assert_eq!(before[0].translations, after[0].translations);
    }
}
