//! 用户目录协作方 / User-directory collaborator
//!
//! 核心只读取身份的偏好语言；目录本体归外部服务所有
//! The core only reads an identity's preferred language; the directory
//! itself is owned by an external service.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::lang::DEFAULT_LANG;

#[async_trait]
pub trait Directory: Send + Sync {
    /// 查询偏好语言；未知身份回退默认语言 / Preferred language; unknown identities fall back to the default
    async fn preferred_language(&self, identity: &str) -> String;
}

/// 内存目录实现，用于单进程部署与测试 / In-memory directory for single-process deployments and tests
pub struct InMemoryDirectory {
    languages: DashMap<String, String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            languages: DashMap::new(),
        }
    }

    pub fn set_language(&self, identity: &str, lang: &str) {
        self.languages
            .insert(identity.to_string(), crate::lang::normalize_lang(lang));
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn preferred_language(&self, identity: &str) -> String {
        self.languages
            .get(identity)
            .map(|l| l.clone())
            .unwrap_or_else(|| DEFAULT_LANG.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_identity_defaults_to_english() {
        let dir = InMemoryDirectory::new();
        assert_eq!(dir.preferred_language("ghost").await, "en");
        dir.set_language("alice", "fr-FR");
        assert_eq!(dir.preferred_language("alice").await, "fr");
    }
}
