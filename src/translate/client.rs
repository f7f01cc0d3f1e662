//! 翻译客户端 / Translation client
//!
//! 对远程文本翻译能力的无状态外观，内部持有有界缓存与重试策略
//! A stateless-facing wrapper over the remote text-translation capability,
//! owning the bounded result cache and the retry/backoff policy.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{RelayError, RelayResult};
use crate::lang::normalize_lang;
use crate::providers::TranslationProvider;
use crate::retry::retry_with_backoff;

use super::cache::{CacheKey, TranslationCache};

pub struct TranslationClient {
    provider: Arc<dyn TranslationProvider>,
    cache: TranslationCache,
    batch_chunk_size: usize,
    max_attempts: u32,
}

impl TranslationClient {
    pub fn new(
        provider: Arc<dyn TranslationProvider>,
        cache_max_entries: usize,
        cache_ttl: Duration,
        batch_chunk_size: usize,
        max_attempts: u32,
    ) -> Self {
        Self {
            provider,
            cache: TranslationCache::new(cache_max_entries, cache_ttl),
            batch_chunk_size: batch_chunk_size.max(1),
            max_attempts,
        }
    }

    /// 翻译单条文本 / Translate a single text
    ///
    /// 同语言或空白文本直接原样返回，不产生网络调用；成功结果先入缓存再返回
    /// Same-language or blank text short-circuits without a network call;
    /// successes are cached before returning.
    pub async fn translate(&self, text: &str, source: &str, target: &str) -> RelayResult<String> {
        let source = normalize_lang(source);
        let target = normalize_lang(target);
        if source == target || text.trim().is_empty() {
            return Ok(text.to_string());
        }
        let key = CacheKey {
            source: source.clone(),
            target: target.clone(),
            text: text.to_string(),
        };
        if let Some(hit) = self.cache.get(&key) {
            debug!("🗂️  translation cache hit {}→{}", source, target);
            return Ok(hit);
        }
        let mut results = self
            .call_provider(std::slice::from_ref(&key.text), &source, &target)
            .await?;
        let translated = results.pop().unwrap_or_default();
        self.cache.insert(key, translated.clone());
        Ok(translated)
    }

    /// 批量翻译，输出与输入同长同序 / Batch translate; output matches input length and order
    ///
    /// 缓存命中不发网络请求并按原位置拼回；未命中按供应商限长分块提交；
    /// 任一分块的供应商错误中止整批并上抛
    /// Cache hits are served without a network call and spliced back into
    /// position; misses go out in provider-size-limited chunks; a chunk-level
    /// provider error aborts the whole batch.
    pub async fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> RelayResult<Vec<String>> {
        let source = normalize_lang(source);
        let target = normalize_lang(target);
        if source == target {
            return Ok(texts.to_vec());
        }

        let mut results: Vec<Option<String>> = vec![None; texts.len()];
        let mut pending: Vec<(usize, String)> = Vec::new();
        for (idx, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                results[idx] = Some(text.clone());
                continue;
            }
            let key = CacheKey {
                source: source.clone(),
                target: target.clone(),
                text: text.clone(),
            };
            match self.cache.get(&key) {
                Some(hit) => results[idx] = Some(hit),
                None => pending.push((idx, text.clone())),
            }
        }

        for chunk in pending.chunks(self.batch_chunk_size) {
            let chunk_texts: Vec<String> = chunk.iter().map(|(_, t)| t.clone()).collect();
            let translated = self.call_provider(&chunk_texts, &source, &target).await?;
            for ((idx, original), value) in chunk.iter().zip(translated) {
                self.cache.insert(
                    CacheKey {
                        source: source.clone(),
                        target: target.clone(),
                        text: original.clone(),
                    },
                    value.clone(),
                );
                results[*idx] = Some(value);
            }
        }

        Ok(results
            .into_iter()
            .map(|slot| slot.unwrap_or_default())
            .collect())
    }

    /// 带预算的供应商调用；限流时按提示退避后额外重试一次
    /// Provider call within the retry budget; rate limiting honors the hint
    /// and grants exactly one extra attempt outside that budget
    async fn call_provider(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> RelayResult<Vec<String>> {
        let attempt = retry_with_backoff("translate", self.max_attempts, || {
            self.provider.translate_batch(texts, Some(source), target)
        })
        .await;
        match attempt {
            Err(RelayError::RateLimited { retry_after_secs }) => {
                warn!(
                    "⏳ translation rate limited, retrying once after {}s",
                    retry_after_secs
                );
                tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                retry_with_backoff("translate", self.max_attempts, || {
                    self.provider.translate_batch(texts, Some(source), target)
                })
                .await
            }
            other => other,
        }
    }
}
