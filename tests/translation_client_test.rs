//! 翻译客户端集成测试 / Translation client integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use babel_im::error::{RelayError, RelayResult};
use babel_im::providers::TranslationProvider;
use babel_im::translate::TranslationClient;

struct ScriptedProvider {
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    /// 前N次调用返回的错误 / Errors returned for the first N calls
    fail_first: Mutex<Vec<RelayError>>,
}

impl ScriptedProvider {
    fn ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            fail_first: Mutex::new(Vec::new()),
        }
    }

    fn failing_with(errors: Vec<RelayError>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            fail_first: Mutex::new(errors),
        }
    }
}

#[async_trait]
impl TranslationProvider for ScriptedProvider {
    async fn translate_batch(
        &self,
        texts: &[String],
        _source: Option<&str>,
        target: &str,
    ) -> RelayResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().push(texts.len());
        {
            let mut fail = self.fail_first.lock();
            if !fail.is_empty() {
                return Err(fail.remove(0));
            }
        }
        Ok(texts.iter().map(|t| format!("{}:{}", target, t)).collect())
    }

    async fn supported_languages(&self) -> RelayResult<Vec<String>> {
        Ok(vec!["en".into(), "fr".into()])
    }
}

fn client_with(provider: Arc<ScriptedProvider>, max_attempts: u32) -> TranslationClient {
    TranslationClient::new(provider, 100, Duration::from_secs(3600), 3, max_attempts)
}

#[tokio::test]
async fn same_language_and_blank_text_short_circuit() {
    let provider = Arc::new(ScriptedProvider::ok());
    let client = client_with(provider.clone(), 3);

    assert_eq!(client.translate("hello", "en", "en-US").await.unwrap(), "hello");
    assert_eq!(client.translate("   ", "en", "fr").await.unwrap(), "   ");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repeated_requests_hit_the_cache() {
    let provider = Arc::new(ScriptedProvider::ok());
    let client = client_with(provider.clone(), 3);

    let first = client.translate("hello", "en", "fr").await.unwrap();
    let second = client.translate("hello", "en", "fr").await.unwrap();
    assert_eq!(first, "fr:hello");
    assert_eq!(first, second);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn batch_output_matches_input_order_and_length() {
    let provider = Arc::new(ScriptedProvider::ok());
    let client = client_with(provider.clone(), 3);

    // 预热缓存让中间条目命中 / Warm the cache so the middle item is a hit
    client.translate("two", "en", "fr").await.unwrap();

    let texts: Vec<String> = ["one", "two", "three", "", "five"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let out = client.translate_batch(&texts, "en", "fr").await.unwrap();

    assert_eq!(out.len(), texts.len());
    assert_eq!(out[0], "fr:one");
    assert_eq!(out[1], "fr:two");
    assert_eq!(out[2], "fr:three");
    assert_eq!(out[3], "");
    assert_eq!(out[4], "fr:five");
}

#[tokio::test]
async fn batch_respects_the_provider_chunk_limit() {
    let provider = Arc::new(ScriptedProvider::ok());
    let client = client_with(provider.clone(), 3);

    let texts: Vec<String> = (0..7).map(|i| format!("text-{}", i)).collect();
    client.translate_batch(&texts, "en", "fr").await.unwrap();

    // 块大小3：7条未命中 → 3+3+1 / Chunk size 3: 7 misses split into 3+3+1
    assert_eq!(*provider.batch_sizes.lock(), vec![3, 3, 1]);
}

#[tokio::test(start_paused = true)]
async fn transient_errors_are_retried_within_budget() {
    let provider = Arc::new(ScriptedProvider::failing_with(vec![
        RelayError::Provider("blip".into()),
        RelayError::Timeout("slow".into()),
    ]));
    let client = client_with(provider.clone(), 3);

    let out = client.translate("hello", "en", "fr").await.unwrap();
    assert_eq!(out, "fr:hello");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn rate_limiting_grants_exactly_one_extra_attempt() {
    let provider = Arc::new(ScriptedProvider::failing_with(vec![
        RelayError::RateLimited { retry_after_secs: 2 },
        RelayError::RateLimited { retry_after_secs: 2 },
    ]));
    let client = client_with(provider.clone(), 3);

    // 限流不进入常规重试预算，只按提示等待后补一次
    // Rate limiting skips the normal retry budget; one extra attempt follows the hint
    let err = client.translate("hello", "en", "fr").await.unwrap_err();
    assert!(matches!(err, RelayError::RateLimited { .. }));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_then_success_recovers() {
    let provider = Arc::new(ScriptedProvider::failing_with(vec![RelayError::RateLimited {
        retry_after_secs: 1,
    }]));
    let client = client_with(provider.clone(), 3);

    let out = client.translate("hello", "en", "fr").await.unwrap();
    assert_eq!(out, "fr:hello");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalid_input_errors_fail_fast() {
    let provider = Arc::new(ScriptedProvider::failing_with(vec![
        RelayError::InvalidLanguage("zz".into()),
        RelayError::InvalidLanguage("zz".into()),
    ]));
    let client = client_with(provider.clone(), 3);

    let err = client.translate("hello", "en", "zz").await.unwrap_err();
    assert!(matches!(err, RelayError::InvalidLanguage(_)));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}
