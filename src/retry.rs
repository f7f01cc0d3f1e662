//! 通用重试工具 - 封顶指数退避
//! Generic retry utility with capped exponential backoff
//!
//! 三个能力客户端共享同一退避曲线，各自只提供可重试判定
//! All three capability clients share one backoff curve and supply only
//! their own retryable-error predicate.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{RelayError, RelayResult};

/// 退避基数与上限（毫秒） / Backoff base and cap in milliseconds
const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 8000;

/// 第attempt次失败后的退避时长，单调不减且封顶
/// Backoff after the given zero-based attempt, monotonically non-decreasing and capped
pub fn backoff_delay(attempt: u32) -> Duration {
    let ms = BACKOFF_BASE_MS
        .saturating_mul(1u64 << attempt.min(16))
        .min(BACKOFF_CAP_MS);
    Duration::from_millis(ms)
}

/// 以封顶指数退避重试异步操作 / Retry an async operation with capped exponential backoff
///
/// `max_attempts` 为总尝试次数；不可重试的错误立即返回
/// `max_attempts` is the total attempt count; non-retryable errors return immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    op_name: &str,
    max_attempts: u32,
    mut op: F,
) -> RelayResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RelayResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_err = RelayError::Provider(format!("{}: no attempt made", op_name));
    for attempt in 0..max_attempts {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() => {
                warn!(
                    "⚠️  {} attempt {}/{} failed: {}",
                    op_name,
                    attempt + 1,
                    max_attempts,
                    e
                );
                last_err = e;
                if attempt + 1 < max_attempts {
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_is_monotonic_and_capped() {
        let mut prev = Duration::ZERO;
        for attempt in 0..10 {
            let d = backoff_delay(attempt);
            assert!(d >= prev);
            assert!(d <= Duration::from_millis(BACKOFF_CAP_MS));
            prev = d;
        }
        assert_eq!(backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(5), Duration::from_millis(8000));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_budget() {
        let calls = AtomicU32::new(0);
        let res: RelayResult<()> = retry_with_backoff("test", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RelayError::Provider("boom".into())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(res, Err(RelayError::Provider("boom".into())));
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_fast() {
        let calls = AtomicU32::new(0);
        let res: RelayResult<()> = retry_with_backoff("test", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RelayError::InvalidInput("empty".into())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(res, Err(RelayError::InvalidInput("empty".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let res = retry_with_backoff("test", 3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RelayError::Timeout("slow".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(res, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
