use crate::server::BabelServer;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

/// 清理周期按超时时长分档，且永不为零 / Cleanup period tiered by the timeout, never zero
fn cleanup_interval_ms(timeout_ms: u64) -> u64 {
    if timeout_ms <= 1000 {
        (timeout_ms / 2).max(1)
    } else if timeout_ms <= 10000 {
        1000
    } else {
        5000
    }
}

/// 周期清理心跳超时连接 / Periodically clean up heartbeat-timeout connections
pub fn spawn_cleanup_task(
    server: Arc<BabelServer>,
    timeout_ms: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let cleanup_interval_ms = cleanup_interval_ms(timeout_ms);
        tracing::info!(
            "⏰ Cleanup interval set to {}ms for timeout {}ms",
            cleanup_interval_ms,
            timeout_ms
        );
        let mut cleanup_interval = interval(Duration::from_millis(cleanup_interval_ms));
        loop {
            tokio::select! {
                _ = cleanup_interval.tick() => {
                    server.cleanup_timeout_connections(timeout_ms).await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() { break; }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_tiered_and_never_zero() {
        // interval(Duration::ZERO)会panic，最小周期必须为1ms
        // interval(Duration::ZERO) panics, so the floor is 1ms
        assert_eq!(cleanup_interval_ms(0), 1);
        assert_eq!(cleanup_interval_ms(1), 1);
        assert_eq!(cleanup_interval_ms(1000), 500);
        assert_eq!(cleanup_interval_ms(5000), 1000);
        assert_eq!(cleanup_interval_ms(60000), 5000);
    }
}
