use crate::server::BabelServer;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

/// 周期清扫无主在线条目 / Periodically sweep abandoned presence entries
///
/// 条目的投递地址若已无存活连接则移除，兜底处理投递通道静默失效的情况
/// An entry whose delivery address no longer maps to a live connection is
/// removed, covering the case where the delivery channel died silently.
pub fn spawn_presence_sweep_task(
    server: Arc<BabelServer>,
    sweep_secs: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut sweep_interval = interval(Duration::from_secs(sweep_secs.max(1)));
        loop {
            tokio::select! {
                _ = sweep_interval.tick() => {
                    let removed = server
                        .presence
                        .sweep(|address| server.connections.contains_key(address));
                    if removed > 0 {
                        tracing::info!("🧹 presence sweep removed {} entries", removed);
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() { break; }
                }
            }
        }
    });
}
