//! 在线状态注册表 / Presence registry
//!
//! 身份到投递地址的内存映射，心跳续活；只有永久性断开才移除条目，
//! 避免瞬时重连造成上线/下线抖动广播
//! In-memory identity→delivery-address map with heartbeat liveness; only a
//! permanent disconnect removes an entry, so brief reconnects never flap
//! online/offline broadcasts.

use dashmap::DashMap;
use tracing::{debug, info};

/// 断开原因分类 / Disconnect reason classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// 传输层已关闭 / Transport closed
    TransportClosed,
    /// 心跳超时 / Ping timeout
    PingTimeout,
    /// 传输错误，可能即将重连 / Transport error, reconnect pending
    TransportError,
    /// 其他瞬时原因 / Other transient reason
    Transient,
}

impl DisconnectReason {
    /// 是否为永久性断开 / Whether the reason is a permanent disconnect
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            DisconnectReason::TransportClosed | DisconnectReason::PingTimeout
        )
    }
}

/// 在线条目 / Presence entry
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    pub address: String,
    pub connected_at: i64,
    pub last_seen: i64,
}

/// 每个身份至多一个条目，后写覆盖先写 / At most one entry per identity, last write wins
pub struct PresenceRegistry {
    entries: DashMap<String, PresenceEntry>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// 注册连接；覆盖同一身份的旧地址 / Register a connection; overrides any prior address
    pub fn register(&self, identity: &str, address: &str) {
        let now = chrono::Utc::now().timestamp_millis();
        self.entries.insert(
            identity.to_string(),
            PresenceEntry {
                address: address.to_string(),
                connected_at: now,
                last_seen: now,
            },
        );
        info!("🟢 presence registered uid={} addr={}", identity, address);
    }

    /// 心跳只刷新活性，不改地址 / Heartbeat refreshes liveness only, never the address
    pub fn heartbeat(&self, identity: &str) {
        if let Some(mut entry) = self.entries.get_mut(identity) {
            entry.last_seen = chrono::Utc::now().timestamp_millis();
            debug!("💓 heartbeat uid={}", identity);
        }
    }

    /// 按断开原因决定是否移除 / Removal is gated on the disconnect reason
    ///
    /// 返回是否真正移除了条目 / Returns whether the entry was actually removed
    pub fn deregister(&self, identity: &str, reason: DisconnectReason) -> bool {
        if !reason.is_permanent() {
            debug!(
                "🔁 transient disconnect for uid={} ({:?}), keeping presence",
                identity, reason
            );
            return false;
        }
        let removed = self.entries.remove(identity).is_some();
        if removed {
            info!("🔴 presence removed uid={} ({:?})", identity, reason);
        }
        removed
    }

    /// 解析投递地址；缺失表示只能走持久化补投 / Resolve the delivery address; absence means persist-only delivery
    pub fn resolve(&self, identity: &str) -> Option<String> {
        self.entries.get(identity).map(|e| e.address.clone())
    }

    pub fn is_online(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 在线身份快照 / Snapshot of online identities
    pub fn online_identities(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 周期清扫：移除地址已不对应存活连接的条目，限制内存增长
    /// Periodic sweep: drop entries whose address no longer maps to a live
    /// connection, bounding memory growth from abandoned entries
    pub fn sweep<F>(&self, is_live: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !is_live(&e.value().address))
            .map(|e| e.key().clone())
            .collect();
        let count = stale.len();
        for identity in stale {
            self.entries.remove(&identity);
            info!("🧹 swept abandoned presence entry uid={}", identity);
        }
        count
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_last_write_wins() {
        let registry = PresenceRegistry::new();
        registry.register("alice", "conn-1");
        registry.register("alice", "conn-2");
        assert_eq!(registry.resolve("alice"), Some("conn-2".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn heartbeat_keeps_address() {
        let registry = PresenceRegistry::new();
        registry.register("alice", "conn-1");
        registry.heartbeat("alice");
        assert_eq!(registry.resolve("alice"), Some("conn-1".to_string()));
    }

    #[test]
    fn permanent_disconnect_removes_entry() {
        let registry = PresenceRegistry::new();
        registry.register("alice", "conn-1");
        assert!(registry.deregister("alice", DisconnectReason::TransportClosed));
        assert_eq!(registry.resolve("alice"), None);

        registry.register("bob", "conn-2");
        assert!(registry.deregister("bob", DisconnectReason::PingTimeout));
        assert!(!registry.is_online("bob"));
    }

    #[test]
    fn transient_disconnect_keeps_entry() {
        let registry = PresenceRegistry::new();
        registry.register("alice", "conn-1");
        assert!(!registry.deregister("alice", DisconnectReason::TransportError));
        assert!(!registry.deregister("alice", DisconnectReason::Transient));
        assert_eq!(registry.resolve("alice"), Some("conn-1".to_string()));
    }

    #[test]
    fn sweep_removes_dead_addresses_only() {
        let registry = PresenceRegistry::new();
        registry.register("alice", "conn-1");
        registry.register("bob", "conn-2");
        let removed = registry.sweep(|addr| addr == "conn-2");
        assert_eq!(removed, 1);
        assert!(!registry.is_online("alice"));
        assert!(registry.is_online("bob"));
    }
}
