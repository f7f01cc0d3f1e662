//! 房间注册表 / Room registry
//!
//! 首次加入隐式建房，成员清空即销毁；不做跨进程持久化
//! Rooms are created implicitly on first join and destroyed when membership
//! empties; no persistence beyond process lifetime.

use dashmap::{DashMap, DashSet};
use tracing::{debug, info};

pub struct RoomRegistry {
    rooms: DashMap<String, DashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// 加入房间；不存在则创建 / Join a room, creating it if absent
    pub fn join(&self, room_id: &str, identity: &str) {
        let members = self.rooms.entry(room_id.to_string()).or_default();
        members.insert(identity.to_string());
        info!("🚪 uid={} joined room={}", identity, room_id);
    }

    /// 离开房间；最后一名成员离开即销毁 / Leave a room; the last member's exit destroys it
    pub fn leave(&self, room_id: &str, identity: &str) {
        let emptied = if let Some(members) = self.rooms.get(room_id) {
            members.remove(identity);
            members.is_empty()
        } else {
            false
        };
        if emptied {
            self.rooms.remove_if(room_id, |_, members| members.is_empty());
            debug!("🗑️  room={} destroyed (empty)", room_id);
        }
    }

    /// 将身份从其所有房间移除 / Remove an identity from every room it joined
    pub fn leave_all(&self, identity: &str) {
        let room_ids: Vec<String> = self.rooms.iter().map(|e| e.key().clone()).collect();
        for room_id in room_ids {
            self.leave(&room_id, identity);
        }
    }

    /// 房间成员快照 / Snapshot of room members
    pub fn members(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|set| set.iter().map(|m| m.clone()).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_create_and_destroy_on_empty() {
        let rooms = RoomRegistry::new();
        assert!(!rooms.contains("lobby"));
        rooms.join("lobby", "alice");
        rooms.join("lobby", "bob");
        assert!(rooms.contains("lobby"));
        assert_eq!(rooms.members("lobby").len(), 2);

        rooms.leave("lobby", "alice");
        assert!(rooms.contains("lobby"));
        rooms.leave("lobby", "bob");
        assert!(!rooms.contains("lobby"));
    }

    #[test]
    fn leave_all_clears_every_membership() {
        let rooms = RoomRegistry::new();
        rooms.join("a", "alice");
        rooms.join("b", "alice");
        rooms.join("b", "bob");
        rooms.leave_all("alice");
        assert!(!rooms.contains("a"));
        assert_eq!(rooms.members("b"), vec!["bob".to_string()]);
    }
}
