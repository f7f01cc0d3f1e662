//! 投递复用器 / Delivery multiplexer
//!
//! 面向活动连接的即发即忘推送；地址已失效时静默丢弃，不向核心回传错误
//! Fire-and-forget pushes to live connections; a dead address is silently a
//! no-op, no error propagates back into the core.

use std::sync::Arc;

use dashmap::DashMap;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::domain::message::WireMessage;
use crate::server::Connection;

pub trait DeliveryMux: Send + Sync {
    fn push(&self, address: &str, event: &str, payload: serde_json::Value);
}

/// WebSocket投递实现 / WebSocket-backed delivery
pub struct WsDeliveryMux {
    connections: Arc<DashMap<String, Connection>>,
}

impl WsDeliveryMux {
    pub fn new(connections: Arc<DashMap<String, Connection>>) -> Self {
        Self { connections }
    }
}

impl DeliveryMux for WsDeliveryMux {
    fn push(&self, address: &str, event: &str, payload: serde_json::Value) {
        let frame = WireMessage {
            msg_type: event.to_string(),
            data: payload,
        };
        let text = match serde_json::to_string(&frame) {
            Ok(t) => t,
            Err(e) => {
                debug!("⚠️  failed to serialize {} frame: {}", event, e);
                return;
            }
        };
        match self.connections.get(address) {
            Some(conn) => {
                if conn.sender.send(Message::Text(text)).is_err() {
                    debug!("⚠️  connection {} gone before {} push", address, event);
                }
            }
            None => debug!("📭 address {} not live, dropping {} push", address, event),
        }
    }
}
