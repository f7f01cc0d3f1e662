use anyhow::Result;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::domain::message::{ErrorPayload, WireMessage};
use crate::server::BabelServer;

/// 向指定客户端发送消息 / Send message to specific client
impl BabelServer {
    pub async fn send_frame(
        &self,
        client_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let frame = WireMessage {
            msg_type: event.to_string(),
            data: payload,
        };
        let text = serde_json::to_string(&frame)?;
        if let Some(connection) = self.connections.get(client_id) {
            connection
                .sender
                .send(Message::Text(text))
                .map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;
            debug!("📤 Sent {} to client {}", event, client_id);
            Ok(())
        } else {
            warn!("⚠️  Client {} not found for {} delivery", client_id, event);
            Err(anyhow::anyhow!("Client {} not found", client_id))
        }
    }

    /// 对单个请求作用域的错误事件，绝不终止连接 / Request-scoped error event, never tears the connection down
    pub async fn send_error(&self, client_id: &str, kind: &str, message: &str) {
        let payload = serde_json::json!(ErrorPayload {
            kind: kind.to_string(),
            message: message.to_string(),
        });
        if let Err(e) = self.send_frame(client_id, "error", payload).await {
            debug!("⚠️  error event undeliverable to {}: {}", client_id, e);
        }
    }

    /// 发送关闭消息 / Send close message
    pub async fn send_close_message(&self, client_id: &str) -> Result<()> {
        if let Some(connection) = self.connections.get(client_id) {
            connection
                .sender
                .send(Message::Close(Some(
                    tokio_tungstenite::tungstenite::protocol::CloseFrame {
                        code: tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::Normal,
                        reason: std::borrow::Cow::Borrowed("Connection timeout"),
                    },
                )))
                .map_err(|e| anyhow::anyhow!("Failed to send close message: {}", e))?;
            debug!("🔒 Sent close message to client {}", client_id);
            Ok(())
        } else {
            Err(anyhow::anyhow!("Client {} not found for close message", client_id))
        }
    }

    /// 广播事件给所有在线连接 / Broadcast an event to every live connection
    pub async fn broadcast_frame(&self, event: &str, payload: serde_json::Value) {
        let frame = WireMessage {
            msg_type: event.to_string(),
            data: payload,
        };
        let text = match serde_json::to_string(&frame) {
            Ok(t) => t,
            Err(e) => {
                warn!("⚠️  broadcast serialization failed: {}", e);
                return;
            }
        };
        let mut disconnected = Vec::new();
        for entry in self.connections.iter() {
            if entry
                .value()
                .sender
                .send(Message::Text(text.clone()))
                .is_err()
            {
                disconnected.push(entry.key().clone());
            }
        }
        for client_id in disconnected {
            self.connections.remove(&client_id);
        }
    }
}
