//! 进入消息分发 / Incoming message dispatch
//!
//! 能力层错误在此转换为面向该请求的error事件；任何一条消息的失败都不会
//! 影响同连接的后续请求或其他连接
//! Capability errors become request-scoped error events here; one message's
//! failure never disturbs later requests on the same connection or any other
//! connection.

use std::time::Instant;

use anyhow::Result;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::audio::{to_base64, AudioInput};
use crate::domain::message::{
    AudioTranscriptPayload, SendMessageRequest, TranslateAudioRequest, TranslatedAudioPayload,
    TranslatedTextPair, WireMessage,
};
use crate::presence::DisconnectReason;
use crate::server::BabelServer;
use crate::storage::{AudioResultRecord, MessageStore};

impl BabelServer {
    /// 自动更新心跳时间 / Automatically update heartbeat time
    pub async fn update_heartbeat(&self, client_id: &str) {
        if let Some(connection) = self.connections.get(client_id) {
            *connection.last_heartbeat.lock() = Instant::now();
            if let Some(uid) = &connection.uid {
                self.presence.heartbeat(uid);
            }
            debug!("💓 Updated heartbeat for client {}", client_id);
        }
    }

    /// 清理超时连接 / Clean up timeout connections
    ///
    /// 心跳超时按永久断开处理 / A heartbeat timeout counts as a permanent disconnect
    pub async fn cleanup_timeout_connections(&self, timeout_ms: u64) {
        let mut expired = Vec::new();
        for entry in self.connections.iter() {
            if entry.value().last_heartbeat.lock().elapsed().as_millis() > timeout_ms as u128 {
                expired.push(entry.key().clone());
            }
        }
        for client_id in expired {
            if let Err(e) = self.send_close_message(&client_id).await {
                debug!("close message to {} failed: {}", client_id, e);
            }
            let removed = self.connections.remove(&client_id);
            info!("🧹 Cleaned up timeout connection: {}", client_id);
            if let Some((_, connection)) = removed {
                if let Some(uid) = connection.uid {
                    self.drop_identity(&uid, DisconnectReason::PingTimeout).await;
                }
            }
        }
    }

    /// 永久断开时撤销身份状态并广播下线 / On a permanent disconnect, revoke identity state and broadcast offline
    pub async fn drop_identity(&self, uid: &str, reason: DisconnectReason) {
        if self.presence.deregister(uid, reason) {
            self.rooms.leave_all(uid);
            self.broadcast_frame("userOffline", serde_json::json!({ "uid": uid }))
                .await;
        }
    }

    pub async fn handle_incoming_message(&self, message: Message, client_id: &str) -> Result<()> {
        self.update_heartbeat(client_id).await;
        match message {
            Message::Text(text) => {
                debug!("📨 Received text from {}: {}", client_id, text);
                match serde_json::from_str::<WireMessage>(&text) {
                    Ok(frame) => self.dispatch_frame(frame, client_id).await?,
                    Err(e) => {
                        warn!("⚠️  Invalid JSON from {}: {}", client_id, e);
                        self.send_error(client_id, "invalid_input", "Invalid JSON format")
                            .await;
                    }
                }
            }
            Message::Binary(data) => {
                debug!("📦 Received binary from {}: {} bytes", client_id, data.len());
                self.send_error(
                    client_id,
                    "invalid_input",
                    "binary frames not supported, send translateAudio with base64 audio",
                )
                .await;
            }
            // pong由tokio-tungstenite自动处理 / pong handled by tokio-tungstenite
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => {}
        }
        Ok(())
    }

    async fn dispatch_frame(&self, frame: WireMessage, client_id: &str) -> Result<()> {
        match frame.msg_type.as_str() {
            "ping" => {
                debug!("🏓 Ping from {}", client_id);
                self.send_frame(
                    client_id,
                    "pong",
                    serde_json::json!({
                        "timestamp": chrono::Utc::now().timestamp_millis(),
                        "clientId": client_id
                    }),
                )
                .await?;
            }
            "auth" => self.handle_auth(&frame.data, client_id).await?,
            "joinRoom" => self.handle_join_room(&frame.data, client_id).await?,
            "leaveRoom" => self.handle_leave_room(&frame.data, client_id).await?,
            "sendMessage" => self.handle_send_message(&frame.data, client_id).await?,
            "translateAudio" => self.handle_translate_audio(&frame.data, client_id).await?,
            "callUser" => {
                self.relay_signal(&frame.data, client_id, "incomingCall")
                    .await?
            }
            "answerCall" => {
                self.relay_signal(&frame.data, client_id, "callAnswered")
                    .await?
            }
            "iceCandidate" => {
                self.relay_signal(&frame.data, client_id, "iceCandidate")
                    .await?
            }
            "endCall" => self.relay_signal(&frame.data, client_id, "callEnded").await?,
            "onlineUsers" => {
                let users = self.presence.online_identities();
                self.send_frame(client_id, "onlineUsersResponse", serde_json::json!(users))
                    .await?;
            }
            other => {
                warn!("⚠️  Unknown message type from {}: {}", client_id, other);
                self.send_error(
                    client_id,
                    "invalid_input",
                    &format!("Unknown message type: {}", other),
                )
                .await;
            }
        }
        Ok(())
    }

    /// 认证并注册在线状态 / Authenticate and register presence
    ///
    /// 令牌校验归外部认证服务；这里只要求令牌与uid非空
    /// Token validation belongs to the external auth service; only non-empty
    /// token and uid are required here.
    async fn handle_auth(&self, data: &serde_json::Value, client_id: &str) -> Result<()> {
        info!("🔐 Auth request from {}", client_id);
        let token = data.get("token").and_then(|v| v.as_str()).unwrap_or("");
        let uid = data.get("uid").and_then(|v| v.as_str()).unwrap_or("");
        if token.is_empty() || uid.is_empty() {
            self.send_frame(
                client_id,
                "authResponse",
                serde_json::json!({"status": "failed", "message": "Authentication failed"}),
            )
            .await?;
            return Ok(());
        }
        if let Some(mut connection) = self.connections.get_mut(client_id) {
            connection.uid = Some(uid.to_string());
        }
        if let Some(lang) = data.get("language").and_then(|v| v.as_str()) {
            self.directory.set_language(uid, lang);
        }
        self.presence.register(uid, client_id);
        self.send_frame(
            client_id,
            "authResponse",
            serde_json::json!({"status": "success", "message": "Authentication successful"}),
        )
        .await?;
        self.broadcast_frame("userOnline", serde_json::json!({ "uid": uid }))
            .await;
        Ok(())
    }

    async fn handle_join_room(&self, data: &serde_json::Value, client_id: &str) -> Result<()> {
        let room_id = match data.get("roomId").and_then(|v| v.as_str()) {
            Some(r) => r,
            None => {
                self.send_error(client_id, "invalid_input", "joinRoom requires roomId")
                    .await;
                return Ok(());
            }
        };
        match self.uid_of(client_id) {
            Some(uid) => {
                self.rooms.join(room_id, &uid);
                self.send_frame(
                    client_id,
                    "joinRoomOk",
                    serde_json::json!({ "roomId": room_id }),
                )
                .await?;
            }
            None => {
                self.send_error(client_id, "invalid_input", "joinRoom requires auth")
                    .await;
            }
        }
        Ok(())
    }

    async fn handle_leave_room(&self, data: &serde_json::Value, client_id: &str) -> Result<()> {
        if let (Some(room_id), Some(uid)) = (
            data.get("roomId").and_then(|v| v.as_str()),
            self.uid_of(client_id),
        ) {
            self.rooms.leave(room_id, &uid);
            self.send_frame(
                client_id,
                "leaveRoomOk",
                serde_json::json!({ "roomId": room_id }),
            )
            .await?;
        }
        Ok(())
    }

    async fn handle_send_message(&self, data: &serde_json::Value, client_id: &str) -> Result<()> {
        let uid = match self.uid_of(client_id) {
            Some(uid) => uid,
            None => {
                self.send_error(client_id, "invalid_input", "sendMessage requires auth")
                    .await;
                return Ok(());
            }
        };
        let request: SendMessageRequest = match serde_json::from_value(data.clone()) {
            Ok(r) => r,
            Err(e) => {
                self.send_error(client_id, "invalid_input", &format!("bad sendMessage: {}", e))
                    .await;
                return Ok(());
            }
        };
        info!("💬 Message from {}", uid);

        let outcome = match (&request.room_id, &request.receiver_id) {
            (Some(room_id), _) => self.fanout.route_room(&uid, &request.message, room_id).await,
            (None, Some(receiver)) => {
                self.fanout
                    .route_direct(&uid, &request.message, receiver)
                    .await
            }
            (None, None) => {
                self.send_error(
                    client_id,
                    "invalid_input",
                    "sendMessage requires roomId or receiverId",
                )
                .await;
                return Ok(());
            }
        };

        match outcome {
            Ok(outcome) => {
                // 发送方只收到自己的原文回执 / The sender only ever sees their own original text
                let delivered = outcome.deliveries.iter().filter(|d| d.online).count();
                self.send_frame(
                    client_id,
                    "messageSent",
                    serde_json::json!({
                        "messageId": outcome.record.message_id,
                        "content": outcome.record.content,
                        "deliveredCount": delivered,
                        "timestamp": outcome.record.timestamp,
                    }),
                )
                .await?;
            }
            Err(e) => {
                warn!("❌ fan-out failed for {}: {}", uid, e);
                self.send_error(client_id, "provider", "message could not be delivered")
                    .await;
            }
        }
        Ok(())
    }

    async fn handle_translate_audio(
        &self,
        data: &serde_json::Value,
        client_id: &str,
    ) -> Result<()> {
        let request: TranslateAudioRequest = match serde_json::from_value(data.clone()) {
            Ok(r) => r,
            Err(e) => {
                self.send_error(
                    client_id,
                    "invalid_input",
                    &format!("bad translateAudio: {}", e),
                )
                .await;
                return Ok(());
            }
        };
        let input = match AudioInput::from_json(&request.audio) {
            Ok(input) => input,
            Err(e) => {
                self.send_error(client_id, e.kind(), &e.to_string()).await;
                return Ok(());
            }
        };

        let result = self
            .pipeline
            .run(input, &request.source_language, &request.target_language)
            .await;

        // 部分成功时已得文本仍然回显给用户 / Partial successes still surface the obtained text
        if !result.original_text.is_empty() {
            self.send_frame(
                client_id,
                "audioTranscript",
                serde_json::json!(AudioTranscriptPayload {
                    text: result.original_text.clone(),
                    is_local: true,
                }),
            )
            .await?;
        }

        if result.is_ok() {
            let uid = request
                .user_id
                .or_else(|| self.uid_of(client_id))
                .unwrap_or_else(|| client_id.to_string());
            let record = AudioResultRecord {
                result_id: uuid::Uuid::new_v4().to_string(),
                uid,
                source_language: request.source_language.clone(),
                target_language: request.target_language.clone(),
                original_text: result.original_text.clone(),
                translated_text: result.translated_text.clone(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            };
            if let Err(e) = self.store.append_audio_result(&record) {
                warn!("⚠️  audio result persistence failed: {}", e);
            }
            let audio_b64 = result.audio.as_deref().map(to_base64);
            self.send_frame(
                client_id,
                "translatedAudio",
                serde_json::json!(TranslatedAudioPayload {
                    text: TranslatedTextPair {
                        original: result.original_text,
                        translated: result.translated_text,
                    },
                    audio: audio_b64,
                }),
            )
            .await?;
        } else {
            let kind = result.error_kind.as_deref().unwrap_or("provider");
            // 对用户只报告一般性的失败描述 / The user sees a general failure description
            let message = match result.failed_stage {
                Some(crate::speech::Stage::Transcribe) => "speech could not be transcribed",
                Some(crate::speech::Stage::Translate) => "transcript could not be translated",
                Some(crate::speech::Stage::Synthesize) => "speech could not be synthesized",
                _ => "audio could not be processed",
            };
            self.send_error(client_id, kind, message).await;
        }
        Ok(())
    }

    /// 呼叫信令转发 / Call-signaling relay
    ///
    /// 只做消息路由，不触碰媒体传输 / Message routing only, never media transport
    async fn relay_signal(
        &self,
        data: &serde_json::Value,
        client_id: &str,
        event: &str,
    ) -> Result<()> {
        let from = match self.uid_of(client_id) {
            Some(uid) => uid,
            None => {
                self.send_error(client_id, "invalid_input", "signaling requires auth")
                    .await;
                return Ok(());
            }
        };
        let peer = match data.get("to").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => {
                self.send_error(client_id, "invalid_input", "signaling requires to")
                    .await;
                return Ok(());
            }
        };
        match self.presence.resolve(peer) {
            Some(address) => {
                let mut payload = data.clone();
                if let Some(obj) = payload.as_object_mut() {
                    obj.insert("from".to_string(), serde_json::json!(from));
                    obj.remove("to");
                }
                self.send_frame(&address, event, payload).await?;
            }
            None => {
                self.send_error(client_id, "peer_offline", "peer is not connected")
                    .await;
            }
        }
        Ok(())
    }
}
