use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

use crate::presence::DisconnectReason;
use crate::server::{BabelServer, Connection};

/// 处理新连接 / Handle new connection
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    server: BabelServer,
) -> Result<()> {
    tracing::info!("📨 New connection from: {}", peer_addr);

    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let client_id = Uuid::new_v4().to_string();

    let client_id_clone = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(&msg, Message::Close(_));
            if let Err(e) = ws_sender.send(msg).await {
                tracing::error!("Failed to send message to {}: {}", client_id_clone, e);
                break;
            }
            if is_close {
                let _ = ws_sender.close().await;
                break;
            }
        }
    });

    let connection = Connection {
        client_id: client_id.clone(),
        uid: None,
        addr: peer_addr,
        sender: tx,
        last_heartbeat: Arc::new(parking_lot::Mutex::new(Instant::now())),
    };
    server.connections.insert(client_id.clone(), connection);
    tracing::info!("✅ Client {} connected from {}", client_id, peer_addr);

    let welcome = crate::domain::message::ConnectResponse {
        status: "connected".to_string(),
        message: "Welcome to babel-im Server".to_string(),
        client_id: client_id.clone(),
    };
    server
        .send_frame(&client_id, "connected", serde_json::to_value(&welcome)?)
        .await?;

    // 认证看门狗：限期未认证的连接直接关闭 / Auth watchdog: close connections
    // that never authenticate within the deadline
    {
        let watchdog_client = client_id.clone();
        let watchdog_server = server.clone();
        let deadline_ms = server.config.auth_deadline_ms;
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(deadline_ms)).await;
            let unauthenticated = watchdog_server
                .connections
                .get(&watchdog_client)
                .map(|c| c.uid.is_none())
                .unwrap_or(false);
            if unauthenticated {
                let _ = watchdog_server.send_close_message(&watchdog_client).await;
                watchdog_server.connections.remove(&watchdog_client);
                tracing::warn!("disconnecting unauthenticated client_id={}", watchdog_client);
            }
        });
    }

    // 读取错误按瞬时断开处理，流正常结束按永久断开处理
    // A read error counts as a transient disconnect, a clean stream end as a
    // permanent one
    let mut reason = DisconnectReason::TransportClosed;
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(message) => {
                if let Err(e) = server.handle_incoming_message(message, &client_id).await {
                    tracing::error!("Error handling message from {}: {}", client_id, e);
                }
            }
            Err(e) => {
                tracing::error!("WebSocket error from {}: {}", client_id, e);
                reason = DisconnectReason::TransportError;
                break;
            }
        }
    }

    let connection_info = server.connections.remove(&client_id);
    send_task.abort();
    tracing::info!("👋 Client {} disconnected ({:?})", client_id, reason);
    if let Some((_, connection)) = connection_info {
        if let Some(uid) = &connection.uid {
            server.drop_identity(uid, reason).await;
        }
    }
    Ok(())
}
