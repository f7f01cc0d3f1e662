use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use babel_im::init_tracing;
use babel_im::server::BabelServer;
use babel_im::storage::MessageStore;
use babel_im::{config, tasks};

/// 命令行参数 / Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "babel-im WebSocket relay server", long_about = None)]
pub struct Args {
    /// 指定配置文件路径（TOML/JSON/YAML自动识别）
    /// Specify config file path (auto-detect TOML/JSON/YAML)
    #[arg(short = 'c', long = "config")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志 / Initialize logging
    init_tracing()?;

    let args = Args::parse();

    info!("🎯 Starting babel-im Relay Server...");

    let (server_cfg, translate_cfg, speech_cfg) = config::load(args.config.as_deref())?;
    match &args.config {
        Some(path) => info!("🔧 Loaded config file: {}", path),
        None => info!("🔧 No config file given, using defaults with BABEL_* env overrides"),
    }

    info!("");
    info!("📖 WebSocket message types:");
    info!("   - ping: Heartbeat (with automatic heartbeat tracking)");
    info!("   - auth: Authentication (uid + token, optional language)");
    info!("   - joinRoom / leaveRoom: Room membership");
    info!("   - sendMessage: Room or direct message with per-recipient translation");
    info!("   - translateAudio: Speech-to-speech translation");
    info!("   - callUser / answerCall / iceCandidate / endCall: Call signaling relay");
    info!("");
    info!("💡 WebSocket examples:");
    info!("   Ping: {{\"type\":\"ping\",\"data\":{{}}}}");
    info!("   Auth: {{\"type\":\"auth\",\"data\":{{\"uid\":\"alice\",\"token\":\"token\",\"language\":\"fr\"}}}}");
    info!("   Message: {{\"type\":\"sendMessage\",\"data\":{{\"message\":\"Hello\",\"roomId\":\"lobby\"}}}}");

    let server = Arc::new(BabelServer::new(
        server_cfg.clone(),
        translate_cfg,
        speech_cfg,
    )?);

    // 启动前迁移旧格式消息记录 / Migrate legacy-format message records before serving
    match server.store.migrate_legacy_fields() {
        Ok(0) => {}
        Ok(migrated) => info!("🔄 Migrated {} legacy message records", migrated),
        Err(e) => warn!("⚠️  legacy migration failed: {}", e),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 启动自动心跳清理任务 / Start automatic heartbeat cleanup task
    tasks::cleanup::spawn_cleanup_task(server.clone(), server_cfg.timeout_ms, shutdown_rx.clone());
    // 启动在线条目清扫任务 / Start presence sweep task
    tasks::sweep::spawn_presence_sweep_task(
        server.clone(),
        server_cfg.presence_sweep_secs,
        shutdown_rx,
    );

    // 启动WebSocket服务器 / Start WebSocket server
    let ws_server = server.clone();
    let ws_host = server_cfg.host.clone();
    let ws_port = server_cfg.ws_port;
    let ws_future = async move {
        if let Err(e) = ws_server.run(ws_host, ws_port).await {
            error!("❌ WebSocket server error: {}", e);
        }
    };

    tokio::select! {
        _ = ws_future => {
            info!("WebSocket server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    info!("✅ Server shutdown successfully");

    Ok(())
}
