//! 服务端全局状态 / Server global state

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::config::{ServerConfig, SpeechConfigLite, TranslateConfigLite};
use crate::delivery::WsDeliveryMux;
use crate::directory::InMemoryDirectory;
use crate::fanout::FanoutRouter;
use crate::presence::PresenceRegistry;
use crate::providers::{
    HttpSynthesisProvider, HttpTranscriptionProvider, HttpTranslationProvider,
};
use crate::rooms::RoomRegistry;
use crate::speech::{SpeechToTextClient, SpeechTranslationPipeline, TextToSpeechClient};
use crate::storage::MemoryStore;
use crate::translate::TranslationClient;

/// 客户端连接信息 / Client connection information
#[derive(Clone)]
pub struct Connection {
    pub client_id: String,
    pub uid: Option<String>,                    // 认证后的用户ID / User ID after auth
    pub addr: SocketAddr,                       // 客户端地址 / Client address
    pub sender: mpsc::UnboundedSender<Message>, // 消息发送器 / Message sender
    pub last_heartbeat: Arc<Mutex<Instant>>,    // 最后心跳时间 / Last heartbeat time
}

/// 中继服务端 / Relay server
#[derive(Clone)]
pub struct BabelServer {
    pub connections: Arc<DashMap<String, Connection>>,
    pub presence: Arc<PresenceRegistry>,
    pub rooms: Arc<RoomRegistry>,
    pub directory: Arc<InMemoryDirectory>,
    pub store: Arc<MemoryStore>,
    pub fanout: Arc<FanoutRouter>,
    pub pipeline: Arc<SpeechTranslationPipeline>,
    pub config: ServerConfig,
}

impl BabelServer {
    /// 构建服务端实例并接线全部能力客户端 / Build the server and wire up all capability clients
    pub fn new(
        config: ServerConfig,
        translate_cfg: TranslateConfigLite,
        speech_cfg: SpeechConfigLite,
    ) -> Result<Self> {
        let connections: Arc<DashMap<String, Connection>> = Arc::new(DashMap::new());
        let presence = Arc::new(PresenceRegistry::new());
        let rooms = Arc::new(RoomRegistry::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let store = Arc::new(MemoryStore::new());
        let delivery = Arc::new(WsDeliveryMux::new(connections.clone()));

        let translation_provider = Arc::new(HttpTranslationProvider::new(
            translate_cfg.endpoint.clone(),
            translate_cfg.api_key.clone(),
            Duration::from_secs(15),
        )?);
        let translator = Arc::new(TranslationClient::new(
            translation_provider,
            translate_cfg.cache_max_entries,
            Duration::from_secs(translate_cfg.cache_ttl_secs),
            translate_cfg.batch_chunk_size,
            translate_cfg.max_attempts,
        ));

        let stt_provider = Arc::new(HttpTranscriptionProvider::new(
            speech_cfg.stt_endpoint.clone(),
            speech_cfg.api_key.clone(),
            Duration::from_secs(speech_cfg.synth_timeout_secs),
        )?);
        let tts_provider = Arc::new(HttpSynthesisProvider::new(
            speech_cfg.tts_endpoint.clone(),
            speech_cfg.api_key.clone(),
            Duration::from_secs(speech_cfg.synth_timeout_secs),
        )?);
        let stt = SpeechToTextClient::new(
            stt_provider,
            speech_cfg.chunk_size,
            Duration::from_secs(speech_cfg.silence_timeout_secs),
        );
        let tts = TextToSpeechClient::new(
            tts_provider,
            Duration::from_secs(speech_cfg.synth_timeout_secs),
        );
        let pipeline = Arc::new(SpeechTranslationPipeline::new(
            stt,
            translator.clone(),
            tts,
            speech_cfg.max_retries,
        ));

        let fanout = Arc::new(FanoutRouter::new(
            directory.clone(),
            translator,
            store.clone(),
            rooms.clone(),
            presence.clone(),
            delivery,
        ));

        Ok(Self {
            connections,
            presence,
            rooms,
            directory,
            store,
            fanout,
            pipeline,
            config,
        })
    }

    /// 连接上已认证的UID / Authenticated UID for a connection
    pub fn uid_of(&self, client_id: &str) -> Option<String> {
        self.connections.get(client_id).and_then(|c| c.uid.clone())
    }
}
