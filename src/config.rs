//! 配置加载 / Configuration loading
//!
//! TOML/JSON/YAML自动识别，环境变量`BABEL_*`可覆盖文件取值
//! Auto-detects TOML/JSON/YAML; `BABEL_*` environment variables override file values.

use anyhow::Result;
use serde::Deserialize;

/// 服务端配置 / Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub ws_port: u16,
    pub timeout_ms: u64,
    pub auth_deadline_ms: u64,
    pub presence_sweep_secs: u64,
}

/// 翻译能力配置 / Translation capability configuration
#[derive(Clone, Debug)]
pub struct TranslateConfigLite {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub cache_max_entries: usize,
    pub cache_ttl_secs: u64,
    pub batch_chunk_size: usize,
    pub max_attempts: u32,
}

/// 语音能力配置 / Speech capability configuration
#[derive(Clone, Debug)]
pub struct SpeechConfigLite {
    pub stt_endpoint: String,
    pub tts_endpoint: String,
    pub api_key: Option<String>,
    pub chunk_size: usize,
    pub silence_timeout_secs: u64,
    pub synth_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            ws_port: 5200,
            timeout_ms: 30_000,
            auth_deadline_ms: 5_000,
            presence_sweep_secs: 300,
        }
    }
}

impl Default for TranslateConfigLite {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000/translate".to_string(),
            api_key: None,
            cache_max_entries: 1000,
            cache_ttl_secs: 3600,
            batch_chunk_size: 25,
            max_attempts: 3,
        }
    }
}

impl Default for SpeechConfigLite {
    fn default() -> Self {
        Self {
            stt_endpoint: "http://127.0.0.1:5100/transcribe".to_string(),
            tts_endpoint: "http://127.0.0.1:5100/synthesize".to_string(),
            api_key: None,
            chunk_size: 4096,
            silence_timeout_secs: 5,
            synth_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// 原始文件结构 / Raw file schema
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    translate: RawTranslate,
    #[serde(default)]
    speech: RawSpeech,
}

#[derive(Deserialize, Default)]
struct RawServer {
    host: Option<String>,
    ws_port: Option<u16>,
    timeout_ms: Option<u64>,
    auth_deadline_ms: Option<u64>,
    presence_sweep_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
struct RawTranslate {
    endpoint: Option<String>,
    api_key: Option<String>,
    cache_max_entries: Option<usize>,
    cache_ttl_secs: Option<u64>,
    batch_chunk_size: Option<usize>,
    max_attempts: Option<u32>,
}

#[derive(Deserialize, Default)]
struct RawSpeech {
    stt_endpoint: Option<String>,
    tts_endpoint: Option<String>,
    api_key: Option<String>,
    chunk_size: Option<usize>,
    silence_timeout_secs: Option<u64>,
    synth_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

/// 加载配置；文件缺失时使用默认值 / Load configuration; missing file falls back to defaults
pub fn load(
    path: Option<&str>,
) -> Result<(ServerConfig, TranslateConfigLite, SpeechConfigLite)> {
    let mut builder = config::Config::builder();
    if let Some(p) = path {
        builder = builder.add_source(config::File::with_name(p).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix("BABEL").separator("__"));
    let raw: RawConfig = builder.build()?.try_deserialize().unwrap_or_default();

    let server_defaults = ServerConfig::default();
    let translate_defaults = TranslateConfigLite::default();
    let speech_defaults = SpeechConfigLite::default();

    Ok((
        ServerConfig {
            host: raw.server.host.unwrap_or(server_defaults.host),
            ws_port: raw.server.ws_port.unwrap_or(server_defaults.ws_port),
            timeout_ms: raw.server.timeout_ms.unwrap_or(server_defaults.timeout_ms),
            auth_deadline_ms: raw
                .server
                .auth_deadline_ms
                .unwrap_or(server_defaults.auth_deadline_ms),
            presence_sweep_secs: raw
                .server
                .presence_sweep_secs
                .unwrap_or(server_defaults.presence_sweep_secs),
        },
        TranslateConfigLite {
            endpoint: raw.translate.endpoint.unwrap_or(translate_defaults.endpoint),
            api_key: raw.translate.api_key,
            cache_max_entries: raw
                .translate
                .cache_max_entries
                .unwrap_or(translate_defaults.cache_max_entries),
            cache_ttl_secs: raw
                .translate
                .cache_ttl_secs
                .unwrap_or(translate_defaults.cache_ttl_secs),
            batch_chunk_size: raw
                .translate
                .batch_chunk_size
                .unwrap_or(translate_defaults.batch_chunk_size),
            max_attempts: raw
                .translate
                .max_attempts
                .unwrap_or(translate_defaults.max_attempts),
        },
        SpeechConfigLite {
            stt_endpoint: raw.speech.stt_endpoint.unwrap_or(speech_defaults.stt_endpoint),
            tts_endpoint: raw.speech.tts_endpoint.unwrap_or(speech_defaults.tts_endpoint),
            api_key: raw.speech.api_key,
            chunk_size: raw.speech.chunk_size.unwrap_or(speech_defaults.chunk_size),
            silence_timeout_secs: raw
                .speech
                .silence_timeout_secs
                .unwrap_or(speech_defaults.silence_timeout_secs),
            synth_timeout_secs: raw
                .speech
                .synth_timeout_secs
                .unwrap_or(speech_defaults.synth_timeout_secs),
            max_retries: raw.speech.max_retries.unwrap_or(speech_defaults.max_retries),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let (server, translate, speech) = load(None).unwrap();
        assert_eq!(server.ws_port, 5200);
        assert_eq!(server.presence_sweep_secs, 300);
        assert_eq!(translate.cache_max_entries, 1000);
        assert!(translate.api_key.is_none());
        assert_eq!(speech.silence_timeout_secs, 5);
    }
}
