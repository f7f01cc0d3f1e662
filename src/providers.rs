//! 远程能力契约 / Remote capability contracts
//!
//! 翻译、转写、合成三类供应商在此抽象为窄接口，核心逻辑只依赖契约；
//! 附带一套基于HTTP的参考实现。
//! Translation, transcription and synthesis vendors are abstracted into
//! narrow traits here; the core depends only on the contracts. A set of
//! HTTP-backed reference implementations is included.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{RelayError, RelayResult};

/// 文本翻译能力 / Text translation capability
///
/// 批量输入输出同序同长；目录查询用于启动自检
/// Batch output matches input order and length; the catalog call backs startup checks.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate_batch(
        &self,
        texts: &[String],
        source: Option<&str>,
        target: &str,
    ) -> RelayResult<Vec<String>>;

    async fn supported_languages(&self) -> RelayResult<Vec<String>>;
}

/// 识别会话产生的事件 / Events produced by a recognition session
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// 识别出的一段文本 / A recognized text segment
    Recognized(String),
    /// 供应商取消；reason为None表示干净的音频结束
    /// Provider cancellation; a None reason is a clean end-of-audio signal
    Canceled { reason: Option<String> },
    /// 会话正常结束 / Session completed normally
    Completed,
}

/// 一次转写会话 / One transcription session
///
/// 任何退出路径都必须调用`close`释放供应商侧资源
/// `close` must run on every exit path to release provider-side resources.
#[async_trait]
pub trait TranscribeSession: Send {
    async fn feed(&mut self, chunk: &[u8]) -> RelayResult<()>;
    async fn finish(&mut self) -> RelayResult<()>;
    async fn next_event(&mut self) -> Option<RecognitionEvent>;
    async fn close(&mut self);
}

/// 语音转写能力 / Speech transcription capability
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    async fn open_session(&self, locale: &str) -> RelayResult<Box<dyn TranscribeSession>>;
}

/// 语音合成能力 / Speech synthesis capability
#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> RelayResult<Vec<u8>>;
}

// ============================================================================
// HTTP参考实现 / HTTP reference implementations
// ============================================================================

fn map_reqwest_error(context: &str, e: reqwest::Error) -> RelayError {
    if e.is_timeout() {
        RelayError::Timeout(format!("{}: {}", context, e))
    } else {
        RelayError::Provider(format!("{}: {}", context, e))
    }
}

fn map_status(context: &str, resp: &reqwest::Response) -> Option<RelayError> {
    let status = resp.status();
    if status.is_success() {
        return None;
    }
    if status.as_u16() == 429 {
        let retry_after_secs = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1);
        return Some(RelayError::RateLimited { retry_after_secs });
    }
    Some(RelayError::Provider(format!(
        "{}: upstream returned {}",
        context, status
    )))
}

/// HTTP文本翻译供应商 / HTTP text translation provider
pub struct HttpTranslationProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: Vec<String>,
}

#[derive(Deserialize)]
struct LanguagesResponse {
    languages: Vec<String>,
}

impl HttpTranslationProvider {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    fn api_key(&self) -> RelayResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| RelayError::Config("translation API key is not configured".into()))
    }
}

#[async_trait]
impl TranslationProvider for HttpTranslationProvider {
    async fn translate_batch(
        &self,
        texts: &[String],
        source: Option<&str>,
        target: &str,
    ) -> RelayResult<Vec<String>> {
        let api_key = self.api_key()?;
        let body = serde_json::json!({
            "q": texts,
            "source": source,
            "target": target,
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error("translate", e))?;
        if let Some(err) = map_status("translate", &resp) {
            return Err(err);
        }
        let parsed: TranslateResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Provider(format!("translate: bad response body: {}", e)))?;
        if parsed.translated_text.len() != texts.len() {
            return Err(RelayError::Provider(format!(
                "translate: expected {} results, got {}",
                texts.len(),
                parsed.translated_text.len()
            )));
        }
        Ok(parsed.translated_text)
    }

    async fn supported_languages(&self) -> RelayResult<Vec<String>> {
        let api_key = self.api_key()?;
        let url = format!("{}/languages", self.endpoint.trim_end_matches('/'));
        let resp = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| map_reqwest_error("languages", e))?;
        if let Some(err) = map_status("languages", &resp) {
            return Err(err);
        }
        let parsed: LanguagesResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Provider(format!("languages: bad response body: {}", e)))?;
        Ok(parsed.languages)
    }
}

/// HTTP转写供应商 / HTTP transcription provider
///
/// 分块在会话内缓冲，`finish`时一次提交；适配只支持整段提交的REST转写后端
/// Chunks are buffered in the session and submitted once at `finish`, matching
/// REST transcription backends that only take whole clips.
pub struct HttpTranscriptionProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTranscriptionProvider {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl TranscriptionProvider for HttpTranscriptionProvider {
    async fn open_session(&self, locale: &str) -> RelayResult<Box<dyn TranscribeSession>> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| RelayError::Config("speech API key is not configured".into()))?;
        Ok(Box::new(HttpTranscribeSession {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            api_key,
            locale: locale.to_string(),
            buffered: Vec::new(),
            events: VecDeque::new(),
            closed: false,
        }))
    }
}

struct HttpTranscribeSession {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    locale: String,
    buffered: Vec<u8>,
    events: VecDeque<RecognitionEvent>,
    closed: bool,
}

#[derive(Deserialize)]
struct TranscribeResponse {
    text: String,
}

#[async_trait]
impl TranscribeSession for HttpTranscribeSession {
    async fn feed(&mut self, chunk: &[u8]) -> RelayResult<()> {
        if self.closed {
            return Err(RelayError::Provider("session already closed".into()));
        }
        self.buffered.extend_from_slice(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> RelayResult<()> {
        if self.closed {
            return Err(RelayError::Provider("session already closed".into()));
        }
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .query(&[("locale", self.locale.as_str())])
            .body(std::mem::take(&mut self.buffered))
            .send()
            .await;
        match resp {
            Ok(resp) => {
                if let Some(err) = map_status("transcribe", &resp) {
                    self.events.push_back(RecognitionEvent::Canceled {
                        reason: Some(err.to_string()),
                    });
                    return Ok(());
                }
                match resp.json::<TranscribeResponse>().await {
                    Ok(parsed) => {
                        debug!("🎙️  transcription final result: {} chars", parsed.text.len());
                        self.events
                            .push_back(RecognitionEvent::Recognized(parsed.text));
                        self.events.push_back(RecognitionEvent::Completed);
                    }
                    Err(e) => self.events.push_back(RecognitionEvent::Canceled {
                        reason: Some(format!("bad response body: {}", e)),
                    }),
                }
            }
            Err(e) => self.events.push_back(RecognitionEvent::Canceled {
                reason: Some(map_reqwest_error("transcribe", e).to_string()),
            }),
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<RecognitionEvent> {
        self.events.pop_front()
    }

    async fn close(&mut self) {
        self.buffered.clear();
        self.events.clear();
        self.closed = true;
    }
}

/// HTTP语音合成供应商 / HTTP speech synthesis provider
pub struct HttpSynthesisProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSynthesisProvider {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl SynthesisProvider for HttpSynthesisProvider {
    async fn synthesize(&self, text: &str, voice: &str) -> RelayResult<Vec<u8>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RelayError::Config("speech API key is not configured".into()))?;
        let body = serde_json::json!({ "text": text, "voice": voice });
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error("synthesize", e))?;
        if let Some(err) = map_status("synthesize", &resp) {
            return Err(err);
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RelayError::Provider(format!("synthesize: body read failed: {}", e)))?;
        Ok(bytes.to_vec())
    }
}
