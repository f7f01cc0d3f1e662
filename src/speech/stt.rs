//! 语音转写客户端 / Speech-to-text client
//!
//! 网络调用前完成容器帧校验；分块推流；静默超时返回已累积的部分文本
//! Container framing is validated before any network call; audio is streamed
//! in fixed-size chunks; the inactivity timeout resolves with whatever
//! partial text was accumulated.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::audio::{validate_wav, WAV_HEADER_LEN};
use crate::error::{RelayError, RelayResult};
use crate::lang::{normalize_lang, to_provider_locale};
use crate::providers::{RecognitionEvent, TranscribeSession, TranscriptionProvider};
use crate::retry::retry_with_backoff;

pub struct SpeechToTextClient {
    provider: Arc<dyn TranscriptionProvider>,
    chunk_size: usize,
    silence_timeout: Duration,
}

impl SpeechToTextClient {
    pub fn new(
        provider: Arc<dyn TranscriptionProvider>,
        chunk_size: usize,
        silence_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            chunk_size: chunk_size.max(1),
            silence_timeout,
        }
    }

    /// 转写一段WAV音频 / Transcribe one WAV clip
    ///
    /// `max_retries`为总尝试次数；帧格式与语言错误不进入重试
    /// `max_retries` is the total attempt count; format and language errors
    /// never enter the retry loop.
    pub async fn transcribe(
        &self,
        audio: &[u8],
        source_language: &str,
        max_retries: u32,
    ) -> RelayResult<String> {
        validate_wav(audio)?;
        let short = normalize_lang(source_language);
        if !short.chars().all(|c| c.is_ascii_alphabetic()) || short.len() > 3 {
            return Err(RelayError::InvalidLanguage(format!(
                "unusable language code: {:?}",
                source_language
            )));
        }
        let locale = to_provider_locale(&short);
        retry_with_backoff("transcribe", max_retries, || self.attempt(audio, &locale)).await
    }

    /// 单次尝试；会话在所有退出路径上释放 / One attempt; the session is released on every exit path
    async fn attempt(&self, audio: &[u8], locale: &str) -> RelayResult<String> {
        let mut session = self.provider.open_session(locale).await?;
        let outcome = self.drive(session.as_mut(), audio).await;
        session.close().await;
        outcome
    }

    async fn drive(
        &self,
        session: &mut dyn TranscribeSession,
        audio: &[u8],
    ) -> RelayResult<String> {
        // 跳过容器头后按固定块推流 / Stream fixed-size chunks after skipping the header
        for chunk in audio[WAV_HEADER_LEN..].chunks(self.chunk_size) {
            session.feed(chunk).await?;
        }
        session.finish().await?;

        let mut transcript = String::new();
        loop {
            let event = match tokio::time::timeout(self.silence_timeout, session.next_event()).await
            {
                Ok(event) => event,
                Err(_) => {
                    // 静默超时：返回已累积文本而不是挂起 / Inactivity timeout: resolve with the partial text
                    warn!(
                        "⏱️  recognition inactive for {:?}, resolving with partial text",
                        self.silence_timeout
                    );
                    return Ok(transcript.trim().to_string());
                }
            };
            match event {
                Some(RecognitionEvent::Recognized(segment)) => {
                    debug!("🎙️  recognized segment: {} chars", segment.len());
                    if !transcript.is_empty() && !segment.is_empty() {
                        transcript.push(' ');
                    }
                    transcript.push_str(&segment);
                }
                Some(RecognitionEvent::Canceled {
                    reason: Some(reason),
                }) => {
                    return Err(RelayError::Provider(format!(
                        "recognition canceled: {}",
                        reason
                    )));
                }
                // 干净的音频结束信号按成功处理 / A clean end-of-audio signal resolves successfully
                Some(RecognitionEvent::Canceled { reason: None })
                | Some(RecognitionEvent::Completed)
                | None => return Ok(transcript.trim().to_string()),
            }
        }
    }
}
