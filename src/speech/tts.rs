//! 语音合成客户端 / Text-to-speech client
//!
//! 文本归一化、语音形象映射、整体超时与容器头修复
//! Text normalization, voice mapping, an overall operation timeout and
//! container header repair.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::audio::ensure_wav_container;
use crate::error::{RelayError, RelayResult};
use crate::lang::{normalize_lang, voice_for_lang};
use crate::providers::SynthesisProvider;
use crate::retry::retry_with_backoff;

/// 低于此长度的文本补终止标点，改善下游合成质量
/// Inputs below this length get terminal punctuation for better synthesis quality
const SHORT_TEXT_LEN: usize = 5;

pub struct TextToSpeechClient {
    provider: Arc<dyn SynthesisProvider>,
    operation_timeout: Duration,
}

impl TextToSpeechClient {
    pub fn new(provider: Arc<dyn SynthesisProvider>, operation_timeout: Duration) -> Self {
        Self {
            provider,
            operation_timeout,
        }
    }

    /// 合成一段语音 / Synthesize one clip
    pub async fn synthesize(
        &self,
        text: &str,
        target_language: &str,
        max_retries: u32,
    ) -> RelayResult<Vec<u8>> {
        let normalized = normalize_text(text)?;
        let voice = voice_for_lang(&normalize_lang(target_language));
        debug!("🔊 synthesizing {} chars with voice {}", normalized.len(), voice);
        retry_with_backoff("synthesize", max_retries, || {
            self.attempt(&normalized, voice)
        })
        .await
    }

    async fn attempt(&self, text: &str, voice: &str) -> RelayResult<Vec<u8>> {
        let audio = tokio::time::timeout(
            self.operation_timeout,
            self.provider.synthesize(text, voice),
        )
        .await
        .map_err(|_| {
            RelayError::Timeout(format!(
                "synthesis exceeded {}s",
                self.operation_timeout.as_secs()
            ))
        })??;
        // 供应商返回裸样本时必须补容器头 / Raw provider samples must gain a container header
        Ok(ensure_wav_container(audio))
    }
}

/// 拒绝空白文本；为过短文本补终止标点 / Reject blank text; punctuate very short inputs
fn normalize_text(text: &str) -> RelayResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RelayError::InvalidInput(
            "cannot synthesize empty text".into(),
        ));
    }
    // 按字符数而非字节数判定，多字节文字同样适用 / Counted in characters, not
    // bytes, so multi-byte scripts qualify too
    if trimmed.chars().count() < SHORT_TEXT_LEN
        && !trimmed.ends_with(['.', '!', '?', '。', '！', '？'])
    {
        return Ok(format!("{}.", trimmed));
    }
    Ok(trimmed.to_string())
}
