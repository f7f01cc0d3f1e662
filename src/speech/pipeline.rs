//! 语音翻译管线 / Speech translation pipeline
//!
//! 单次调用严格顺序：转写 → (翻译|跳过) → 合成；任何阶段失败产出结构化
//! 部分结果，绝不丢弃先前阶段已得文本，也绝不向连接层抛异常。
//! Strictly sequential per invocation: transcribe → (translate | skip) →
//! synthesize; a stage failure yields a structured partial result that keeps
//! all earlier text and never escapes as an error.

use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::audio::{AudioInput, MIN_AUDIO_LEN};
use crate::error::{RelayError, RelayResult};
use crate::lang::normalize_lang;
use crate::translate::TranslationClient;

use super::stt::SpeechToTextClient;
use super::tts::TextToSpeechClient;

/// 合成阶段的并发窗口 / Concurrency window for the synthesis stage
const SYNTH_CONCURRENCY: usize = 5;

/// 失败阶段标签 / Failing stage label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Transcribe,
    Translate,
    Synthesize,
}

/// 终态结果 / Terminal result
///
/// 不变式：`audio`与`error_kind`恰有其一存在
/// Invariant: exactly one of `audio` and `error_kind` is present.
#[derive(Debug, Clone, Serialize)]
pub struct SpeechTranslationResult {
    pub original_text: String,
    pub translated_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SpeechTranslationResult {
    fn done(original: String, translated: String, audio: Vec<u8>) -> Self {
        Self {
            original_text: original,
            translated_text: translated,
            audio: Some(audio),
            failed_stage: None,
            error_kind: None,
            error_message: None,
        }
    }

    fn failed(stage: Stage, err: &RelayError, original: String, translated: String) -> Self {
        Self {
            original_text: original,
            translated_text: translated,
            audio: None,
            failed_stage: Some(stage),
            error_kind: Some(err.kind().to_string()),
            error_message: Some(err.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.audio.is_some()
    }
}

/// 批量条目 / Batch item
pub struct BatchItem {
    pub label: String,
    pub input: AudioInput,
}

pub struct SpeechTranslationPipeline {
    stt: SpeechToTextClient,
    translator: Arc<TranslationClient>,
    tts: TextToSpeechClient,
    max_retries: u32,
}

impl SpeechTranslationPipeline {
    pub fn new(
        stt: SpeechToTextClient,
        translator: Arc<TranslationClient>,
        tts: TextToSpeechClient,
        max_retries: u32,
    ) -> Self {
        Self {
            stt,
            translator,
            tts,
            max_retries,
        }
    }

    /// 单条语音翻译 / Translate one clip
    pub async fn run(
        &self,
        input: AudioInput,
        source_lang: &str,
        target_lang: &str,
    ) -> SpeechTranslationResult {
        let source = normalize_lang(source_lang);
        let target = normalize_lang(target_lang);

        let bytes = match normalize_input(input) {
            Ok(bytes) => bytes,
            Err(e) => {
                return SpeechTranslationResult::failed(
                    Stage::Normalize,
                    &e,
                    String::new(),
                    String::new(),
                )
            }
        };

        let original = match self.stt.transcribe(&bytes, &source, self.max_retries).await {
            Ok(text) => text,
            Err(e) => {
                return SpeechTranslationResult::failed(
                    Stage::Transcribe,
                    &e,
                    String::new(),
                    String::new(),
                )
            }
        };

        // 同语言跳过翻译，但仍然合成 / Same language skips translation but still synthesizes
        let translated = if source == target {
            original.clone()
        } else {
            match self.translator.translate(&original, &source, &target).await {
                Ok(text) => text,
                Err(e) => {
                    return SpeechTranslationResult::failed(
                        Stage::Translate,
                        &e,
                        original,
                        String::new(),
                    )
                }
            }
        };

        match self
            .tts
            .synthesize(&translated, &target, self.max_retries)
            .await
        {
            Ok(audio) => {
                debug!("✅ pipeline done: {} audio bytes", audio.len());
                SpeechTranslationResult::done(original, translated, audio)
            }
            Err(e) => {
                warn!("❌ synthesis stage failed: {}", e);
                SpeechTranslationResult::failed(Stage::Synthesize, &e, original, translated)
            }
        }
    }

    /// 批量语音翻译 / Translate a labeled batch
    ///
    /// 先归一化并剔除非法条目，有效条目全部并行转写，成功文本合并为一次
    /// 批量翻译，合成阶段以有界并发窗口执行；输出按输入顺序对应到标签。
    /// Invalid items are partitioned out up front; all valid items are
    /// transcribed in parallel, successes share one batched translation call,
    /// synthesis runs under a bounded concurrency window; outputs map back to
    /// their input labels in input order.
    pub async fn run_batch(
        &self,
        items: Vec<BatchItem>,
        source_lang: &str,
        target_lang: &str,
    ) -> Vec<(String, SpeechTranslationResult)> {
        let source = normalize_lang(source_lang);
        let target = normalize_lang(target_lang);

        let mut labels: Vec<String> = Vec::with_capacity(items.len());
        let mut slots: Vec<Option<SpeechTranslationResult>> = Vec::with_capacity(items.len());
        let mut valid: Vec<(usize, Vec<u8>)> = Vec::new();
        for (idx, item) in items.into_iter().enumerate() {
            labels.push(item.label);
            match normalize_input(item.input) {
                Ok(bytes) => {
                    slots.push(None);
                    valid.push((idx, bytes));
                }
                Err(e) => slots.push(Some(SpeechTranslationResult::failed(
                    Stage::Normalize,
                    &e,
                    String::new(),
                    String::new(),
                ))),
            }
        }

        // 所有有效条目并行转写 / Transcribe all valid items in parallel
        let transcripts = join_all(
            valid
                .iter()
                .map(|(_, bytes)| self.stt.transcribe(bytes, &source, self.max_retries)),
        )
        .await;

        let mut transcribed: Vec<(usize, String)> = Vec::new();
        for ((idx, _), outcome) in valid.into_iter().zip(transcripts) {
            match outcome {
                Ok(text) => transcribed.push((idx, text)),
                Err(e) => {
                    slots[idx] = Some(SpeechTranslationResult::failed(
                        Stage::Transcribe,
                        &e,
                        String::new(),
                        String::new(),
                    ))
                }
            }
        }

        // 共享语言对的一次批量翻译 / One batched translation over the shared language pair
        let originals: Vec<String> = transcribed.iter().map(|(_, t)| t.clone()).collect();
        let translations = if source == target {
            originals.clone()
        } else {
            match self
                .translator
                .translate_batch(&originals, &source, &target)
                .await
            {
                Ok(v) => v,
                Err(e) => {
                    warn!("❌ batch translation failed: {}", e);
                    for (idx, original) in transcribed {
                        slots[idx] = Some(SpeechTranslationResult::failed(
                            Stage::Translate,
                            &e,
                            original,
                            String::new(),
                        ));
                    }
                    return labels
                        .into_iter()
                        .zip(slots.into_iter().map(unfilled_guard))
                        .collect();
                }
            }
        };

        // 有界并发合成 / Bounded-concurrency synthesis
        let synth_outcomes: Vec<(usize, String, String, RelayResult<Vec<u8>>)> =
            stream::iter(transcribed.into_iter().zip(translations).map(
                |((idx, original), translated)| {
                    let target = target.clone();
                    async move {
                        let audio = self
                            .tts
                            .synthesize(&translated, &target, self.max_retries)
                            .await;
                        (idx, original, translated, audio)
                    }
                },
            ))
            .buffer_unordered(SYNTH_CONCURRENCY)
            .collect()
            .await;

        for (idx, original, translated, outcome) in synth_outcomes {
            slots[idx] = Some(match outcome {
                Ok(audio) => SpeechTranslationResult::done(original, translated, audio),
                Err(e) => SpeechTranslationResult::failed(Stage::Synthesize, &e, original, translated),
            });
        }

        labels
            .into_iter()
            .zip(slots.into_iter().map(unfilled_guard))
            .collect()
    }
}

/// 入口处一次性归一化，并拒绝明显截断的音频
/// Normalize once at entry and reject obviously truncated audio
fn normalize_input(input: AudioInput) -> RelayResult<Vec<u8>> {
    let bytes = input.into_bytes()?;
    if bytes.len() < MIN_AUDIO_LEN {
        return Err(RelayError::InvalidInput(format!(
            "decoded audio too short: {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// 所有槽位此时都应已填充 / Every slot must be filled by now
fn unfilled_guard(slot: Option<SpeechTranslationResult>) -> SpeechTranslationResult {
    slot.unwrap_or_else(|| {
        SpeechTranslationResult::failed(
            Stage::Normalize,
            &RelayError::Provider("batch item produced no result".into()),
            String::new(),
            String::new(),
        )
    })
}
