//! 语音能力 / Speech capabilities

pub mod pipeline;
pub mod stt;
pub mod tts;

pub use pipeline::{BatchItem, SpeechTranslationPipeline, SpeechTranslationResult, Stage};
pub use stt::SpeechToTextClient;
pub use tts::TextToSpeechClient;
