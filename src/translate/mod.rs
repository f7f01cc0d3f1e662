//! 文本翻译 / Text translation

pub mod cache;
pub mod client;

pub use cache::{CacheKey, TranslationCache};
pub use client::TranslationClient;
