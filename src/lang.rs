//! 语言代码处理 / Language code handling
//!
//! 短语言码（`en`）用于路由与缓存键，供应商侧使用区域码（`en-US`）
//! Short codes (`en`) drive routing and cache keys; providers take locale
//! codes (`en-US`).

use dashmap::DashMap;
use lazy_static::lazy_static;

/// 默认语言 / Default language
pub const DEFAULT_LANG: &str = "en";

lazy_static! {
    /// 短码到供应商区域码的静态映射 / Static short-code to provider-locale table
    static ref LOCALE_TABLE: Vec<(&'static str, &'static str)> = vec![
        ("en", "en-US"),
        ("hi", "hi-IN"),
        ("fr", "fr-FR"),
        ("de", "de-DE"),
        ("es", "es-ES"),
        ("it", "it-IT"),
        ("pt", "pt-BR"),
        ("ja", "ja-JP"),
        ("ko", "ko-KR"),
        ("zh", "zh-CN"),
        ("ru", "ru-RU"),
        ("ar", "ar-SA"),
        ("bn", "bn-IN"),
        ("ta", "ta-IN"),
        ("te", "te-IN"),
        ("mr", "mr-IN"),
        ("gu", "gu-IN"),
        ("kn", "kn-IN"),
        ("ml", "ml-IN"),
        ("pa", "pa-IN"),
        ("ur", "ur-IN"),
        ("nl", "nl-NL"),
        ("tr", "tr-TR"),
        ("vi", "vi-VN"),
        ("th", "th-TH"),
        ("id", "id-ID"),
    ];

    /// 语言到语音形象的静态映射 / Static language to voice identity table
    static ref VOICE_TABLE: Vec<(&'static str, &'static str)> = vec![
        ("en", "en-US-JennyNeural"),
        ("hi", "hi-IN-SwaraNeural"),
        ("fr", "fr-FR-DeniseNeural"),
        ("de", "de-DE-KatjaNeural"),
        ("es", "es-ES-ElviraNeural"),
        ("it", "it-IT-ElsaNeural"),
        ("pt", "pt-BR-FranciscaNeural"),
        ("ja", "ja-JP-NanamiNeural"),
        ("ko", "ko-KR-SunHiNeural"),
        ("zh", "zh-CN-XiaoxiaoNeural"),
        ("ru", "ru-RU-SvetlanaNeural"),
        ("ar", "ar-SA-ZariyahNeural"),
        ("bn", "bn-IN-TanishaaNeural"),
        ("ta", "ta-IN-PallaviNeural"),
        ("te", "te-IN-ShrutiNeural"),
        ("mr", "mr-IN-AarohiNeural"),
        ("gu", "gu-IN-DhwaniNeural"),
        ("vi", "vi-VN-HoaiMyNeural"),
    ];

    /// 区域码查询的进程级缓存 / Process-lifetime memo for locale lookups
    static ref LOCALE_CACHE: DashMap<String, String> = DashMap::new();
}

/// 未知语言时的兜底语音 / Fallback voice for unmapped languages
pub const DEFAULT_VOICE: &str = "en-US-JennyNeural";

/// 归一化语言码：小写、去区域后缀、空白回退默认语言
/// Normalize a language code: lowercase, strip region suffix, blank falls back to default
pub fn normalize_lang(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return DEFAULT_LANG.to_string();
    }
    let lower = trimmed.to_lowercase();
    let short = lower
        .split(['-', '_'])
        .next()
        .unwrap_or(DEFAULT_LANG)
        .to_string();
    if short.is_empty() {
        DEFAULT_LANG.to_string()
    } else {
        short
    }
}

/// 短码映射为供应商区域码；未知码原样透传，结果按进程缓存
/// Map a short code to the provider locale; unknown codes pass through,
/// results are memoized for the process lifetime
pub fn to_provider_locale(code: &str) -> String {
    if let Some(hit) = LOCALE_CACHE.get(code) {
        return hit.clone();
    }
    let mapped = LOCALE_TABLE
        .iter()
        .find(|(short, _)| *short == code)
        .map(|(_, locale)| locale.to_string())
        .unwrap_or_else(|| code.to_string());
    LOCALE_CACHE.insert(code.to_string(), mapped.clone());
    mapped
}

/// 语言选取语音形象；未知语言回退默认语音
/// Pick a voice identity for a language; unknown languages fall back to the default voice
pub fn voice_for_lang(code: &str) -> &'static str {
    VOICE_TABLE
        .iter()
        .find(|(short, _)| *short == code)
        .map(|(_, voice)| *voice)
        .unwrap_or(DEFAULT_VOICE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_region_and_case() {
        assert_eq!(normalize_lang("en-US"), "en");
        assert_eq!(normalize_lang("FR"), "fr");
        assert_eq!(normalize_lang("zh_CN"), "zh");
        assert_eq!(normalize_lang("hi"), "hi");
    }

    #[test]
    fn normalize_blank_defaults_to_english() {
        assert_eq!(normalize_lang(""), "en");
        assert_eq!(normalize_lang("   "), "en");
    }

    #[test]
    fn locale_mapping_known_and_passthrough() {
        assert_eq!(to_provider_locale("hi"), "hi-IN");
        assert_eq!(to_provider_locale("en"), "en-US");
        // 未知码原样透传 / Unknown codes pass through unchanged
        assert_eq!(to_provider_locale("xx"), "xx");
        // 二次查询走缓存，结果稳定 / Second lookup is memoized and stable
        assert_eq!(to_provider_locale("hi"), "hi-IN");
    }

    #[test]
    fn voice_fallback_for_unknown_language() {
        assert_eq!(voice_for_lang("hi"), "hi-IN-SwaraNeural");
        assert_eq!(voice_for_lang("xx"), DEFAULT_VOICE);
    }
}
