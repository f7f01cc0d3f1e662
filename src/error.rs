use thiserror::Error;

/// 中继核心错误分类 / Relay core error taxonomy
///
/// 能力客户端只返回这些分类，供应商内部错误不向上透传
/// Capability clients return only these kinds; raw vendor internals never leak upward
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// 缺少凭证等致命配置问题，启动即失败，不重试 / Missing credentials etc., fatal, never retried
    #[error("configuration error: {0}")]
    Config(String),

    /// 音频容器帧格式非法 / Invalid audio container framing
    #[error("invalid audio format: {0}")]
    InvalidFormat(String),

    /// 调用方输入非法，不重试 / Caller error, never retried
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 无法映射的语言/区域代码 / Unmappable language or locale code
    #[error("invalid language: {0}")]
    InvalidLanguage(String),

    /// 上游瞬时故障，可退避重试 / Transient upstream failure, retried with backoff
    #[error("provider error: {0}")]
    Provider(String),

    /// 上游限流，按提示退避后单次重试 / Rate limited, honor hint then one extra attempt
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// 操作超出硬性时限 / Operation exceeded its hard deadline
    #[error("operation timed out: {0}")]
    Timeout(String),
}

impl RelayError {
    /// 是否允许在正常重试预算内再次尝试 / Whether a fresh attempt within the retry budget is allowed
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::Provider(_) | RelayError::Timeout(_))
    }

    /// 错误种类短名，用于对外错误事件 / Short kind name for user-facing error events
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "config",
            RelayError::InvalidFormat(_) => "invalid_format",
            RelayError::InvalidInput(_) => "invalid_input",
            RelayError::InvalidLanguage(_) => "invalid_language",
            RelayError::Provider(_) => "provider",
            RelayError::RateLimited { .. } => "rate_limited",
            RelayError::Timeout(_) => "timeout",
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(RelayError::Provider("503".into()).is_retryable());
        assert!(RelayError::Timeout("synthesis".into()).is_retryable());
        assert!(!RelayError::Config("no key".into()).is_retryable());
        assert!(!RelayError::InvalidFormat("not RIFF".into()).is_retryable());
        assert!(!RelayError::InvalidInput("empty".into()).is_retryable());
        assert!(!RelayError::RateLimited { retry_after_secs: 2 }.is_retryable());
    }
}
