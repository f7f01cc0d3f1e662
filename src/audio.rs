//! 音频容器帧处理 / Audio container framing
//!
//! 边界上的音频统一为带44字节头的WAV容器：前4字节`RIFF`，第8-11字节`WAVE`
//! Audio at the boundary is a WAV container with a 44-byte header: `RIFF`
//! at bytes 0..4 and `WAVE` at bytes 8..12.

use base64::Engine;

use crate::error::{RelayError, RelayResult};

/// WAV头长度 / WAV header length
pub const WAV_HEADER_LEN: usize = 44;
/// 合成输出的固定采样参数 / Fixed sample constants for synthesized output
pub const SAMPLE_RATE: u32 = 16_000;
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;
/// 低于此长度的音频视为明显截断 / Audio below this length is obviously truncated
pub const MIN_AUDIO_LEN: usize = WAV_HEADER_LEN + 16;

/// 进入管线前的音频负载形态 / Audio payload shapes accepted at the pipeline entry
#[derive(Debug, Clone)]
pub enum AudioInput {
    /// 原始字节 / Raw bytes
    Raw(Vec<u8>),
    /// base64文本 / base64 text
    Base64(String),
}

impl AudioInput {
    /// 从任意JSON负载归一化 / Normalize from an arbitrary JSON payload
    ///
    /// 接受字符串(base64)、字节数组、或 `{type:"Buffer", data:[..]}` 标记形式
    /// Accepts a string (base64), a byte array, or the tagged
    /// `{type:"Buffer", data:[..]}` form.
    pub fn from_json(value: &serde_json::Value) -> RelayResult<AudioInput> {
        match value {
            serde_json::Value::String(s) => Ok(AudioInput::Base64(s.clone())),
            serde_json::Value::Array(items) => {
                let mut bytes = Vec::with_capacity(items.len());
                for item in items {
                    let b = item
                        .as_u64()
                        .filter(|v| *v <= u8::MAX as u64)
                        .ok_or_else(|| {
                            RelayError::InvalidInput("audio array holds non-byte values".into())
                        })?;
                    bytes.push(b as u8);
                }
                Ok(AudioInput::Raw(bytes))
            }
            serde_json::Value::Object(map) => {
                let data = map
                    .get("data")
                    .ok_or_else(|| RelayError::InvalidInput("tagged audio lacks data".into()))?;
                AudioInput::from_json(data)
            }
            _ => Err(RelayError::InvalidInput(
                "unrecognized audio payload shape".into(),
            )),
        }
    }

    /// 解码为拥有所有权的字节缓冲 / Decode into one owned byte buffer
    pub fn into_bytes(self) -> RelayResult<Vec<u8>> {
        match self {
            AudioInput::Raw(bytes) => Ok(bytes),
            AudioInput::Base64(text) => base64::engine::general_purpose::STANDARD
                .decode(text.trim())
                .map_err(|e| RelayError::InvalidInput(format!("bad base64 audio: {}", e))),
        }
    }
}

/// 校验容器帧：长度与魔数 / Validate container framing: length and magic markers
pub fn validate_wav(bytes: &[u8]) -> RelayResult<()> {
    if bytes.len() < WAV_HEADER_LEN {
        return Err(RelayError::InvalidFormat(format!(
            "buffer too short for WAV header: {} bytes",
            bytes.len()
        )));
    }
    if &bytes[0..4] != b"RIFF" {
        return Err(RelayError::InvalidFormat("missing RIFF marker".into()));
    }
    if &bytes[8..12] != b"WAVE" {
        return Err(RelayError::InvalidFormat("missing WAVE marker".into()));
    }
    Ok(())
}

pub fn is_valid_wav(bytes: &[u8]) -> bool {
    validate_wav(bytes).is_ok()
}

/// 为裸PCM样本合成44字节WAV头 / Synthesize the 44-byte WAV header for raw PCM samples
pub fn wav_header(data_len: u32) -> [u8; WAV_HEADER_LEN] {
    let byte_rate = SAMPLE_RATE * CHANNELS as u32 * BITS_PER_SAMPLE as u32 / 8;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes()); // PCM fmt chunk size
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM format tag
    header[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&SAMPLE_RATE.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    header
}

/// 确保缓冲携带合法容器头；供应商返回裸样本时必须修复
/// Ensure the buffer carries a valid container header; raw provider samples
/// are repaired by prepending a synthesized header
pub fn ensure_wav_container(bytes: Vec<u8>) -> Vec<u8> {
    if is_valid_wav(&bytes) {
        return bytes;
    }
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + bytes.len());
    out.extend_from_slice(&wav_header(bytes.len() as u32));
    out.extend_from_slice(&bytes);
    out
}

/// 编码为线上传输的base64 / Encode for on-the-wire base64 transport
pub fn to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
