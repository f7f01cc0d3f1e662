//! 线缆消息结构 / Wire message structures

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 通用消息信封 / Generic message envelope
#[derive(Serialize, Deserialize, Debug)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub status: String,
    pub message: String,
    pub client_id: String,
}

/// 发送文本消息请求 / Send-message request
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
}

/// 按接收方本地化后的消息事件 / Per-recipient localized message event
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveMessagePayload {
    pub content: String,
    pub original_content: String,
    pub original_language: String,
    pub translations: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub from: String,
    pub message_id: String,
    pub timestamp: i64,
}

/// 语音翻译请求 / Audio translation request
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TranslateAudioRequest {
    pub audio: serde_json::Value,
    pub source_language: String,
    pub target_language: String,
    pub user_id: Option<String>,
}

/// 转写回显事件 / Transcript echo event
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AudioTranscriptPayload {
    pub text: String,
    pub is_local: bool,
}

/// 语音翻译结果事件 / Translated audio event
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedAudioPayload {
    pub text: TranslatedTextPair,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedTextPair {
    pub original: String,
    pub translated: String,
}

/// 对单个请求作用域的错误事件 / Error event scoped to one request
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}
