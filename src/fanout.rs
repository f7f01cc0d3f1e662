//! 消息扇出路由 / Message fan-out router
//!
//! 一条逻辑消息按接收方语言扇出为多份个性化负载：按唯一目标语言去重后
//! 每种语言只翻译一次，单语言失败只影响该语言的副本，整体投递不中断。
//! One logical message fans out into per-recipient personalized payloads:
//! target languages are de-duplicated so each unique language is translated
//! exactly once, and a single language's failure never aborts the send.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::Result;
use futures_util::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::delivery::DeliveryMux;
use crate::directory::Directory;
use crate::domain::message::ReceiveMessagePayload;
use crate::lang::normalize_lang;
use crate::presence::PresenceRegistry;
use crate::rooms::RoomRegistry;
use crate::storage::{MessageRecord, MessageStore};
use crate::translate::TranslationClient;

/// 单个接收方的投递记录 / Per-recipient delivery record
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub recipient: String,
    pub language: String,
    pub content: String,
    pub online: bool,
}

/// 一次路由的结果 / Outcome of one routing pass
pub struct RouteOutcome {
    pub record: MessageRecord,
    pub deliveries: Vec<DeliveryRecord>,
}

pub struct FanoutRouter {
    directory: Arc<dyn Directory>,
    translator: Arc<TranslationClient>,
    store: Arc<dyn MessageStore>,
    rooms: Arc<RoomRegistry>,
    presence: Arc<PresenceRegistry>,
    delivery: Arc<dyn DeliveryMux>,
}

impl FanoutRouter {
    pub fn new(
        directory: Arc<dyn Directory>,
        translator: Arc<TranslationClient>,
        store: Arc<dyn MessageStore>,
        rooms: Arc<RoomRegistry>,
        presence: Arc<PresenceRegistry>,
        delivery: Arc<dyn DeliveryMux>,
    ) -> Self {
        Self {
            directory,
            translator,
            store,
            rooms,
            presence,
            delivery,
        }
    }

    /// 房间消息路由 / Route a room message
    pub async fn route_room(&self, sender: &str, text: &str, room_id: &str) -> Result<RouteOutcome> {
        let original_language = normalize_lang(&self.directory.preferred_language(sender).await);

        let members: Vec<String> = self
            .rooms
            .members(room_id)
            .into_iter()
            .filter(|m| m != sender)
            .collect();

        let mut member_langs: HashMap<String, String> = HashMap::new();
        for member in &members {
            let lang = normalize_lang(&self.directory.preferred_language(member).await);
            member_langs.insert(member.clone(), lang);
        }

        let translations = self
            .build_translations(text, &original_language, member_langs.values())
            .await;

        let record = self.persist(
            sender,
            text,
            &original_language,
            &translations,
            Some(room_id),
            None,
        )?;

        // 翻译是挂起点，成员在线状态可能已变化；投递地址必须重新解析
        // Translation suspended us; membership/presence may have changed, so
        // delivery addresses are re-resolved here
        let mut records = Vec::with_capacity(members.len());
        for member in &members {
            let lang = member_langs
                .get(member)
                .cloned()
                .unwrap_or_else(|| original_language.clone());
            let content = translations
                .get(&lang)
                .cloned()
                .unwrap_or_else(|| text.to_string());
            let online = self.deliver(member, &record, &content);
            records.push(DeliveryRecord {
                recipient: member.clone(),
                language: lang,
                content,
                online,
            });
        }
        info!(
            "📨 room {} fan-out: {} recipients, {} languages",
            room_id,
            records.len(),
            translations.len()
        );
        Ok(RouteOutcome {
            record,
            deliveries: records,
        })
    }

    /// 单聊消息路由 / Route a direct message
    ///
    /// 发送方永远收到自己的原文回显，不收翻译后的回声
    /// The sender always gets their original text back, never a translated echo.
    pub async fn route_direct(
        &self,
        sender: &str,
        text: &str,
        receiver: &str,
    ) -> Result<RouteOutcome> {
        let original_language = normalize_lang(&self.directory.preferred_language(sender).await);
        let receiver_language = normalize_lang(&self.directory.preferred_language(receiver).await);

        let translations = self
            .build_translations(text, &original_language, std::iter::once(&receiver_language))
            .await;

        let record = self.persist(
            sender,
            text,
            &original_language,
            &translations,
            None,
            Some(receiver),
        )?;

        let content = translations
            .get(&receiver_language)
            .cloned()
            .unwrap_or_else(|| text.to_string());
        let online = self.deliver(receiver, &record, &content);
        Ok(RouteOutcome {
            deliveries: vec![DeliveryRecord {
                recipient: receiver.to_string(),
                language: receiver_language,
                content,
                online,
            }],
            record,
        })
    }

    /// 构建翻译表：以原语言种子化，按唯一目标语言并发翻译
    /// Build the translations table: seeded with the original language,
    /// unique target languages translated concurrently
    async fn build_translations<'a>(
        &self,
        text: &str,
        original_language: &str,
        recipient_langs: impl Iterator<Item = &'a String>,
    ) -> HashMap<String, String> {
        let mut translations: HashMap<String, String> = HashMap::new();
        translations.insert(original_language.to_string(), text.to_string());

        let targets: BTreeSet<String> = recipient_langs
            .filter(|lang| !translations.contains_key(*lang))
            .cloned()
            .collect();

        let outcomes = join_all(targets.iter().map(|lang| {
            let translator = self.translator.clone();
            async move {
                let result = translator.translate(text, original_language, lang).await;
                (lang.clone(), result)
            }
        }))
        .await;

        for (lang, outcome) in outcomes {
            match outcome {
                Ok(translated) => {
                    translations.insert(lang, translated);
                }
                Err(e) => {
                    // 失败语言不落库；投递时按缺键回退原文，不中止整次发送
                    // A failed language stays absent from the map; delivery
                    // falls back to the original text on the missing key and
                    // the send never aborts
                    warn!("⚠️  translation to {} failed, will deliver original: {}", lang, e);
                }
            }
        }
        translations
    }

    /// 所有翻译尘埃落定后恰好持久化一次 / Persisted exactly once, after all translations settle
    fn persist(
        &self,
        sender: &str,
        text: &str,
        original_language: &str,
        translations: &HashMap<String, String>,
        room_id: Option<&str>,
        receiver: Option<&str>,
    ) -> Result<MessageRecord> {
        let record = MessageRecord {
            message_id: Uuid::new_v4().to_string(),
            from_uid: sender.to_string(),
            to_uid: receiver.map(str::to_string),
            room_id: room_id.map(str::to_string),
            content: text.to_string(),
            original_content: Some(text.to_string()),
            original_language: Some(original_language.to_string()),
            translations: translations.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            msg_type: if room_id.is_some() {
                "room_message".to_string()
            } else {
                "direct_message".to_string()
            },
        };
        self.store.append_message(&record)?;
        Ok(record)
    }

    /// 在线则推送；离线副本已随记录持久化，等待后续拉取
    /// Push when online; the offline copy is already persisted with the
    /// record for later retrieval
    fn deliver(&self, recipient: &str, record: &MessageRecord, content: &str) -> bool {
        match self.presence.resolve(recipient) {
            Some(address) => {
                let payload = ReceiveMessagePayload {
                    content: content.to_string(),
                    original_content: record.content.clone(),
                    original_language: record
                        .original_language
                        .clone()
                        .unwrap_or_else(|| crate::lang::DEFAULT_LANG.to_string()),
                    translations: record.translations.clone(),
                    room: record.room_id.clone(),
                    from: record.from_uid.clone(),
                    message_id: record.message_id.clone(),
                    timestamp: record.timestamp,
                };
                match serde_json::to_value(&payload) {
                    Ok(value) => self.delivery.push(&address, "receiveMessage", value),
                    Err(e) => warn!("⚠️  receiveMessage payload serialization failed: {}", e),
                }
                true
            }
            None => {
                debug!("📭 {} offline, message persisted for later", recipient);
                false
            }
        }
    }
}
