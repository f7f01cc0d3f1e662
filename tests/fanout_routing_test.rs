//! 扇出路由集成测试 / Fan-out routing integration tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use babel_im::delivery::DeliveryMux;
use babel_im::directory::InMemoryDirectory;
use babel_im::error::{RelayError, RelayResult};
use babel_im::fanout::FanoutRouter;
use babel_im::presence::PresenceRegistry;
use babel_im::providers::TranslationProvider;
use babel_im::rooms::RoomRegistry;
use babel_im::storage::MemoryStore;
use babel_im::translate::TranslationClient;

/// 计数翻译供应商：`lang:text`形式的可预测输出 / Counting provider with predictable `lang:text` output
struct CountingTranslator {
    calls: AtomicUsize,
    failing_targets: Vec<String>,
}

impl CountingTranslator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing_targets: Vec::new(),
        }
    }

    fn failing_for(targets: &[&str]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing_targets: targets.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl TranslationProvider for CountingTranslator {
    async fn translate_batch(
        &self,
        texts: &[String],
        _source: Option<&str>,
        target: &str,
    ) -> RelayResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_targets.iter().any(|t| t == target) {
            return Err(RelayError::Provider(format!("no model for {}", target)));
        }
        Ok(texts.iter().map(|t| format!("{}:{}", target, t)).collect())
    }

    async fn supported_languages(&self) -> RelayResult<Vec<String>> {
        Ok(vec!["en".into(), "fr".into(), "de".into(), "hi".into()])
    }
}

/// 记录所有推送的投递复用器 / Delivery mux recording every push
#[derive(Default)]
struct RecordingMux {
    pushes: Mutex<Vec<(String, String, serde_json::Value)>>,
}

impl DeliveryMux for RecordingMux {
    fn push(&self, address: &str, event: &str, payload: serde_json::Value) {
        self.pushes
            .lock()
            .push((address.to_string(), event.to_string(), payload));
    }
}

struct Harness {
    router: FanoutRouter,
    directory: Arc<InMemoryDirectory>,
    rooms: Arc<RoomRegistry>,
    presence: Arc<PresenceRegistry>,
    store: Arc<MemoryStore>,
    mux: Arc<RecordingMux>,
    provider: Arc<CountingTranslator>,
}

fn harness_with(provider: CountingTranslator) -> Harness {
    let provider = Arc::new(provider);
    let directory = Arc::new(InMemoryDirectory::new());
    let rooms = Arc::new(RoomRegistry::new());
    let presence = Arc::new(PresenceRegistry::new());
    let store = Arc::new(MemoryStore::new());
    let mux = Arc::new(RecordingMux::default());
    let translator = Arc::new(TranslationClient::new(
        provider.clone(),
        100,
        std::time::Duration::from_secs(3600),
        25,
        1,
    ));
    let router = FanoutRouter::new(
        directory.clone(),
        translator,
        store.clone(),
        rooms.clone(),
        presence.clone(),
        mux.clone(),
    );
    Harness {
        router,
        directory,
        rooms,
        presence,
        store,
        mux,
        provider,
    }
}

fn join_online(h: &Harness, room: &str, uid: &str, lang: &str) {
    h.directory.set_language(uid, lang);
    h.rooms.join(room, uid);
    h.presence.register(uid, &format!("conn-{}", uid));
}

#[tokio::test]
async fn room_fanout_translates_each_unique_language_once() {
    let h = harness_with(CountingTranslator::new());
    join_online(&h, "lobby", "alice", "en");
    join_online(&h, "lobby", "bob", "en");
    join_online(&h, "lobby", "carol", "en");
    join_online(&h, "lobby", "dieter", "de");
    join_online(&h, "lobby", "dora", "de");
    join_online(&h, "lobby", "fabien", "fr");
    join_online(&h, "lobby", "fleur", "fr");

    let outcome = h.router.route_room("alice", "hello", "lobby").await.unwrap();

    // en是原语言，fr和de各翻译一次 / en is the original; fr and de translate once each
    assert_eq!(h.provider.calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.deliveries.len(), 6);
    assert_eq!(outcome.record.translations.len(), 3);
    assert_eq!(
        outcome.record.translations.get("fr").map(String::as_str),
        Some("fr:hello")
    );
    assert_eq!(
        outcome.record.translations.get("de").map(String::as_str),
        Some("de:hello")
    );
    assert_eq!(
        outcome.record.translations.get("en").map(String::as_str),
        Some("hello")
    );
}

#[tokio::test]
async fn recipients_receive_their_own_language() {
    let h = harness_with(CountingTranslator::new());
    join_online(&h, "lobby", "alice", "en");
    join_online(&h, "lobby", "fabien", "fr");
    join_online(&h, "lobby", "dieter", "de");

    let outcome = h.router.route_room("alice", "hello", "lobby").await.unwrap();

    for delivery in &outcome.deliveries {
        match delivery.recipient.as_str() {
            "fabien" => assert_eq!(delivery.content, "fr:hello"),
            "dieter" => assert_eq!(delivery.content, "de:hello"),
            other => panic!("unexpected recipient {}", other),
        }
        assert!(delivery.online);
    }

    // 推送负载携带个性化content与完整translations表
    // Pushed payloads carry the personalized content plus the full translations table
    let pushes = h.mux.pushes.lock();
    assert_eq!(pushes.len(), 2);
    let addresses: HashSet<&str> = pushes.iter().map(|(a, _, _)| a.as_str()).collect();
    assert!(addresses.contains("conn-fabien"));
    assert!(addresses.contains("conn-dieter"));
    for (_, event, payload) in pushes.iter() {
        assert_eq!(event, "receiveMessage");
        assert_eq!(payload["originalContent"], "hello");
        assert_eq!(payload["originalLanguage"], "en");
        assert_eq!(payload["translations"].as_object().unwrap().len(), 3);
    }
}

#[tokio::test]
async fn direct_same_language_never_calls_the_provider() {
    let h = harness_with(CountingTranslator::new());
    h.directory.set_language("alice", "en");
    h.directory.set_language("bob", "en");
    h.presence.register("bob", "conn-bob");

    let outcome = h.router.route_direct("alice", "hi bob", "bob").await.unwrap();

    assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.deliveries[0].content, "hi bob");
    assert_eq!(outcome.record.content, "hi bob");
}

#[tokio::test]
async fn one_failing_language_never_blocks_the_others() {
    let h = harness_with(CountingTranslator::failing_for(&["de"]));
    join_online(&h, "lobby", "alice", "en");
    join_online(&h, "lobby", "fabien", "fr");
    join_online(&h, "lobby", "dieter", "de");

    let outcome = h.router.route_room("alice", "hello", "lobby").await.unwrap();

    // de回退原文，fr照常翻译 / de falls back to the original, fr translates as usual
    let by_recipient: std::collections::HashMap<&str, &str> = outcome
        .deliveries
        .iter()
        .map(|d| (d.recipient.as_str(), d.content.as_str()))
        .collect();
    assert_eq!(by_recipient["fabien"], "fr:hello");
    assert_eq!(by_recipient["dieter"], "hello");
    // 落库记录不为失败语言伪造译文 / The persisted record never fakes a translation
    // for the failed language
    assert!(outcome.record.translations.get("de").is_none());
    assert_eq!(
        outcome.record.translations.get("fr").map(String::as_str),
        Some("fr:hello")
    );
    assert_eq!(outcome.record.translations.len(), 2);
}

#[tokio::test]
async fn offline_recipients_are_persisted_not_pushed() {
    let h = harness_with(CountingTranslator::new());
    h.directory.set_language("alice", "en");
    h.directory.set_language("fabien", "fr");
    h.rooms.join("lobby", "alice");
    h.rooms.join("lobby", "fabien");
    // fabien从未注册在线 / fabien never registers as online

    let outcome = h.router.route_room("alice", "hello", "lobby").await.unwrap();

    assert!(!outcome.deliveries[0].online);
    assert!(h.mux.pushes.lock().is_empty());
    let messages = h.store.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].translations.get("fr").map(String::as_str),
        Some("fr:hello")
    );
}

#[tokio::test]
async fn sender_is_excluded_from_room_fanout() {
    let h = harness_with(CountingTranslator::new());
    join_online(&h, "lobby", "alice", "en");
    join_online(&h, "lobby", "bob", "en");

    let outcome = h.router.route_room("alice", "hello", "lobby").await.unwrap();

    assert_eq!(outcome.deliveries.len(), 1);
    assert_eq!(outcome.deliveries[0].recipient, "bob");
}
