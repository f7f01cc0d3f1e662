//! 有界翻译结果缓存 / Bounded translation result cache
//!
//! 纯优化：清空缓存不影响正确性，只影响延迟与成本
//! A pure optimization: an empty cache never changes correctness, only
//! latency and cost.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// 缓存键 / Cache key
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: String,
    pub target: String,
    pub text: String,
}

struct CacheEntry {
    value: String,
    inserted_at: Instant,
}

struct CacheInner {
    map: HashMap<CacheKey, CacheEntry>,
    order: VecDeque<CacheKey>,
}

/// 有界TTL缓存；读与插入-淘汰序列都在同一把锁下
/// Bounded TTL cache; reads and the insert-then-evict sequence run under one lock
pub struct TranslationCache {
    inner: Mutex<CacheInner>,
    max_entries: usize,
    ttl: Duration,
}

impl TranslationCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    /// 命中返回缓存值；超过TTL的条目按过期处理并移除
    /// Returns the cached value on a hit; entries past the TTL are treated as
    /// stale and removed so the caller re-fetches
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let mut inner = self.inner.lock();
        let stale = match inner.map.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if stale {
            inner.map.remove(key);
        }
        None
    }

    /// 插入后超限则淘汰最老的10% / Insert, then evict the oldest 10% once over the limit
    pub fn insert(&self, key: CacheKey, value: String) {
        let mut inner = self.inner.lock();
        let fresh = CacheEntry {
            value,
            inserted_at: Instant::now(),
        };
        if inner.map.insert(key.clone(), fresh).is_none() {
            inner.order.push_back(key);
        }
        if inner.map.len() > self.max_entries {
            let evict = (self.max_entries / 10).max(1);
            for _ in 0..evict {
                if let Some(old) = inner.order.pop_front() {
                    inner.map.remove(&old);
                } else {
                    break;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str) -> CacheKey {
        CacheKey {
            source: "en".into(),
            target: "fr".into(),
            text: text.into(),
        }
    }

    #[test]
    fn hit_and_miss() {
        let cache = TranslationCache::new(10, Duration::from_secs(60));
        assert_eq!(cache.get(&key("hello")), None);
        cache.insert(key("hello"), "bonjour".into());
        assert_eq!(cache.get(&key("hello")), Some("bonjour".into()));
    }

    #[test]
    fn evicts_oldest_tenth_when_over_limit() {
        let cache = TranslationCache::new(10, Duration::from_secs(60));
        for i in 0..11 {
            cache.insert(key(&format!("t{}", i)), format!("v{}", i));
        }
        // 超限后最老的一条(10%)被淘汰 / Oldest entry (10% of 10) evicted once over the limit
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.get(&key("t0")), None);
        assert_eq!(cache.get(&key("t10")), Some("v10".into()));
    }

    #[test]
    fn stale_entries_are_refetched_not_reused() {
        let cache = TranslationCache::new(10, Duration::from_millis(0));
        cache.insert(key("hello"), "bonjour".into());
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(cache.get(&key("hello")), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn reinsert_updates_value_without_duplicating_order() {
        let cache = TranslationCache::new(3, Duration::from_secs(60));
        cache.insert(key("a"), "1".into());
        cache.insert(key("a"), "2".into());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key("a")), Some("2".into()));
    }
}
