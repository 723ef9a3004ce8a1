use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{repositories::status_cache::StatusCache, value_objects::orders::OrderStatusView};

const DEFAULT_MAX_ENTRIES: usize = 10_000;
const INVALIDATION_MEMORY: Duration = Duration::from_secs(300);

enum Slot {
    View {
        stored_at: Instant,
        view: OrderStatusView,
    },
    Invalidated {
        stored_at: Instant,
        at: DateTime<Utc>,
    },
}

impl Slot {
    fn stored_at(&self) -> Instant {
        match self {
            Slot::View { stored_at, .. } | Slot::Invalidated { stored_at, .. } => *stored_at,
        }
    }
}

/// Process-local status cache with a bounded TTL and entry count.
///
/// Invalidations leave a marker so that a reader who started before the
/// invalidation cannot put its stale view back.
pub struct InMemoryStatusCache {
    inner: RwLock<HashMap<String, Slot>>,
    ttl: Duration,
    max_entries: usize,
}

impl InMemoryStatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn is_live(&self, slot: &Slot) -> bool {
        match slot {
            Slot::View { stored_at, .. } => stored_at.elapsed() <= self.ttl,
            Slot::Invalidated { stored_at, .. } => stored_at.elapsed() <= INVALIDATION_MEMORY,
        }
    }

    fn insert(&self, map: &mut HashMap<String, Slot>, external_id: String, slot: Slot) {
        if map.len() >= self.max_entries && !map.contains_key(&external_id) {
            map.retain(|_, slot| self.is_live(slot));
        }
        if map.len() >= self.max_entries && !map.contains_key(&external_id) {
            if let Some(oldest) = map
                .iter()
                .min_by_key(|(_, slot)| slot.stored_at())
                .map(|(key, _)| key.clone())
            {
                map.remove(&oldest);
            }
        }

        map.insert(external_id, slot);
    }
}

#[async_trait]
impl StatusCache for InMemoryStatusCache {
    async fn get(&self, external_id: &str) -> Option<OrderStatusView> {
        let read = self.inner.read().await;
        match read.get(external_id) {
            Some(Slot::View { stored_at, view }) if stored_at.elapsed() <= self.ttl => {
                Some(view.clone())
            }
            _ => None,
        }
    }

    async fn put(&self, view: OrderStatusView, read_started: DateTime<Utc>) {
        if self.ttl.is_zero() {
            return;
        }

        let mut write = self.inner.write().await;
        if let Some(Slot::Invalidated { stored_at, at }) = write.get(&view.external_id) {
            if stored_at.elapsed() <= INVALIDATION_MEMORY && *at >= read_started {
                debug!(
                    external_id = %view.external_id,
                    "status cache: dropping view read before the last invalidation"
                );
                return;
            }
        }

        let external_id = view.external_id.clone();
        let slot = Slot::View {
            stored_at: Instant::now(),
            view,
        };
        self.insert(&mut write, external_id, slot);
    }

    async fn invalidate(&self, external_id: &str) {
        if self.ttl.is_zero() {
            return;
        }

        let mut write = self.inner.write().await;
        let slot = Slot::Invalidated {
            stored_at: Instant::now(),
            at: Utc::now(),
        };
        self.insert(&mut write, external_id.to_string(), slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(external_id: &str) -> OrderStatusView {
        OrderStatusView::build(external_id, None, None, None)
    }

    #[tokio::test]
    async fn returns_fresh_entries_and_forgets_invalidated_ones() {
        let cache = InMemoryStatusCache::new(Duration::from_secs(60));

        cache.put(view("order_1_abc"), Utc::now()).await;
        assert_eq!(
            cache.get("order_1_abc").await.map(|v| v.external_id),
            Some("order_1_abc".to_string())
        );

        cache.invalidate("order_1_abc").await;
        assert!(cache.get("order_1_abc").await.is_none());
    }

    #[tokio::test]
    async fn view_read_before_invalidation_is_not_stored() {
        let cache = InMemoryStatusCache::new(Duration::from_secs(60));

        let read_started = Utc::now();
        cache.invalidate("order_1_abc").await;
        cache.put(view("order_1_abc"), read_started).await;

        assert!(cache.get("order_1_abc").await.is_none());

        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.put(view("order_1_abc"), Utc::now()).await;

        assert!(cache.get("order_1_abc").await.is_some());
    }

    #[tokio::test]
    async fn zero_ttl_never_stores() {
        let cache = InMemoryStatusCache::new(Duration::ZERO);

        cache.put(view("order_1_abc"), Utc::now()).await;

        assert!(cache.get("order_1_abc").await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_not_served() {
        let cache = InMemoryStatusCache::new(Duration::from_millis(10));

        cache.put(view("order_1_abc"), Utc::now()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.get("order_1_abc").await.is_none());
    }

    #[tokio::test]
    async fn evicts_oldest_entry_when_full() {
        let cache = InMemoryStatusCache::with_capacity(Duration::from_secs(60), 2);

        cache.put(view("a"), Utc::now()).await;
        cache.put(view("b"), Utc::now()).await;
        cache.put(view("c"), Utc::now()).await;

        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
        assert!(cache.get("c").await.is_some());
    }
}
