use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use tokio::sync::RwLock;

use crate::error::AppResult;
use crate::filter::{matches_all, Page, Predicate};
use crate::models::{ItemPatch, MarketplaceItem, NewItem};

use super::ItemStore;

struct MemoryState {
    items: BTreeMap<i32, MarketplaceItem>,
    next_id: i32,
    last_stamp: DateTime<Utc>,
}

impl MemoryState {
    /// Current time at microsecond precision, strictly after the previous stamp.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let stamp = if now > self.last_stamp {
            now
        } else {
            self.last_stamp + Duration::microseconds(1)
        };
        self.last_stamp = stamp;
        stamp
    }
}

/// In-process Record Store. Nothing is persisted across restarts.
pub struct MemoryItemStore {
    state: RwLock<MemoryState>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    /// Seeds the store with fixture rows, keeping their ids and timestamps.
    pub fn with_items(items: Vec<MarketplaceItem>) -> Self {
        let next_id = items.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        let last_stamp = items
            .iter()
            .flat_map(|i| [i.posted_at, i.updated_at])
            .max()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Self {
            state: RwLock::new(MemoryState {
                items: items.into_iter().map(|i| (i.id, i)).collect(),
                next_id,
                last_stamp,
            }),
        }
    }
}

impl Default for MemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[tonic::async_trait]
impl ItemStore for MemoryItemStore {
    async fn insert(&self, item: NewItem) -> AppResult<MarketplaceItem> {
        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;
        let now = state.tick();

        let created = MarketplaceItem {
            id,
            title: item.title,
            description: item.description,
            price: item.price,
            category: item.category,
            condition: item.condition,
            location: item.location,
            images: item.images,
            is_available: true,
            posted_at: now,
            updated_at: now,
        };
        state.items.insert(id, created.clone());

        tracing::debug!("Memory insert: id={}", id);
        Ok(created)
    }

    async fn get(&self, id: i32) -> AppResult<Option<MarketplaceItem>> {
        Ok(self.state.read().await.items.get(&id).cloned())
    }

    async fn find(
        &self,
        predicates: &[Predicate],
        window: Option<Page>,
    ) -> AppResult<Vec<MarketplaceItem>> {
        let state = self.state.read().await;
        let mut matched: Vec<MarketplaceItem> = state
            .items
            .values()
            .filter(|item| matches_all(predicates, item))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then(a.id.cmp(&b.id)));

        Ok(match window {
            Some(page) => page.slice(matched),
            None => matched,
        })
    }

    async fn update(&self, id: i32, patch: ItemPatch) -> AppResult<Option<MarketplaceItem>> {
        let mut state = self.state.write().await;
        let now = state.tick();

        let Some(item) = state.items.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply_to(item);
        item.updated_at = now;

        tracing::debug!("Memory update: id={}", id);
        Ok(Some(item.clone()))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    fn backend(&self) -> &str {
        "memory"
    }
}
