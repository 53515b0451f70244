// Record Store abstraction for Postgres and in-memory backends

pub mod memory;
pub mod postgres;

pub use memory::MemoryItemStore;
pub use postgres::PgItemStore;

use crate::error::AppResult;
use crate::filter::{Page, Predicate};
use crate::models::{ItemPatch, MarketplaceItem, NewItem};

/// Persistence for marketplace listings.
///
/// Every implementation orders `find` results by `posted_at` descending with
/// `id` ascending as the tie-break, and applies the window after ordering.
#[tonic::async_trait]
pub trait ItemStore: Send + Sync {
    /// Inserts a listing. The store assigns `id`, both timestamps and `is_available = true`.
    async fn insert(&self, item: NewItem) -> AppResult<MarketplaceItem>;

    /// `None` when no listing has this id.
    async fn get(&self, id: i32) -> AppResult<Option<MarketplaceItem>>;

    /// Listings satisfying every predicate. `window` of `None` returns all matches.
    async fn find(
        &self,
        predicates: &[Predicate],
        window: Option<Page>,
    ) -> AppResult<Vec<MarketplaceItem>>;

    /// Applies the present fields and refreshes `updated_at`, all or nothing.
    /// `None` when no listing has this id.
    async fn update(&self, id: i32, patch: ItemPatch) -> AppResult<Option<MarketplaceItem>>;

    /// Liveness probe for health checks.
    async fn ping(&self) -> AppResult<()>;

    /// Backend name for logging
    fn backend(&self) -> &str;
}
