use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::AppResult;
use crate::filter::{like_pattern, Page, Predicate};
use crate::models::{ItemPatch, MarketplaceItem, NewItem};

use super::ItemStore;

const ITEM_COLUMNS: &str = "id, title, description, price, category, condition, location, \
     images, is_available, posted_at, updated_at";

/// Builds the filtered, ordered and optionally windowed listing query.
/// All user-supplied values are bound parameters.
pub fn build_find_query(
    predicates: &[Predicate],
    window: Option<Page>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM marketplace_items", ITEM_COLUMNS));

    if !predicates.is_empty() {
        qb.push(" WHERE ");
        let mut separated = qb.separated(" AND ");
        for predicate in predicates {
            match predicate {
                Predicate::TitleContains(needle) => {
                    separated.push("title ILIKE ");
                    separated.push_bind_unseparated(like_pattern(needle));
                }
                Predicate::CategoryIs(category) => {
                    separated.push("category = ");
                    separated.push_bind_unseparated(*category);
                }
                Predicate::ConditionIs(condition) => {
                    separated.push("condition = ");
                    separated.push_bind_unseparated(*condition);
                }
                Predicate::PriceAtLeast(min) => {
                    separated.push("price >= ");
                    separated.push_bind_unseparated(*min);
                }
                Predicate::PriceAtMost(max) => {
                    separated.push("price <= ");
                    separated.push_bind_unseparated(*max);
                }
                Predicate::LocationContains(needle) => {
                    separated.push("location ILIKE ");
                    separated.push_bind_unseparated(like_pattern(needle));
                }
                Predicate::Available => {
                    separated.push("is_available = TRUE");
                }
            }
        }
    }

    qb.push(" ORDER BY posted_at DESC, id ASC");

    if let Some(page) = window {
        qb.push(" LIMIT ").push_bind(page.limit());
        qb.push(" OFFSET ").push_bind(page.offset());
    }

    qb
}

/// Builds a single-statement partial update; `updated_at` is always refreshed.
pub fn build_update_query(id: i32, patch: &ItemPatch) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE marketplace_items SET updated_at = NOW()");

    if let Some(title) = &patch.title {
        qb.push(", title = ").push_bind(title.clone());
    }
    if let Some(description) = &patch.description {
        qb.push(", description = ").push_bind(description.clone());
    }
    if let Some(price) = patch.price {
        qb.push(", price = ").push_bind(price);
    }
    if let Some(category) = patch.category {
        qb.push(", category = ").push_bind(category);
    }
    if let Some(condition) = patch.condition {
        qb.push(", condition = ").push_bind(condition);
    }
    if let Some(location) = &patch.location {
        qb.push(", location = ").push_bind(location.clone());
    }
    if let Some(images) = &patch.images {
        qb.push(", images = ").push_bind(images.clone());
    }
    if let Some(is_available) = patch.is_available {
        qb.push(", is_available = ").push_bind(is_available);
    }

    qb.push(" WHERE id = ").push_bind(id);
    qb.push(" RETURNING ").push(ITEM_COLUMNS);
    qb
}

pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[tonic::async_trait]
impl ItemStore for PgItemStore {
    async fn insert(&self, item: NewItem) -> AppResult<MarketplaceItem> {
        let created = sqlx::query_as::<_, MarketplaceItem>(&format!(
            "INSERT INTO marketplace_items \
             (title, description, price, category, condition, location, images, is_available) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE) \
             RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.price)
        .bind(item.category)
        .bind(item.condition)
        .bind(&item.location)
        .bind(&item.images)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Postgres insert: id={}", created.id);
        Ok(created)
    }

    async fn get(&self, id: i32) -> AppResult<Option<MarketplaceItem>> {
        let item = sqlx::query_as::<_, MarketplaceItem>(&format!(
            "SELECT {} FROM marketplace_items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn find(
        &self,
        predicates: &[Predicate],
        window: Option<Page>,
    ) -> AppResult<Vec<MarketplaceItem>> {
        let mut qb = build_find_query(predicates, window);
        tracing::debug!("Postgres find: {}", qb.sql());

        let items = qb
            .build_query_as::<MarketplaceItem>()
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    async fn update(&self, id: i32, patch: ItemPatch) -> AppResult<Option<MarketplaceItem>> {
        let mut qb = build_update_query(id, &patch);
        tracing::debug!("Postgres update: id={}, sql={}", id, qb.sql());

        let item = qb
            .build_query_as::<MarketplaceItem>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SearchFilter;
    use crate::models::{Category, Condition};
    use rust_decimal::Decimal;

    #[test]
    fn test_default_search_sql() {
        let filter = SearchFilter::default();
        let qb = build_find_query(&filter.predicates(), Some(filter.page));
        assert_eq!(
            qb.sql(),
            format!(
                "SELECT {} FROM marketplace_items WHERE is_available = TRUE \
                 ORDER BY posted_at DESC, id ASC LIMIT $1 OFFSET $2",
                ITEM_COLUMNS
            )
        );
    }

    #[test]
    fn test_full_search_sql_binds_every_value() {
        let filter = SearchFilter {
            query: Some("laptop".into()),
            category: Some(Category::Laptops),
            condition: Some(Condition::Excellent),
            min_price: Some(Decimal::from(100)),
            max_price: Some(Decimal::from(900)),
            location: Some("Seattle".into()),
            available_only: true,
            page: Page::new(10, 20).unwrap(),
        };
        let qb = build_find_query(&filter.predicates(), Some(filter.page));
        let sql = qb.sql();

        assert!(sql.contains(
            "WHERE title ILIKE $1 AND category = $2 AND condition = $3 \
             AND price >= $4 AND price <= $5 AND location ILIKE $6 AND is_available = TRUE"
        ));
        assert!(sql.ends_with("ORDER BY posted_at DESC, id ASC LIMIT $7 OFFSET $8"));
        assert!(!sql.contains("laptop"));
    }

    #[test]
    fn test_unfiltered_unwindowed_sql() {
        let qb = build_find_query(&[], None);
        assert_eq!(
            qb.sql(),
            format!(
                "SELECT {} FROM marketplace_items ORDER BY posted_at DESC, id ASC",
                ITEM_COLUMNS
            )
        );
    }

    #[test]
    fn test_update_sql_sets_only_present_fields() {
        let patch = ItemPatch {
            price: Some(Decimal::new(85000, 2)),
            is_available: Some(false),
            ..Default::default()
        };
        let qb = build_update_query(42, &patch);
        assert_eq!(
            qb.sql(),
            format!(
                "UPDATE marketplace_items SET updated_at = NOW(), price = $1, is_available = $2 \
                 WHERE id = $3 RETURNING {}",
                ITEM_COLUMNS
            )
        );
    }

    #[test]
    fn test_empty_update_still_refreshes_timestamp() {
        let qb = build_update_query(1, &ItemPatch::default());
        assert!(qb
            .sql()
            .starts_with("UPDATE marketplace_items SET updated_at = NOW() WHERE id = $1"));
    }
}
