//! Search criteria compilation and result windowing.
//!
//! A [`SearchFilter`] holds already-validated criteria. [`SearchFilter::predicates`]
//! compiles it into a flat conjunction of [`Predicate`]s which every store
//! backend evaluates the same way; [`Page`] carries the window that is applied
//! after filtering and ordering (`posted_at DESC, id ASC`).

use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};
use crate::models::{Category, Condition, MarketplaceItem};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// One window of an ordered result set. Only constructible in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    limit: i64,
    offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> AppResult<Self> {
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        if offset < 0 {
            return Err(AppError::InvalidInput(
                "offset must not be negative".to_string(),
            ));
        }
        Ok(Self { limit, offset })
    }

    /// Forces out-of-range values into bounds instead of rejecting them.
    pub fn clamped(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_LIMIT),
            offset: offset.max(0),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Applies the window to an already filtered and ordered sequence.
    pub fn slice<T>(&self, ordered: Vec<T>) -> Vec<T> {
        ordered
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// A single conjunct of a compiled search.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-insensitive substring of the title.
    TitleContains(String),
    CategoryIs(Category),
    ConditionIs(Condition),
    /// Inclusive lower price bound.
    PriceAtLeast(Decimal),
    /// Inclusive upper price bound.
    PriceAtMost(Decimal),
    /// Case-insensitive substring of the location.
    LocationContains(String),
    Available,
}

impl Predicate {
    pub fn matches(&self, item: &MarketplaceItem) -> bool {
        match self {
            Predicate::TitleContains(needle) => contains_ignore_case(&item.title, needle),
            Predicate::CategoryIs(category) => item.category == *category,
            Predicate::ConditionIs(condition) => item.condition == *condition,
            Predicate::PriceAtLeast(min) => item.price >= *min,
            Predicate::PriceAtMost(max) => item.price <= *max,
            Predicate::LocationContains(needle) => contains_ignore_case(&item.location, needle),
            Predicate::Available => item.is_available,
        }
    }
}

/// True when `item` satisfies every predicate. An empty slice matches everything.
pub fn matches_all(predicates: &[Predicate], item: &MarketplaceItem) -> bool {
    predicates.iter().all(|p| p.matches(item))
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Escapes `LIKE` metacharacters and wraps the text for a substring match.
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Validated search criteria plus the result window.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilter {
    pub query: Option<String>,
    pub category: Option<Category>,
    pub condition: Option<Condition>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub location: Option<String>,
    pub available_only: bool,
    pub page: Page,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            query: None,
            category: None,
            condition: None,
            min_price: None,
            max_price: None,
            location: None,
            available_only: true,
            page: Page::default(),
        }
    }
}

impl SearchFilter {
    /// Compiles the criteria into a conjunction. Absent criteria contribute nothing;
    /// `min_price > max_price` is not cross-checked and simply matches no rows.
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();

        if let Some(query) = &self.query {
            predicates.push(Predicate::TitleContains(query.clone()));
        }
        if let Some(category) = self.category {
            predicates.push(Predicate::CategoryIs(category));
        }
        if let Some(condition) = self.condition {
            predicates.push(Predicate::ConditionIs(condition));
        }
        if let Some(min) = self.min_price {
            predicates.push(Predicate::PriceAtLeast(min));
        }
        if let Some(max) = self.max_price {
            predicates.push(Predicate::PriceAtMost(max));
        }
        if let Some(location) = &self.location {
            predicates.push(Predicate::LocationContains(location.clone()));
        }
        if self.available_only {
            predicates.push(Predicate::Available);
        }

        predicates
    }
}
