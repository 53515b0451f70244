use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, AppResult};
use crate::proto::items as pb;

/// Listing category. Stored as the `item_category` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronics,
    Bikes,
    Jewelry,
    Watches,
    Phones,
    Laptops,
    Other,
}

/// Physical condition, declared best to worst so `Ord` follows quality.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "item_condition", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Mint,
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Electronics => "electronics",
            Category::Bikes => "bikes",
            Category::Jewelry => "jewelry",
            Category::Watches => "watches",
            Category::Phones => "phones",
            Category::Laptops => "laptops",
            Category::Other => "other",
        }
    }

    /// Decodes a wire enum value. `CATEGORY_UNSPECIFIED` and unknown values are rejected.
    pub fn from_proto(raw: i32) -> AppResult<Self> {
        let value = pb::Category::try_from(raw)
            .map_err(|_| AppError::InvalidInput(format!("unknown category: {}", raw)))?;
        match value {
            pb::Category::Unspecified => {
                Err(AppError::InvalidInput("category is required".to_string()))
            }
            pb::Category::Electronics => Ok(Category::Electronics),
            pb::Category::Bikes => Ok(Category::Bikes),
            pb::Category::Jewelry => Ok(Category::Jewelry),
            pb::Category::Watches => Ok(Category::Watches),
            pb::Category::Phones => Ok(Category::Phones),
            pb::Category::Laptops => Ok(Category::Laptops),
            pb::Category::Other => Ok(Category::Other),
        }
    }

    pub fn to_proto(self) -> pb::Category {
        match self {
            Category::Electronics => pb::Category::Electronics,
            Category::Bikes => pb::Category::Bikes,
            Category::Jewelry => pb::Category::Jewelry,
            Category::Watches => pb::Category::Watches,
            Category::Phones => pb::Category::Phones,
            Category::Laptops => pb::Category::Laptops,
            Category::Other => pb::Category::Other,
        }
    }
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Mint => "mint",
            Condition::Excellent => "excellent",
            Condition::Good => "good",
            Condition::Fair => "fair",
            Condition::Poor => "poor",
        }
    }

    /// Decodes a wire enum value. `CONDITION_UNSPECIFIED` and unknown values are rejected.
    pub fn from_proto(raw: i32) -> AppResult<Self> {
        let value = pb::Condition::try_from(raw)
            .map_err(|_| AppError::InvalidInput(format!("unknown condition: {}", raw)))?;
        match value {
            pb::Condition::Unspecified => {
                Err(AppError::InvalidInput("condition is required".to_string()))
            }
            pb::Condition::Mint => Ok(Condition::Mint),
            pb::Condition::Excellent => Ok(Condition::Excellent),
            pb::Condition::Good => Ok(Condition::Good),
            pb::Condition::Fair => Ok(Condition::Fair),
            pb::Condition::Poor => Ok(Condition::Poor),
        }
    }

    pub fn to_proto(self) -> pb::Condition {
        match self {
            Condition::Mint => pb::Condition::Mint,
            Condition::Excellent => pb::Condition::Excellent,
            Condition::Good => pb::Condition::Good,
            Condition::Fair => pb::Condition::Fair,
            Condition::Poor => pb::Condition::Poor,
        }
    }
}

/// マーケットプレイス出品
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct MarketplaceItem {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub category: Category,
    pub condition: Condition,
    pub location: String,
    pub images: Vec<String>,
    pub is_available: bool,
    pub posted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MarketplaceItem {
    pub fn to_proto(&self) -> pb::Item {
        pb::Item {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            price: self.price.to_string(),
            category: self.category.to_proto().into(),
            condition: self.condition.to_proto().into(),
            location: self.location.clone(),
            images: self.images.clone(),
            is_available: self.is_available,
            posted_at: self.posted_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }
}

/// Fields of a listing about to be inserted. The store assigns id and timestamps;
/// new listings are always available.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub category: Category,
    pub condition: Condition,
    pub location: String,
    pub images: Vec<String>,
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<Category>,
    pub condition: Option<Condition>,
    pub location: Option<String>,
    pub images: Option<Vec<String>>,
    pub is_available: Option<bool>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        *self == ItemPatch::default()
    }

    /// Writes the present fields onto `item`. Timestamps are the caller's concern.
    pub fn apply_to(&self, item: &mut MarketplaceItem) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(condition) = self.condition {
            item.condition = condition;
        }
        if let Some(location) = &self.location {
            item.location = location.clone();
        }
        if let Some(images) = &self.images {
            item.images = images.clone();
        }
        if let Some(is_available) = self.is_available {
            item.is_available = is_available;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample() -> MarketplaceItem {
        let now = Utc::now();
        MarketplaceItem {
            id: 7,
            title: "Gaming Laptop".to_string(),
            description: "RTX 4070, barely used".to_string(),
            price: Decimal::from_str("999.99").unwrap(),
            category: Category::Laptops,
            condition: Condition::Excellent,
            location: "Seattle".to_string(),
            images: vec!["https://example.com/laptop.jpg".to_string()],
            is_available: true,
            posted_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_to_proto_keeps_price_digits() {
        let proto = sample().to_proto();
        assert_eq!(proto.price, "999.99");
        assert_eq!(proto.category, pb::Category::Laptops as i32);
        assert_eq!(proto.condition, pb::Condition::Excellent as i32);
    }

    #[test]
    fn test_category_from_proto_rejects_unspecified() {
        assert!(Category::from_proto(0).is_err());
        assert!(Category::from_proto(99).is_err());
        assert_eq!(
            Category::from_proto(pb::Category::Bikes as i32).unwrap(),
            Category::Bikes
        );
    }

    #[test]
    fn test_enum_names_match_database_labels() {
        assert_eq!(Category::Watches.as_str(), "watches");
        assert_eq!(Condition::Mint.as_str(), "mint");
        assert_eq!(Condition::Excellent.as_str(), "excellent");
        assert_eq!(Condition::Poor.as_str(), "poor");
        assert_eq!(
            serde_json::to_value(Condition::Fair).unwrap(),
            Condition::Fair.as_str()
        );
    }

    #[test]
    fn test_condition_order_best_to_worst() {
        assert!(Condition::Mint < Condition::Excellent);
        assert!(Condition::Fair < Condition::Poor);
    }

    #[test]
    fn test_serializes_price_as_string() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["price"], "999.99");
        assert_eq!(json["category"], "laptops");
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut item = sample();
        let before = item.clone();
        let patch = ItemPatch {
            price: Some(Decimal::from_str("850.00").unwrap()),
            ..Default::default()
        };
        patch.apply_to(&mut item);

        assert_eq!(item.price.to_string(), "850.00");
        assert_eq!(item.title, before.title);
        assert_eq!(item.images, before.images);
        assert_eq!(item.is_available, before.is_available);
        assert!(!patch.is_empty());
        assert!(ItemPatch::default().is_empty());
    }
}
