//! Request contracts. Wire messages are decoded into these typed inputs and
//! checked once; handlers and stores only ever see validated values.

use std::str::FromStr;

use rust_decimal::Decimal;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::filter::{Page, SearchFilter, DEFAULT_LIMIT};
use crate::models::{Category, Condition, ItemPatch, NewItem};
use crate::proto::items::{CreateItemRequest, SearchItemsRequest, UpdateItemRequest};

/// NUMERIC(10, 2)
const PRICE_SCALE: u32 = 2;
const MAX_PRICE_CENTS: i64 = 9_999_999_999;

fn parse_decimal(field: &str, raw: &str) -> AppResult<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|_| AppError::InvalidInput(format!("{} is not a decimal number: {:?}", field, raw)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() || price.is_zero() {
        return Err(ValidationError::new("price_not_positive"));
    }
    if price.normalize().scale() > PRICE_SCALE {
        return Err(ValidationError::new("price_too_precise"));
    }
    if *price > Decimal::new(MAX_PRICE_CENTS, PRICE_SCALE) {
        return Err(ValidationError::new("price_too_large"));
    }
    Ok(())
}

fn validate_min_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::new("min_price_negative"));
    }
    Ok(())
}

fn validate_max_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() || price.is_zero() {
        return Err(ValidationError::new("max_price_not_positive"));
    }
    Ok(())
}

fn validate_image_urls(images: &[String]) -> Result<(), ValidationError> {
    if images.iter().all(|url| validator::validate_url(url.as_str())) {
        Ok(())
    } else {
        Err(ValidationError::new("image_url_invalid"))
    }
}

fn with_storage_scale(mut price: Decimal) -> Decimal {
    price.rescale(PRICE_SCALE);
    price
}

#[derive(Debug, Clone, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 10, max = 2000))]
    pub description: String,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    pub category: Category,
    pub condition: Condition,
    #[validate(length(min = 1, max = 100))]
    pub location: String,
    #[validate(length(max = 10), custom = "validate_image_urls")]
    pub images: Vec<String>,
}

impl CreateItemInput {
    pub fn from_proto(req: CreateItemRequest) -> AppResult<Self> {
        let input = Self {
            price: parse_decimal("price", &req.price)?,
            category: Category::from_proto(req.category)?,
            condition: Condition::from_proto(req.condition)?,
            title: req.title,
            description: req.description,
            location: req.location,
            images: req.images,
        };
        input.validate()?;
        Ok(input)
    }

    pub fn into_new_item(self) -> NewItem {
        NewItem {
            title: self.title,
            description: self.description,
            price: with_storage_scale(self.price),
            category: self.category,
            condition: self.condition,
            location: self.location,
            images: self.images,
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct UpdateItemInput {
    pub id: i32,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 10, max = 2000))]
    pub description: Option<String>,
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    pub category: Option<Category>,
    pub condition: Option<Condition>,
    #[validate(length(min = 1, max = 100))]
    pub location: Option<String>,
    #[validate(length(max = 10), custom = "validate_image_urls")]
    pub images: Option<Vec<String>>,
    pub is_available: Option<bool>,
}

impl UpdateItemInput {
    pub fn from_proto(req: UpdateItemRequest) -> AppResult<Self> {
        let input = Self {
            id: req.id,
            title: req.title,
            description: req.description,
            price: req
                .price
                .as_deref()
                .map(|raw| parse_decimal("price", raw))
                .transpose()?,
            category: req.category.map(Category::from_proto).transpose()?,
            condition: req.condition.map(Condition::from_proto).transpose()?,
            location: req.location,
            images: req.images.map(|list| list.urls),
            is_available: req.is_available,
        };
        input.validate()?;
        Ok(input)
    }

    pub fn into_patch(self) -> (i32, ItemPatch) {
        let patch = ItemPatch {
            title: self.title,
            description: self.description,
            price: self.price.map(with_storage_scale),
            category: self.category,
            condition: self.condition,
            location: self.location,
            images: self.images,
            is_available: self.is_available,
        };
        (self.id, patch)
    }
}

#[derive(Debug, Clone, Validate)]
pub struct SearchItemsInput {
    pub query: Option<String>,
    pub category: Option<Category>,
    pub condition: Option<Condition>,
    #[validate(custom = "validate_min_price")]
    pub min_price: Option<Decimal>,
    #[validate(custom = "validate_max_price")]
    pub max_price: Option<Decimal>,
    pub location: Option<String>,
    pub available_only: bool,
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
    #[validate(range(min = 0))]
    pub offset: i64,
}

impl SearchItemsInput {
    pub fn from_proto(req: SearchItemsRequest) -> AppResult<Self> {
        let input = Self {
            query: non_empty(req.query),
            category: req.category.map(Category::from_proto).transpose()?,
            condition: req.condition.map(Condition::from_proto).transpose()?,
            min_price: req
                .min_price
                .as_deref()
                .map(|raw| parse_decimal("min_price", raw))
                .transpose()?,
            max_price: req
                .max_price
                .as_deref()
                .map(|raw| parse_decimal("max_price", raw))
                .transpose()?,
            location: non_empty(req.location),
            available_only: req.available_only.unwrap_or(true),
            limit: req.limit.map(i64::from).unwrap_or(DEFAULT_LIMIT),
            offset: req.offset.map(i64::from).unwrap_or(0),
        };
        input.validate()?;
        Ok(input)
    }

    pub fn into_filter(self) -> AppResult<SearchFilter> {
        Ok(SearchFilter {
            page: Page::new(self.limit, self.offset)?,
            query: self.query,
            category: self.category,
            condition: self.condition,
            min_price: self.min_price,
            max_price: self.max_price,
            location: self.location,
            available_only: self.available_only,
        })
    }
}
