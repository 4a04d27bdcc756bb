use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::conversation::ProductSnapshot;

/// Listing status. An unset status (`None` on [`Product::status`]) is its own
/// state and is not the same thing as an "available" value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Reserved,
    Sold,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Reserved => "reserved",
            ProductStatus::Sold => "sold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub image_url: Option<String>,

    /// Current asking price in whole currency units
    pub price: i64,

    /// Price at first listing
    pub original_price: i64,

    #[serde(default)]
    pub favorited_by: BTreeSet<Uuid>,

    /// Always equal to `favorited_by.len()`; both move in the same write.
    #[serde(default)]
    pub favorites: i64,

    #[serde(default)]
    pub status: Option<ProductStatus>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(seller_id: Uuid, name: impl Into<String>, price: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            seller_id,
            name: name.into(),
            image_url: None,
            price,
            original_price: price,
            favorited_by: BTreeSet::new(),
            favorites: 0,
            status: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_sold(&self) -> bool {
        self.status == Some(ProductStatus::Sold)
    }

    /// Denormalized copy stored on conversations at creation time.
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            name: self.name.clone(),
            image_url: self.image_url.clone(),
            price: self.price,
            seller_id: self.seller_id,
            status: self.status,
        }
    }
}
