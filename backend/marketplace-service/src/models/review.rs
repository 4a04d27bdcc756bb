use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the sale the reviewer was on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewerRole {
    Buyer,
    Seller,
}

impl ReviewerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewerRole::Buyer => "buyer",
            ReviewerRole::Seller => "seller",
        }
    }
}

/// Immutable once written. At most one per (reviewer, product).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub rated_user_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewer_name: String,
    pub product_id: Uuid,
    pub conversation_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub reviewer_role: ReviewerRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
}

impl RatingSummary {
    pub fn from_reviews(reviews: &[Review]) -> Self {
        if reviews.is_empty() {
            return Self {
                average: 0.0,
                count: 0,
            };
        }
        let total: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
        let count = reviews.len() as i64;
        Self {
            average: total as f64 / count as f64,
            count,
        }
    }
}
