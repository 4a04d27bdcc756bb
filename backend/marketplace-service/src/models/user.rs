use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Profile data supplied by the identity provider plus the marketplace-owned
/// rating aggregate and push token set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub display_name: String,
    pub photo_url: Option<String>,

    /// Device registration tokens for push delivery
    #[serde(default)]
    pub push_tokens: BTreeSet<String>,

    /// Running average of received review ratings
    #[serde(default)]
    pub rating_average: f64,
    #[serde(default)]
    pub rating_count: i64,

    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(id: Uuid, display_name: impl Into<String>, photo_url: Option<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            photo_url,
            push_tokens: BTreeSet::new(),
            rating_average: 0.0,
            rating_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Fold one more rating into the running average.
    pub fn record_rating(&mut self, rating: i32) {
        let total = self.rating_average * self.rating_count as f64 + f64::from(rating);
        self.rating_count += 1;
        self.rating_average = total / self.rating_count as f64;
    }
}
