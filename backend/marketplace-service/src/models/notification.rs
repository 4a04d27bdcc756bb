use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewMessage,
    NewFavorite,
    PriceDrop,
    ItemSold,
    NewReview,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::NewMessage => "new_message",
            NotificationType::NewFavorite => "new_favorite",
            NotificationType::PriceDrop => "price_drop",
            NotificationType::ItemSold => "item_sold",
            NotificationType::NewReview => "new_review",
        }
    }
}

/// Navigation context attached to an inbox entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Inbox entry. Ids for favorite, price drop, sold and review notifications
/// are deterministic so a re-fired trigger overwrites instead of duplicating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub related_data: RelatedData,
}

impl Notification {
    pub fn favorite_id(seller_id: Uuid, product_id: Uuid, liker_id: Uuid) -> String {
        format!("{}_favorite_{}_{}", seller_id, product_id, liker_id)
    }

    pub fn price_drop_id(user_id: Uuid, product_id: Uuid) -> String {
        format!("{}_pricedrop_{}", user_id, product_id)
    }

    pub fn sold_id(seller_id: Uuid, product_id: Uuid) -> String {
        format!("{}_sold_{}", seller_id, product_id)
    }

    pub fn review_id(rated_user_id: Uuid, review_id: Uuid) -> String {
        format!("{}_newreview_{}", rated_user_id, review_id)
    }

    /// Chat notifications are one per message, so they get a fresh id.
    pub fn message_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_ids() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            Notification::favorite_id(a, b, c),
            format!("{a}_favorite_{b}_{c}")
        );
        assert_eq!(Notification::price_drop_id(a, b), format!("{a}_pricedrop_{b}"));
        assert_eq!(Notification::sold_id(a, b), format!("{a}_sold_{b}"));
        assert_eq!(Notification::review_id(a, b), format!("{a}_newreview_{b}"));
        assert_ne!(Notification::message_id(), Notification::message_id());
    }

    #[test]
    fn test_type_serializes_snake_case() {
        let json = serde_json::to_string(&NotificationType::PriceDrop).unwrap();
        assert_eq!(json, "\"price_drop\"");
    }
}
