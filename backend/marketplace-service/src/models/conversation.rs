use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::product::ProductStatus;

/// Namespace for deterministic conversation ids (UUIDv5 over the sorted
/// participant pair and the product id).
const CONVERSATION_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_93c2_54d8_4e0b_9b7e_2c61_d0a4_f7e3);

/// Bid lifecycle embedded in a conversation. No bid ever placed is represented
/// by `None` on [`Conversation::bid_status`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Pending => "pending",
            BidStatus::Accepted => "accepted",
            BidStatus::Declined => "declined",
            BidStatus::Cancelled => "cancelled",
        }
    }

    /// States from which a new bid may be placed.
    pub const BIDDABLE: [Option<BidStatus>; 3] = [
        None,
        Some(BidStatus::Declined),
        Some(BidStatus::Cancelled),
    ];
}

/// Display snapshot of a participant, taken when the conversation is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantDetails {
    pub display_name: String,
    pub photo_url: Option<String>,
}

/// Product fields copied onto the conversation. Later product edits are not
/// propagated, except the status change made by an accepted bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub price: i64,
    pub seller_id: Uuid,
    #[serde(default)]
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    pub text: String,
    pub sender_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,

    /// Exactly two ids, sorted ascending
    pub participant_ids: Vec<Uuid>,
    pub participant_details: BTreeMap<Uuid, ParticipantDetails>,
    pub product: ProductSnapshot,

    pub last_message: Option<LastMessage>,
    /// Server-assigned; list ordering key
    pub last_activity: DateTime<Utc>,

    #[serde(default)]
    pub unread_counts: BTreeMap<Uuid, i64>,

    pub bidder_id: Option<Uuid>,
    pub bid_price: Option<i64>,
    pub bid_status: Option<BidStatus>,

    #[serde(default)]
    pub review_status: BTreeMap<Uuid, bool>,

    /// Participants who soft-deleted the conversation
    #[serde(default)]
    pub hidden_for: BTreeSet<Uuid>,

    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Deterministic id for the (buyer, seller, product) tuple. Participant
    /// order does not matter.
    pub fn key_for(user_a: Uuid, user_b: Uuid, product_id: Uuid) -> Uuid {
        let [low, high] = sorted_pair(user_a, user_b);
        let mut name = Vec::with_capacity(48);
        name.extend_from_slice(low.as_bytes());
        name.extend_from_slice(high.as_bytes());
        name.extend_from_slice(product_id.as_bytes());
        Uuid::new_v5(&CONVERSATION_NAMESPACE, &name)
    }

    /// Fresh conversation with zeroed counters. Message and activity fields
    /// are filled in by the first message write.
    pub fn open(
        id: Uuid,
        participants: [(Uuid, ParticipantDetails); 2],
        product: ProductSnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        let [(a, a_details), (b, b_details)] = participants;
        let participant_ids = sorted_pair(a, b).to_vec();

        let mut participant_details = BTreeMap::new();
        participant_details.insert(a, a_details);
        participant_details.insert(b, b_details);

        let unread_counts = participant_ids.iter().map(|id| (*id, 0)).collect();

        Self {
            id,
            participant_ids,
            participant_details,
            product,
            last_message: None,
            last_activity: now,
            unread_counts,
            bidder_id: None,
            bid_price: None,
            bid_status: None,
            review_status: BTreeMap::new(),
            hidden_for: BTreeSet::new(),
            created_at: now,
        }
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participant_ids.contains(&user_id)
    }

    /// The counterpart of `user_id`, if `user_id` is a participant.
    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        if !self.is_participant(user_id) {
            return None;
        }
        self.participant_ids.iter().copied().find(|id| *id != user_id)
    }

    pub fn seller_id(&self) -> Uuid {
        self.product.seller_id
    }

    pub fn unread_for(&self, user_id: Uuid) -> i64 {
        self.unread_counts.get(&user_id).copied().unwrap_or(0)
    }

    pub fn is_hidden_for(&self, user_id: Uuid) -> bool {
        self.hidden_for.contains(&user_id)
    }

    /// True once every participant has hidden the conversation.
    pub fn hidden_by_all(&self) -> bool {
        self.participant_ids
            .iter()
            .all(|id| self.hidden_for.contains(id))
    }

    pub fn has_reviewed(&self, user_id: Uuid) -> bool {
        self.review_status.get(&user_id).copied().unwrap_or(false)
    }

    /// Sale price shown in the chat header: the accepted bid when there is
    /// one, otherwise the snapshot list price (direct "mark as sold" path).
    pub fn final_price(&self) -> i64 {
        match (self.bid_status, self.bid_price) {
            (Some(BidStatus::Accepted), Some(price)) => price,
            _ => self.product.price,
        }
    }
}

fn sorted_pair(a: Uuid, b: Uuid) -> [Uuid; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(name: &str) -> ParticipantDetails {
        ParticipantDetails {
            display_name: name.to_string(),
            photo_url: None,
        }
    }

    fn snapshot(seller_id: Uuid, price: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: Uuid::new_v4(),
            name: "Road bike".to_string(),
            image_url: None,
            price,
            seller_id,
            status: None,
        }
    }

    #[test]
    fn test_key_is_order_independent() {
        let (a, b, p) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(Conversation::key_for(a, b, p), Conversation::key_for(b, a, p));
        assert_ne!(
            Conversation::key_for(a, b, p),
            Conversation::key_for(a, b, Uuid::new_v4())
        );
    }

    #[test]
    fn test_open_sorts_participants() {
        let buyer = Uuid::new_v4();
        let seller = Uuid::new_v4();
        let conv = Conversation::open(
            Uuid::new_v4(),
            [(buyer, details("buyer")), (seller, details("seller"))],
            snapshot(seller, 150),
            Utc::now(),
        );

        let mut expected = vec![buyer, seller];
        expected.sort();
        assert_eq!(conv.participant_ids, expected);
        assert_eq!(conv.unread_for(buyer), 0);
        assert_eq!(conv.other_participant(buyer), Some(seller));
        assert_eq!(conv.other_participant(Uuid::new_v4()), None);
    }

    #[test]
    fn test_final_price_prefers_accepted_bid() {
        let seller = Uuid::new_v4();
        let mut conv = Conversation::open(
            Uuid::new_v4(),
            [(Uuid::new_v4(), details("b")), (seller, details("s"))],
            snapshot(seller, 150),
            Utc::now(),
        );
        assert_eq!(conv.final_price(), 150);

        conv.bid_price = Some(100);
        conv.bid_status = Some(BidStatus::Pending);
        assert_eq!(conv.final_price(), 150);

        conv.bid_status = Some(BidStatus::Accepted);
        assert_eq!(conv.final_price(), 100);
    }

    #[test]
    fn test_hidden_by_all() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut conv = Conversation::open(
            Uuid::new_v4(),
            [(a, details("a")), (b, details("b"))],
            snapshot(b, 10),
            Utc::now(),
        );
        conv.hidden_for.insert(a);
        assert!(!conv.hidden_by_all());
        conv.hidden_for.insert(b);
        assert!(conv.hidden_by_all());
    }
}
