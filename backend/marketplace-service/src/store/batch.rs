use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    BidStatus, Conversation, MessageKind, Notification, Product, ProductStatus, Review,
};

/// Condition checked against committed state before any op in the batch is
/// applied. A failed precondition aborts the whole batch with `Conflict`.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// No conversation with this id exists yet
    ConversationAbsent(Uuid),
    /// The conversation exists and its bid status is one of `allowed`
    BidStatusIn {
        conversation_id: Uuid,
        allowed: Vec<Option<BidStatus>>,
    },
    /// The conversation's current bid is for exactly this price
    BidPriceIs {
        conversation_id: Uuid,
        price: Option<i64>,
    },
    /// The product exists and is not sold
    ProductNotSold(Uuid),
    /// The reviewer has not reviewed this product yet
    NoReviewFor { reviewer_id: Uuid, product_id: Uuid },
}

/// A message to append. The store assigns the timestamp at commit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub kind: MessageKind,
}

/// Field-level mutation of a product. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductUpdate {
    pub price: Option<i64>,
    pub status: Option<Option<ProductStatus>>,
    /// Set-add paired with a count increment; no-op when already present
    pub add_favorite: Option<Uuid>,
    /// Set-remove paired with a count decrement; no-op when absent
    pub remove_favorite: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BidUpdate {
    pub status: BidStatus,
    pub price: Option<i64>,
    pub bidder_id: Option<Uuid>,
}

/// Field-level mutation of a conversation. Two writers touching unrelated
/// fields never overwrite each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationUpdate {
    /// (text, sender). Stamped with the time of a message appended to the
    /// same conversation in this batch, or the commit time otherwise.
    pub last_message: Option<(String, Uuid)>,
    pub touch_activity: bool,
    pub increment_unread: Vec<Uuid>,
    pub reset_unread: Option<Uuid>,
    pub bid: Option<BidUpdate>,
    pub product_status: Option<Option<ProductStatus>>,
    pub review_status: Vec<(Uuid, bool)>,
    pub hide_for: Vec<Uuid>,
}

/// Profile fields supplied by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpsert {
    pub id: Uuid,
    pub display_name: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create the profile or refresh its name/photo, keeping tokens and ratings
    UpsertProfile(ProfileUpsert),
    CreateProduct(Product),
    UpdateProduct { id: Uuid, update: ProductUpdate },

    CreateConversation(Conversation),
    UpdateConversation { id: Uuid, update: ConversationUpdate },
    /// No-op when the conversation is already gone
    DeleteConversation(Uuid),

    AppendMessage(NewMessage),
    DeleteMessages { conversation_id: Uuid },

    CreateReview(Review),
    RecordRating { user_id: Uuid, rating: i32 },

    AddPushToken { user_id: Uuid, token: String },
    RemovePushTokens { user_id: Uuid, tokens: Vec<String> },

    /// Insert or overwrite by id
    UpsertNotification(Notification),
    MarkNotificationRead { id: String },
    MarkAllNotificationsRead { user_id: Uuid },
    PurgeNotificationsBefore(DateTime<Utc>),
}

/// All-or-nothing unit of work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub preconditions: Vec<Precondition>,
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn op(mut self, op: WriteOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn extend(mut self, ops: impl IntoIterator<Item = WriteOp>) -> Self {
        self.ops.extend(ops);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
