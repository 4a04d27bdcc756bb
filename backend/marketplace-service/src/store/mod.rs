/// Document storage: atomic write batches, a change feed and the read
/// queries the services need.
pub mod apply;
pub mod batch;
pub mod change;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::ServiceResult;
use crate::models::{Conversation, Message, Notification, Product, Review, UserProfile};

pub use batch::{
    BidUpdate, ConversationUpdate, NewMessage, Precondition, ProductUpdate, ProfileUpsert,
    WriteBatch, WriteOp,
};
pub use change::{Change, ChangeEvent, ChangeKind};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Capacity of the change feed before slow subscribers start lagging
pub const CHANGE_FEED_CAPACITY: usize = 1024;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Apply the batch all-or-nothing and publish its changes. Returns the
    /// change events of the commit.
    async fn commit(&self, batch: WriteBatch) -> ServiceResult<Vec<ChangeEvent>>;

    /// Receive every change committed after this call.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    async fn get_conversation(&self, id: Uuid) -> ServiceResult<Option<Conversation>>;

    /// Conversations the user participates in, newest activity first.
    async fn conversations_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<Conversation>>;

    async fn conversations_for_user_and_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> ServiceResult<Vec<Conversation>>;

    /// Messages of a conversation, oldest first.
    async fn messages(&self, conversation_id: Uuid) -> ServiceResult<Vec<Message>>;

    async fn get_product(&self, id: Uuid) -> ServiceResult<Option<Product>>;

    async fn products_favorited_by(&self, user_id: Uuid) -> ServiceResult<Vec<Product>>;

    async fn products_by_seller(&self, seller_id: Uuid) -> ServiceResult<Vec<Product>>;

    async fn get_user(&self, id: Uuid) -> ServiceResult<Option<UserProfile>>;

    async fn review_exists(&self, reviewer_id: Uuid, product_id: Uuid) -> ServiceResult<bool>;

    async fn get_review(&self, id: Uuid) -> ServiceResult<Option<Review>>;

    /// Reviews received by the user, newest first.
    async fn reviews_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<Review>>;

    async fn get_notification(&self, id: &str) -> ServiceResult<Option<Notification>>;

    /// Inbox of the user, newest first.
    async fn notifications_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<Notification>>;
}
