/// Reactive rules run after commits, one per concern.
///
/// Each trigger filters the change feed for the single transition it cares
/// about. Failures are logged by the runner and never reach the writer.
pub mod cleanup;
pub mod favorite;
pub mod message;
pub mod price_drop;
pub mod review;
pub mod runner;
pub mod sold;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ServiceResult;
use crate::push::PushSender;
use crate::services::NotificationService;
use crate::store::{ChangeEvent, DocumentStore};

pub use cleanup::ConversationCleanupTrigger;
pub use favorite::FavoriteAddedTrigger;
pub use message::MessageCreatedTrigger;
pub use price_drop::PriceDropTrigger;
pub use review::ReviewCreatedTrigger;
pub use runner::TriggerRunner;
pub use sold::ItemSoldTrigger;

#[async_trait]
pub trait Trigger: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &ChangeEvent) -> ServiceResult<()>;
}

/// The full rule set wired to one store.
pub fn default_triggers(
    store: Arc<dyn DocumentStore>,
    notifications: Arc<NotificationService>,
    push: Option<Arc<PushSender>>,
) -> Vec<Arc<dyn Trigger>> {
    vec![
        Arc::new(MessageCreatedTrigger::new(
            store.clone(),
            notifications.clone(),
            push,
        )),
        Arc::new(FavoriteAddedTrigger::new(store.clone(), notifications.clone())),
        Arc::new(PriceDropTrigger::new(notifications.clone())),
        Arc::new(ItemSoldTrigger::new(notifications.clone())),
        Arc::new(ReviewCreatedTrigger::new(notifications)),
        Arc::new(ConversationCleanupTrigger::new(store)),
    ]
}

/// Display name for notification text, with a neutral fallback.
pub(crate) async fn display_name(store: &dyn DocumentStore, user_id: Uuid) -> String {
    match store.get_user(user_id).await {
        Ok(Some(user)) => user.display_name,
        _ => "Someone".to_string(),
    }
}

pub(crate) fn product_link(product_id: Uuid) -> String {
    format!("/products/{}", product_id)
}
