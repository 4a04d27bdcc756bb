use async_trait::async_trait;
use std::sync::Arc;

use super::{display_name, product_link, Trigger};
use crate::error::ServiceResult;
use crate::models::{Notification, NotificationType, RelatedData};
use crate::services::{templates, NewNotification, NotificationService};
use crate::store::{Change, ChangeEvent, DocumentStore};

/// Tells the seller who favorited their listing. One notification per
/// (product, liker): a refavorite overwrites rather than duplicates.
pub struct FavoriteAddedTrigger {
    store: Arc<dyn DocumentStore>,
    notifications: Arc<NotificationService>,
}

impl FavoriteAddedTrigger {
    pub fn new(store: Arc<dyn DocumentStore>, notifications: Arc<NotificationService>) -> Self {
        Self {
            store,
            notifications,
        }
    }
}

#[async_trait]
impl Trigger for FavoriteAddedTrigger {
    fn name(&self) -> &'static str {
        "favorite_added"
    }

    async fn handle(&self, event: &ChangeEvent) -> ServiceResult<()> {
        let ChangeEvent::Product(Change {
            before: Some(before),
            after: Some(after),
        }) = event
        else {
            return Ok(());
        };

        let added = after
            .favorited_by
            .difference(&before.favorited_by)
            .copied()
            .filter(|liker| *liker != after.seller_id);

        for liker_id in added {
            let liker_name = display_name(self.store.as_ref(), liker_id).await;
            self.notifications
                .publish(NewNotification {
                    id: Notification::favorite_id(after.seller_id, after.id, liker_id),
                    user_id: after.seller_id,
                    notification_type: NotificationType::NewFavorite,
                    message: templates::new_favorite(&liker_name, &after.name),
                    related_data: RelatedData {
                        product_id: Some(after.id),
                        actor_id: Some(liker_id),
                        link: Some(product_link(after.id)),
                        ..Default::default()
                    },
                })
                .await?;
        }
        Ok(())
    }
}
