use async_trait::async_trait;
use std::sync::Arc;

use super::{product_link, Trigger};
use crate::error::ServiceResult;
use crate::models::{Notification, NotificationType, RelatedData};
use crate::services::{templates, NewNotification, NotificationService};
use crate::store::{Change, ChangeEvent};

pub struct ItemSoldTrigger {
    notifications: Arc<NotificationService>,
}

impl ItemSoldTrigger {
    pub fn new(notifications: Arc<NotificationService>) -> Self {
        Self { notifications }
    }
}

#[async_trait]
impl Trigger for ItemSoldTrigger {
    fn name(&self) -> &'static str {
        "item_sold"
    }

    async fn handle(&self, event: &ChangeEvent) -> ServiceResult<()> {
        let ChangeEvent::Product(Change {
            before: Some(before),
            after: Some(after),
        }) = event
        else {
            return Ok(());
        };
        // Only the transition into sold
        if before.is_sold() || !after.is_sold() {
            return Ok(());
        }

        self.notifications
            .publish(NewNotification {
                id: Notification::sold_id(after.seller_id, after.id),
                user_id: after.seller_id,
                notification_type: NotificationType::ItemSold,
                message: templates::item_sold(&after.name),
                related_data: RelatedData {
                    product_id: Some(after.id),
                    link: Some(product_link(after.id)),
                    ..Default::default()
                },
            })
            .await?;
        Ok(())
    }
}
