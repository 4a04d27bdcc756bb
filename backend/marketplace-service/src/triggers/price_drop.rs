use async_trait::async_trait;
use std::sync::Arc;

use super::{product_link, Trigger};
use crate::error::ServiceResult;
use crate::models::{Notification, NotificationType, RelatedData};
use crate::services::{templates, NewNotification, NotificationService};
use crate::store::{Change, ChangeEvent};

/// Price went down: every favoriter except the seller hears about it. Ids
/// collapse to the latest drop per (user, product).
pub struct PriceDropTrigger {
    notifications: Arc<NotificationService>,
}

impl PriceDropTrigger {
    pub fn new(notifications: Arc<NotificationService>) -> Self {
        Self { notifications }
    }
}

#[async_trait]
impl Trigger for PriceDropTrigger {
    fn name(&self) -> &'static str {
        "price_drop"
    }

    async fn handle(&self, event: &ChangeEvent) -> ServiceResult<()> {
        let ChangeEvent::Product(Change {
            before: Some(before),
            after: Some(after),
        }) = event
        else {
            return Ok(());
        };
        if after.price >= before.price {
            return Ok(());
        }

        let message = templates::price_drop(&after.name, before.price, after.price);
        for user_id in after
            .favorited_by
            .iter()
            .copied()
            .filter(|u| *u != after.seller_id)
        {
            self.notifications
                .publish(NewNotification {
                    id: Notification::price_drop_id(user_id, after.id),
                    user_id,
                    notification_type: NotificationType::PriceDrop,
                    message: message.clone(),
                    related_data: RelatedData {
                        product_id: Some(after.id),
                        actor_id: Some(after.seller_id),
                        link: Some(product_link(after.id)),
                        ..Default::default()
                    },
                })
                .await?;
        }
        Ok(())
    }
}
