use async_trait::async_trait;
use std::sync::Arc;

use super::Trigger;
use crate::error::ServiceResult;
use crate::models::{Notification, NotificationType, RelatedData};
use crate::services::{templates, NewNotification, NotificationService};
use crate::store::{Change, ChangeEvent};

pub struct ReviewCreatedTrigger {
    notifications: Arc<NotificationService>,
}

impl ReviewCreatedTrigger {
    pub fn new(notifications: Arc<NotificationService>) -> Self {
        Self { notifications }
    }
}

#[async_trait]
impl Trigger for ReviewCreatedTrigger {
    fn name(&self) -> &'static str {
        "review_created"
    }

    async fn handle(&self, event: &ChangeEvent) -> ServiceResult<()> {
        let ChangeEvent::Review(Change {
            before: None,
            after: Some(review),
        }) = event
        else {
            return Ok(());
        };

        self.notifications
            .publish(NewNotification {
                id: Notification::review_id(review.rated_user_id, review.id),
                user_id: review.rated_user_id,
                notification_type: NotificationType::NewReview,
                message: templates::new_review(&review.reviewer_name, review.rating),
                related_data: RelatedData {
                    product_id: Some(review.product_id),
                    conversation_id: Some(review.conversation_id),
                    actor_id: Some(review.reviewer_id),
                    review_id: Some(review.id),
                    link: Some(format!("/users/{}/reviews", review.rated_user_id)),
                },
            })
            .await?;
        Ok(())
    }
}
