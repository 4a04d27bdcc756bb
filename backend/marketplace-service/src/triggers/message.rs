use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::Trigger;
use crate::error::ServiceResult;
use crate::models::{Notification, NotificationType, RelatedData};
use crate::push::{PushPayload, PushSender};
use crate::services::{templates, NewNotification, NotificationService};
use crate::store::{ChangeEvent, DocumentStore};

/// New chat message: inbox entry for the recipient plus a push to their
/// devices when they have any.
pub struct MessageCreatedTrigger {
    store: Arc<dyn DocumentStore>,
    notifications: Arc<NotificationService>,
    push: Option<Arc<PushSender>>,
}

impl MessageCreatedTrigger {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        notifications: Arc<NotificationService>,
        push: Option<Arc<PushSender>>,
    ) -> Self {
        Self {
            store,
            notifications,
            push,
        }
    }
}

#[async_trait]
impl Trigger for MessageCreatedTrigger {
    fn name(&self) -> &'static str {
        "message_created"
    }

    async fn handle(&self, event: &ChangeEvent) -> ServiceResult<()> {
        let Some(message) = event.created_message() else {
            return Ok(());
        };

        let Some(conv) = self.store.get_conversation(message.conversation_id).await? else {
            debug!(conversation_id = %message.conversation_id, "Conversation gone, skipping");
            return Ok(());
        };
        let Some(recipient_id) = conv.other_participant(message.sender_id) else {
            return Ok(());
        };

        let sender_name = conv
            .participant_details
            .get(&message.sender_id)
            .map(|d| d.display_name.clone())
            .unwrap_or_else(|| "Someone".to_string());
        let link = format!("/chat/{}", conv.id);

        self.notifications
            .publish(NewNotification {
                id: Notification::message_id(),
                user_id: recipient_id,
                notification_type: NotificationType::NewMessage,
                message: templates::new_message(&sender_name, &message.text),
                related_data: RelatedData {
                    product_id: Some(conv.product.id),
                    conversation_id: Some(conv.id),
                    actor_id: Some(message.sender_id),
                    review_id: None,
                    link: Some(link.clone()),
                },
            })
            .await?;

        let Some(push) = &self.push else {
            return Ok(());
        };
        let tokens: Vec<String> = self
            .store
            .get_user(recipient_id)
            .await?
            .map(|u| u.push_tokens.into_iter().collect())
            .unwrap_or_default();
        if tokens.is_empty() {
            debug!(user_id = %recipient_id, "Recipient has no push tokens");
            return Ok(());
        }

        let mut data = HashMap::new();
        data.insert(
            "type".to_string(),
            NotificationType::NewMessage.as_str().to_string(),
        );
        data.insert("conversation_id".to_string(), conv.id.to_string());

        let payload = PushPayload {
            title: sender_name,
            body: templates::preview(&message.text),
            image: conv.product.image_url.clone(),
            link: Some(link),
            data,
            tokens,
        };
        push.send(recipient_id, &payload).await;
        Ok(())
    }
}
