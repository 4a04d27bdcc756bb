use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Conversation, Message, MessageKind};
use crate::store::{ConversationUpdate, DocumentStore, NewMessage, WriteBatch, WriteOp};

/// Ops that append one message and apply its side effects on the
/// conversation: last message, activity and +1 unread for every other
/// participant. Shared by chat sends, greetings and bid auto-messages.
pub(crate) fn append_message_ops(
    conversation_id: Uuid,
    participant_ids: &[Uuid],
    sender_id: Uuid,
    text: &str,
    kind: MessageKind,
) -> [WriteOp; 2] {
    let recipients = participant_ids
        .iter()
        .copied()
        .filter(|id| *id != sender_id)
        .collect();

    [
        WriteOp::AppendMessage(NewMessage {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            text: text.trim().to_string(),
            kind,
        }),
        WriteOp::UpdateConversation {
            id: conversation_id,
            update: ConversationUpdate {
                last_message: Some((text.trim().to_string(), sender_id)),
                increment_unread: recipients,
                ..Default::default()
            },
        },
    ]
}

pub(crate) fn require_participant(conv: &Conversation, user_id: Uuid) -> ServiceResult<()> {
    if conv.is_participant(user_id) {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(format!(
            "user {} is not a participant of conversation {}",
            user_id, conv.id
        )))
    }
}

pub struct MessageService {
    store: Arc<dyn DocumentStore>,
}

impl MessageService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Append a chat message. The message, the conversation's last message
    /// and the recipient's unread counter are written in one batch.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        text: &str,
    ) -> ServiceResult<Message> {
        if text.trim().is_empty() {
            return Err(ServiceError::Validation(
                "message text must not be empty".to_string(),
            ));
        }

        let conv = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("conversation {}", conversation_id)))?;
        require_participant(&conv, sender_id)?;

        let batch = WriteBatch::new().extend(append_message_ops(
            conv.id,
            &conv.participant_ids,
            sender_id,
            text,
            MessageKind::User,
        ));
        let events = self.store.commit(batch).await?;

        let message = events
            .iter()
            .find_map(|e| e.created_message().cloned())
            .ok_or_else(|| ServiceError::Internal("message write produced no event".to_string()))?;

        debug!(
            conversation_id = %conversation_id,
            message_id = %message.id,
            "Message sent"
        );
        Ok(message)
    }

    /// Full log of a conversation, oldest first.
    pub async fn list_messages(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> ServiceResult<Vec<Message>> {
        let conv = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("conversation {}", conversation_id)))?;
        require_participant(&conv, user_id)?;
        self.store.messages(conversation_id).await
    }
}
