use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::message_service::{append_message_ops, require_participant};
use super::templates;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    BidStatus, Conversation, MessageKind, ParticipantDetails, ProductStatus, UserProfile,
};
use crate::store::{ConversationUpdate, DocumentStore, Precondition, WriteBatch, WriteOp};

/// What a participant sees at the top of a chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatHeader {
    pub conversation_id: Uuid,
    pub counterpart_id: Uuid,
    pub counterpart: Option<ParticipantDetails>,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image_url: Option<String>,
    pub product_status: Option<ProductStatus>,
    pub bid_status: Option<BidStatus>,
    pub bid_price: Option<i64>,
    pub final_price: i64,
    /// "Sold for $100" once the product is sold
    pub status_line: Option<String>,
    pub unread: i64,
}

pub struct ConversationService {
    store: Arc<dyn DocumentStore>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Return the conversation for (buyer, seller, product), creating it with
    /// a greeting message on first contact.
    pub async fn find_or_create_conversation(
        &self,
        buyer_id: Uuid,
        seller_id: Uuid,
        product_id: Uuid,
    ) -> ServiceResult<Uuid> {
        if buyer_id == seller_id {
            return Err(ServiceError::Validation(
                "cannot start a conversation with yourself".to_string(),
            ));
        }

        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", product_id)))?;
        if product.seller_id != seller_id {
            return Err(ServiceError::Validation(format!(
                "user {} does not sell product {}",
                seller_id, product_id
            )));
        }

        let id = Conversation::key_for(buyer_id, seller_id, product_id);
        if self.store.get_conversation(id).await?.is_some() {
            return Ok(id);
        }

        // Conversations stored under non-derived ids
        if let Some(existing) = self
            .store
            .conversations_for_user_and_product(buyer_id, product_id)
            .await?
            .into_iter()
            .find(|c| c.is_participant(seller_id))
        {
            return Ok(existing.id);
        }

        let buyer = self.profile(buyer_id).await?;
        let seller = self.profile(seller_id).await?;

        let conv = Conversation::open(
            id,
            [(buyer_id, details(&buyer)), (seller_id, details(&seller))],
            product.snapshot(),
            Utc::now(),
        );
        let participants = conv.participant_ids.clone();

        let batch = WriteBatch::new()
            .require(Precondition::ConversationAbsent(id))
            .op(WriteOp::CreateConversation(conv))
            .extend(append_message_ops(
                id,
                &participants,
                buyer_id,
                &templates::greeting(&product.name),
                MessageKind::System,
            ));

        match self.store.commit(batch).await {
            Ok(_) => {
                info!(
                    conversation_id = %id,
                    buyer_id = %buyer_id,
                    product_id = %product_id,
                    "Conversation created"
                );
                Ok(id)
            }
            // Lost a first-contact race; the winner's conversation is ours too
            Err(ServiceError::Conflict(_)) => {
                debug!(conversation_id = %id, "Conversation created concurrently");
                Ok(id)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_conversation(&self, id: Uuid, user_id: Uuid) -> ServiceResult<Conversation> {
        let conv = self.load(id).await?;
        require_participant(&conv, user_id)?;
        Ok(conv)
    }

    /// Conversations not hidden by the user, newest activity first.
    pub async fn list_conversations(&self, user_id: Uuid) -> ServiceResult<Vec<Conversation>> {
        let mut list = self.store.conversations_for_user(user_id).await?;
        list.retain(|c| !c.is_hidden_for(user_id));
        Ok(list)
    }

    /// Reset the user's unread counter to zero. Idempotent.
    pub async fn mark_as_read(&self, id: Uuid, user_id: Uuid) -> ServiceResult<()> {
        let conv = self.load(id).await?;
        require_participant(&conv, user_id)?;
        if conv.unread_for(user_id) == 0 {
            return Ok(());
        }

        self.store
            .commit(WriteBatch::new().op(WriteOp::UpdateConversation {
                id,
                update: ConversationUpdate {
                    reset_unread: Some(user_id),
                    ..Default::default()
                },
            }))
            .await?;
        Ok(())
    }

    /// Soft-delete for one participant. The other side keeps seeing it.
    pub async fn hide_conversation(&self, id: Uuid, user_id: Uuid) -> ServiceResult<()> {
        let conv = self.load(id).await?;
        require_participant(&conv, user_id)?;
        if conv.is_hidden_for(user_id) {
            return Ok(());
        }

        self.store
            .commit(WriteBatch::new().op(WriteOp::UpdateConversation {
                id,
                update: ConversationUpdate {
                    hide_for: vec![user_id],
                    ..Default::default()
                },
            }))
            .await?;
        info!(conversation_id = %id, user_id = %user_id, "Conversation hidden");
        Ok(())
    }

    pub async fn chat_header(&self, id: Uuid, user_id: Uuid) -> ServiceResult<ChatHeader> {
        let conv = self.get_conversation(id, user_id).await?;
        let counterpart_id = conv
            .other_participant(user_id)
            .ok_or_else(|| ServiceError::Internal(format!("conversation {} is malformed", id)))?;

        let final_price = conv.final_price();
        let status_line = (conv.product.status == Some(ProductStatus::Sold))
            .then(|| templates::sold_header(final_price));

        Ok(ChatHeader {
            conversation_id: conv.id,
            counterpart_id,
            counterpart: conv.participant_details.get(&counterpart_id).cloned(),
            product_id: conv.product.id,
            product_name: conv.product.name.clone(),
            product_image_url: conv.product.image_url.clone(),
            product_status: conv.product.status,
            bid_status: conv.bid_status,
            bid_price: conv.bid_price,
            final_price,
            status_line,
            unread: conv.unread_for(user_id),
        })
    }

    async fn load(&self, id: Uuid) -> ServiceResult<Conversation> {
        self.store
            .get_conversation(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("conversation {}", id)))
    }

    async fn profile(&self, user_id: Uuid) -> ServiceResult<UserProfile> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", user_id)))
    }
}

fn details(user: &UserProfile) -> ParticipantDetails {
    ParticipantDetails {
        display_name: user.display_name.clone(),
        photo_url: user.photo_url.clone(),
    }
}
