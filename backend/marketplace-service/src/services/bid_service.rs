/// Bid state machine embedded in a conversation.
///
/// ```text
/// none ──place──▶ pending ──accept──▶ accepted (product sold)
///                   │  ├──decline─▶ declined ─┐
///                   │  └──cancel──▶ cancelled ┤
///                   ▲                         │
///                   └─────────place───────────┘
/// ```
///
/// Every transition carries a bid-status precondition, so two racing actions
/// on the same conversation cannot both apply.
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::message_service::{append_message_ops, require_participant};
use super::templates;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{BidStatus, Conversation, MessageKind, ProductStatus};
use crate::store::{
    BidUpdate, ChangeEvent, ConversationUpdate, DocumentStore, Precondition, ProductUpdate,
    WriteBatch, WriteOp,
};

pub struct BidService {
    store: Arc<dyn DocumentStore>,
}

impl BidService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Buyer proposes `price`. Valid from none, declined or cancelled.
    pub async fn place_bid(
        &self,
        conversation_id: Uuid,
        bidder_id: Uuid,
        price: i64,
    ) -> ServiceResult<Conversation> {
        if price <= 0 {
            return Err(ServiceError::Validation(
                "bid price must be positive".to_string(),
            ));
        }

        let conv = self.load(conversation_id).await?;
        require_participant(&conv, bidder_id)?;
        if bidder_id == conv.seller_id() {
            return Err(ServiceError::PermissionDenied(
                "sellers cannot bid on their own product".to_string(),
            ));
        }
        self.ensure_not_sold(&conv).await?;

        let batch = WriteBatch::new()
            .require(Precondition::BidStatusIn {
                conversation_id,
                allowed: BidStatus::BIDDABLE.to_vec(),
            })
            .op(bid_op(
                conversation_id,
                BidUpdate {
                    status: BidStatus::Pending,
                    price: Some(price),
                    bidder_id: Some(bidder_id),
                },
            ))
            .extend(append_message_ops(
                conversation_id,
                &conv.participant_ids,
                bidder_id,
                &templates::bid_placed(price),
                MessageKind::System,
            ));

        let updated = self.commit(conversation_id, batch).await?;
        info!(
            conversation_id = %conversation_id,
            bidder_id = %bidder_id,
            price = price,
            "Bid placed"
        );
        Ok(updated)
    }

    /// Seller accepts the pending bid. Product and conversation move to sold
    /// in the same batch.
    ///
    /// The batch also requires the product to still be unsold and the bid
    /// price to be the one quoted in the system message, so a competing
    /// accept or a re-bid in between turns into a conflict.
    pub async fn accept_bid(
        &self,
        conversation_id: Uuid,
        seller_id: Uuid,
    ) -> ServiceResult<Conversation> {
        let conv = self.load(conversation_id).await?;
        require_seller(&conv, seller_id)?;
        self.ensure_not_sold(&conv).await?;
        let price = conv.bid_price.unwrap_or(conv.product.price);

        let batch = WriteBatch::new()
            .require(pending(conversation_id))
            .require(Precondition::BidPriceIs {
                conversation_id,
                price: conv.bid_price,
            })
            .require(Precondition::ProductNotSold(conv.product.id))
            .op(WriteOp::UpdateProduct {
                id: conv.product.id,
                update: ProductUpdate {
                    status: Some(Some(ProductStatus::Sold)),
                    ..Default::default()
                },
            })
            .op(WriteOp::UpdateConversation {
                id: conversation_id,
                update: ConversationUpdate {
                    bid: Some(BidUpdate {
                        status: BidStatus::Accepted,
                        price: None,
                        bidder_id: None,
                    }),
                    product_status: Some(Some(ProductStatus::Sold)),
                    ..Default::default()
                },
            })
            .extend(append_message_ops(
                conversation_id,
                &conv.participant_ids,
                seller_id,
                &templates::bid_accepted(price, &conv.product.name),
                MessageKind::System,
            ));

        let updated = self.commit(conversation_id, batch).await?;
        info!(
            conversation_id = %conversation_id,
            product_id = %conv.product.id,
            price = price,
            "Bid accepted, product sold"
        );
        Ok(updated)
    }

    pub async fn decline_bid(
        &self,
        conversation_id: Uuid,
        seller_id: Uuid,
    ) -> ServiceResult<Conversation> {
        let conv = self.load(conversation_id).await?;
        require_seller(&conv, seller_id)?;
        let text = templates::bid_declined(conv.bid_price.unwrap_or_default());
        self.close_bid(&conv, seller_id, BidStatus::Declined, &text)
            .await
    }

    /// The bidder withdraws their pending bid.
    pub async fn cancel_bid(
        &self,
        conversation_id: Uuid,
        bidder_id: Uuid,
    ) -> ServiceResult<Conversation> {
        let conv = self.load(conversation_id).await?;
        require_participant(&conv, bidder_id)?;
        if conv.bidder_id != Some(bidder_id) {
            return Err(ServiceError::PermissionDenied(
                "only the bidder can cancel a bid".to_string(),
            ));
        }
        let text = templates::bid_cancelled(conv.bid_price.unwrap_or_default());
        self.close_bid(&conv, bidder_id, BidStatus::Cancelled, &text)
            .await
    }

    async fn close_bid(
        &self,
        conv: &Conversation,
        actor_id: Uuid,
        status: BidStatus,
        text: &str,
    ) -> ServiceResult<Conversation> {
        let batch = WriteBatch::new()
            .require(pending(conv.id))
            .op(bid_op(
                conv.id,
                BidUpdate {
                    status,
                    price: None,
                    bidder_id: None,
                },
            ))
            .extend(append_message_ops(
                conv.id,
                &conv.participant_ids,
                actor_id,
                text,
                MessageKind::System,
            ));

        let updated = self.commit(conv.id, batch).await?;
        info!(
            conversation_id = %conv.id,
            status = status.as_str(),
            "Bid closed"
        );
        Ok(updated)
    }

    async fn ensure_not_sold(&self, conv: &Conversation) -> ServiceResult<()> {
        let live_sold = self
            .store
            .get_product(conv.product.id)
            .await?
            .map(|p| p.is_sold())
            .unwrap_or(false);
        if live_sold || conv.product.status == Some(ProductStatus::Sold) {
            return Err(ServiceError::Validation(
                "product is already sold".to_string(),
            ));
        }
        Ok(())
    }

    async fn load(&self, id: Uuid) -> ServiceResult<Conversation> {
        self.store
            .get_conversation(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("conversation {}", id)))
    }

    async fn commit(&self, id: Uuid, batch: WriteBatch) -> ServiceResult<Conversation> {
        let events = self.store.commit(batch).await?;
        updated_conversation(&events, id)
            .ok_or_else(|| ServiceError::Internal(format!("conversation {} not updated", id)))
    }
}

fn pending(conversation_id: Uuid) -> Precondition {
    Precondition::BidStatusIn {
        conversation_id,
        allowed: vec![Some(BidStatus::Pending)],
    }
}

fn bid_op(id: Uuid, bid: BidUpdate) -> WriteOp {
    WriteOp::UpdateConversation {
        id,
        update: ConversationUpdate {
            bid: Some(bid),
            ..Default::default()
        },
    }
}

fn require_seller(conv: &Conversation, user_id: Uuid) -> ServiceResult<()> {
    require_participant(conv, user_id)?;
    if conv.seller_id() != user_id {
        return Err(ServiceError::PermissionDenied(
            "only the seller can answer a bid".to_string(),
        ));
    }
    Ok(())
}

fn updated_conversation(events: &[ChangeEvent], id: Uuid) -> Option<Conversation> {
    events.iter().find_map(|e| match e {
        ChangeEvent::Conversation(change) => change.after.clone().filter(|c| c.id == id),
        _ => None,
    })
}
