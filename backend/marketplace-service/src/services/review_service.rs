use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::message_service::require_participant;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{RatingSummary, Review, ReviewerRole};
use crate::store::{
    ChangeEvent, ConversationUpdate, DocumentStore, Precondition, WriteBatch, WriteOp,
};

const MIN_COMMENT_CHARS: usize = 5;

pub struct ReviewService {
    store: Arc<dyn DocumentStore>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Review the other participant of a conversation.
    ///
    /// The review row and the conversation's review flag commit together,
    /// guarded by a no-prior-review precondition. The rated user's running
    /// average is updated afterwards on a best-effort basis: if that write
    /// fails the review stands and the aggregate stays stale.
    pub async fn submit_review(
        &self,
        conversation_id: Uuid,
        reviewer_id: Uuid,
        rating: i32,
        comment: &str,
    ) -> ServiceResult<Review> {
        if !(1..=5).contains(&rating) {
            return Err(ServiceError::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }
        let comment = comment.trim();
        if comment.chars().count() < MIN_COMMENT_CHARS {
            return Err(ServiceError::Validation(format!(
                "comment must be at least {} characters",
                MIN_COMMENT_CHARS
            )));
        }

        let conv = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("conversation {}", conversation_id)))?;
        require_participant(&conv, reviewer_id)?;
        let rated_user_id = conv.other_participant(reviewer_id).ok_or_else(|| {
            ServiceError::Internal(format!("conversation {} is malformed", conversation_id))
        })?;

        let product_id = conv.product.id;
        if self.store.review_exists(reviewer_id, product_id).await? {
            return Err(ServiceError::Conflict(
                "you have already reviewed this product".to_string(),
            ));
        }

        let reviewer = self
            .store
            .get_user(reviewer_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", reviewer_id)))?;

        // Role comes from the live listing; the snapshot covers deleted ones
        let seller_id = self
            .store
            .get_product(product_id)
            .await?
            .map(|p| p.seller_id)
            .unwrap_or(conv.product.seller_id);
        let reviewer_role = if reviewer_id == seller_id {
            ReviewerRole::Seller
        } else {
            ReviewerRole::Buyer
        };

        let review = Review {
            id: Uuid::new_v4(),
            rated_user_id,
            reviewer_id,
            reviewer_name: reviewer.display_name,
            product_id,
            conversation_id,
            rating,
            comment: comment.to_string(),
            reviewer_role,
            created_at: chrono::Utc::now(),
        };
        let review_id = review.id;

        let batch = WriteBatch::new()
            .require(Precondition::NoReviewFor {
                reviewer_id,
                product_id,
            })
            .op(WriteOp::CreateReview(review))
            .op(WriteOp::UpdateConversation {
                id: conversation_id,
                update: ConversationUpdate {
                    review_status: vec![(reviewer_id, true)],
                    ..Default::default()
                },
            });
        let events = self.store.commit(batch).await?;

        let review = events
            .iter()
            .find_map(|e| match e {
                ChangeEvent::Review(change) => change.after.clone().filter(|r| r.id == review_id),
                _ => None,
            })
            .ok_or_else(|| ServiceError::Internal("review write produced no event".to_string()))?;

        info!(
            review_id = %review.id,
            reviewer_id = %reviewer_id,
            rated_user_id = %rated_user_id,
            rating = rating,
            role = review.reviewer_role.as_str(),
            "Review submitted"
        );

        let aggregate = WriteBatch::new().op(WriteOp::RecordRating {
            user_id: rated_user_id,
            rating,
        });
        if let Err(e) = self.store.commit(aggregate).await {
            warn!(
                review_id = %review.id,
                rated_user_id = %rated_user_id,
                error = %e,
                "Failed to update rating aggregate; leaving it stale"
            );
        }

        Ok(review)
    }

    /// Reviews received by the user, newest first.
    pub async fn reviews_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<Review>> {
        self.store.reviews_for_user(user_id).await
    }

    /// Stored running aggregate (may lag the review rows, see `submit_review`).
    pub async fn rating_summary(&self, user_id: Uuid) -> ServiceResult<RatingSummary> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", user_id)))?;
        Ok(RatingSummary {
            average: user.rating_average,
            count: user.rating_count,
        })
    }

    /// Aggregate recomputed from the review rows.
    pub async fn recomputed_summary(&self, user_id: Uuid) -> ServiceResult<RatingSummary> {
        let reviews = self.store.reviews_for_user(user_id).await?;
        Ok(RatingSummary::from_reviews(&reviews))
    }
}
