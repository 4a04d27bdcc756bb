//! Review ledger: one review per reviewer and product, running aggregates.

mod common;

use common::Harness;
use chrono::Utc;
use marketplace_service::models::{
    Conversation, Notification, NotificationType, ParticipantDetails, ReviewerRole,
};
use marketplace_service::store::{DocumentStore, WriteBatch, WriteOp};
use marketplace_service::ServiceError;
use uuid::Uuid;

#[tokio::test]
async fn test_review_recorded_once() {
    let mut h = Harness::new();
    let deal = h.deal().await;

    let review = h
        .state
        .reviews
        .submit_review(deal.conversation_id, deal.buyer, 4, "  Great seller, fast reply  ")
        .await
        .unwrap();
    assert_eq!(review.rated_user_id, deal.seller);
    assert_eq!(review.reviewer_name, "Alice");
    assert_eq!(review.reviewer_role, ReviewerRole::Buyer);
    assert_eq!(review.comment, "Great seller, fast reply");
    assert_eq!(review.product_id, deal.product.id);

    let err = h
        .state
        .reviews
        .submit_review(deal.conversation_id, deal.buyer, 5, "Changed my mind")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let conv = h.store.get_conversation(deal.conversation_id).await.unwrap().unwrap();
    assert!(conv.has_reviewed(deal.buyer));
    assert!(!conv.has_reviewed(deal.seller));

    let reviews = h.state.reviews.reviews_for_user(deal.seller).await.unwrap();
    assert_eq!(reviews.len(), 1);

    h.settle().await;
    let notification = h
        .store
        .get_notification(&Notification::review_id(deal.seller, review.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notification.user_id, deal.seller);
    assert_eq!(notification.notification_type, NotificationType::NewReview);
    assert_eq!(notification.message, "Alice left you a 4-star review.");
    assert_eq!(notification.related_data.review_id, Some(review.id));
}

#[tokio::test]
async fn test_both_sides_may_review() {
    let h = Harness::new();
    let deal = h.deal().await;

    h.state
        .reviews
        .submit_review(deal.conversation_id, deal.buyer, 5, "Smooth handover")
        .await
        .unwrap();
    let review = h
        .state
        .reviews
        .submit_review(deal.conversation_id, deal.seller, 3, "Showed up late")
        .await
        .unwrap();
    assert_eq!(review.rated_user_id, deal.buyer);
    assert_eq!(review.reviewer_role, ReviewerRole::Seller);

    let conv = h.store.get_conversation(deal.conversation_id).await.unwrap().unwrap();
    assert!(conv.has_reviewed(deal.buyer));
    assert!(conv.has_reviewed(deal.seller));
}

#[tokio::test]
async fn test_running_average() {
    let h = Harness::new();
    let seller = h.user("Bob").await;
    let first_buyer = h.user("Alice").await;
    let second_buyer = h.user("Carol").await;
    let desk = h.listing(seller, "Desk", 80).await;
    let chair = h.listing(seller, "Chair", 40).await;

    for (buyer, product, rating) in [(first_buyer, &desk, 4), (second_buyer, &chair, 5)] {
        let id = h
            .state
            .conversations
            .find_or_create_conversation(buyer, seller, product.id)
            .await
            .unwrap();
        h.state
            .reviews
            .submit_review(id, buyer, rating, "As described")
            .await
            .unwrap();
    }

    let summary = h.state.reviews.rating_summary(seller).await.unwrap();
    assert_eq!(summary.count, 2);
    assert!((summary.average - 4.5).abs() < f64::EPSILON);

    let recomputed = h.state.reviews.recomputed_summary(seller).await.unwrap();
    assert_eq!(recomputed, summary);
}

#[tokio::test]
async fn test_review_validation() {
    let h = Harness::new();
    let deal = h.deal().await;
    let stranger = h.user("Mallory").await;

    for rating in [0, 6] {
        let err = h
            .state
            .reviews
            .submit_review(deal.conversation_id, deal.buyer, rating, "Looks fine")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    let err = h
        .state
        .reviews
        .submit_review(deal.conversation_id, deal.buyer, 4, " ok ")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = h
        .state
        .reviews
        .submit_review(deal.conversation_id, stranger, 1, "Never met them")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    assert!(h.state.reviews.reviews_for_user(deal.seller).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_review_kept_when_aggregate_update_fails() {
    let h = Harness::new();
    let seller = h.user("Bob").await;
    let product = h.listing(seller, "Tripod", 40).await;

    // Counterpart without a profile, so recording the rating cannot apply
    let ghost = Uuid::new_v4();
    let details = |name: &str| ParticipantDetails {
        display_name: name.to_string(),
        photo_url: None,
    };
    let conv = Conversation::open(
        Conversation::key_for(ghost, seller, product.id),
        [(ghost, details("Ghost")), (seller, details("Bob"))],
        product.snapshot(),
        Utc::now(),
    );
    let conversation_id = conv.id;
    h.store
        .commit(WriteBatch::new().op(WriteOp::CreateConversation(conv)))
        .await
        .unwrap();

    let review = h
        .state
        .reviews
        .submit_review(conversation_id, seller, 5, "Picked up on time")
        .await
        .unwrap();
    assert_eq!(review.rated_user_id, ghost);
    assert_eq!(review.reviewer_role, ReviewerRole::Seller);

    let reviews = h.state.reviews.reviews_for_user(ghost).await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].id, review.id);

    let conv = h.store.get_conversation(conversation_id).await.unwrap().unwrap();
    assert!(conv.has_reviewed(seller));

    let err = h.state.reviews.rating_summary(ghost).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let derived = h.state.reviews.recomputed_summary(ghost).await.unwrap();
    assert_eq!(derived.count, 1);
    assert_eq!(derived.average, 5.0);
}
