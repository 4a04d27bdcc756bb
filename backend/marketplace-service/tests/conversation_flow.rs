//! Conversation lookup-or-create, the message send protocol and read state.

mod common;

use common::Harness;
use marketplace_service::models::{Conversation, MessageKind};
use marketplace_service::store::DocumentStore;
use marketplace_service::ServiceError;

#[tokio::test]
async fn test_find_or_create_is_stable() {
    let h = Harness::new();
    let deal = h.deal().await;

    let again = h
        .state
        .conversations
        .find_or_create_conversation(deal.buyer, deal.seller, deal.product.id)
        .await
        .unwrap();
    assert_eq!(again, deal.conversation_id);
    assert_eq!(
        deal.conversation_id,
        Conversation::key_for(deal.seller, deal.buyer, deal.product.id)
    );

    let conv = h
        .state
        .conversations
        .get_conversation(deal.conversation_id, deal.buyer)
        .await
        .unwrap();
    assert_eq!(conv.participant_details[&deal.buyer].display_name, "Alice");
    assert_eq!(conv.product.name, "Camera");
    assert_eq!(conv.product.price, 150);

    // Only one greeting despite two calls
    let messages = h
        .state
        .messages
        .list_messages(deal.conversation_id, deal.seller)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender_id, deal.buyer);
    assert_eq!(messages[0].kind, MessageKind::System);
    assert_eq!(conv.unread_for(deal.seller), 1);
    assert_eq!(conv.unread_for(deal.buyer), 0);
}

#[tokio::test]
async fn test_concurrent_first_contact_creates_one_conversation() {
    let h = Harness::new();
    let buyer = h.user("Alice").await;
    let seller = h.user("Bob").await;
    let product = h.listing(seller, "Bike", 300).await;

    let (a, b) = tokio::join!(
        h.state
            .conversations
            .find_or_create_conversation(buyer, seller, product.id),
        h.state
            .conversations
            .find_or_create_conversation(buyer, seller, product.id),
    );
    assert_eq!(a.unwrap(), b.unwrap());

    let list = h.state.conversations.list_conversations(buyer).await.unwrap();
    assert_eq!(list.len(), 1);
    let messages = h.store.messages(list[0].id).await.unwrap();
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn test_find_or_create_rejects_bad_input() {
    let h = Harness::new();
    let seller = h.user("Bob").await;
    let other = h.user("Carol").await;
    let product = h.listing(seller, "Lamp", 20).await;

    let err = h
        .state
        .conversations
        .find_or_create_conversation(seller, seller, product.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    // Carol does not sell the lamp
    let err = h
        .state
        .conversations
        .find_or_create_conversation(seller, other, product.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = h
        .state
        .conversations
        .find_or_create_conversation(other, seller, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_messages_ordered_and_unread_counted() {
    let h = Harness::new();
    let deal = h.deal().await;
    h.state
        .conversations
        .mark_as_read(deal.conversation_id, deal.seller)
        .await
        .unwrap();

    for i in 0..5 {
        h.state
            .messages
            .send_message(deal.conversation_id, deal.buyer, &format!("message {}", i))
            .await
            .unwrap();
    }

    let messages = h
        .state
        .messages
        .list_messages(deal.conversation_id, deal.buyer)
        .await
        .unwrap();
    let texts: Vec<_> = messages.iter().skip(1).map(|m| m.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["message 0", "message 1", "message 2", "message 3", "message 4"]
    );
    assert!(messages.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

    let conv = h.store.get_conversation(deal.conversation_id).await.unwrap().unwrap();
    assert_eq!(conv.unread_for(deal.seller), 5);
    assert_eq!(conv.unread_for(deal.buyer), 0);
    let last = conv.last_message.unwrap();
    assert_eq!(last.text, "message 4");
    assert_eq!(last.sender_id, deal.buyer);
    assert_eq!(last.timestamp, messages[5].timestamp);

    h.state
        .conversations
        .mark_as_read(deal.conversation_id, deal.seller)
        .await
        .unwrap();
    // Idempotent
    h.state
        .conversations
        .mark_as_read(deal.conversation_id, deal.seller)
        .await
        .unwrap();
    let conv = h.store.get_conversation(deal.conversation_id).await.unwrap().unwrap();
    assert_eq!(conv.unread_for(deal.seller), 0);
}

#[tokio::test]
async fn test_send_message_guards() {
    let h = Harness::new();
    let deal = h.deal().await;
    let stranger = h.user("Mallory").await;

    let err = h
        .state
        .messages
        .send_message(deal.conversation_id, stranger, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let err = h
        .state
        .messages
        .send_message(deal.conversation_id, deal.buyer, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = h
        .state
        .messages
        .list_messages(deal.conversation_id, stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_conversations_listed_by_recent_activity() {
    let h = Harness::new();
    let buyer = h.user("Alice").await;
    let seller = h.user("Bob").await;
    let first = h.listing(seller, "Desk", 80).await;
    let second = h.listing(seller, "Chair", 40).await;

    let a = h
        .state
        .conversations
        .find_or_create_conversation(buyer, seller, first.id)
        .await
        .unwrap();
    let b = h
        .state
        .conversations
        .find_or_create_conversation(buyer, seller, second.id)
        .await
        .unwrap();
    assert_ne!(a, b);

    h.state
        .messages
        .send_message(a, seller, "Still available")
        .await
        .unwrap();

    let list = h.state.conversations.list_conversations(buyer).await.unwrap();
    let ids: Vec<_> = list.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![a, b]);
}
