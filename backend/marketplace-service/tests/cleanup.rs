//! Per-user hiding and the hard delete once everyone has hidden a chat.

mod common;

use common::Harness;
use marketplace_service::store::DocumentStore;

#[tokio::test]
async fn test_hidden_by_one_stays_for_both() {
    let mut h = Harness::new();
    let deal = h.deal().await;

    h.state
        .conversations
        .hide_conversation(deal.conversation_id, deal.buyer)
        .await
        .unwrap();
    h.settle().await;

    // Still queryable by both participants
    let conv = h
        .state
        .conversations
        .get_conversation(deal.conversation_id, deal.buyer)
        .await
        .unwrap();
    assert!(conv.is_hidden_for(deal.buyer));
    assert!(!conv.is_hidden_for(deal.seller));
    assert!(h
        .state
        .conversations
        .get_conversation(deal.conversation_id, deal.seller)
        .await
        .is_ok());

    assert!(h
        .state
        .conversations
        .list_conversations(deal.buyer)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        h.state
            .conversations
            .list_conversations(deal.seller)
            .await
            .unwrap()
            .len(),
        1
    );

    // New messages do not bring it back for the hider
    h.state
        .messages
        .send_message(deal.conversation_id, deal.seller, "Any update?")
        .await
        .unwrap();
    h.settle().await;
    let conv = h.store.get_conversation(deal.conversation_id).await.unwrap().unwrap();
    assert!(conv.is_hidden_for(deal.buyer));
    assert_eq!(h.store.messages(deal.conversation_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_hidden_by_all_is_deleted() {
    let mut h = Harness::new();
    let deal = h.deal().await;
    h.state
        .messages
        .send_message(deal.conversation_id, deal.seller, "Sure")
        .await
        .unwrap();

    for user in [deal.buyer, deal.seller] {
        h.state
            .conversations
            .hide_conversation(deal.conversation_id, user)
            .await
            .unwrap();
    }
    h.settle().await;

    assert!(h
        .store
        .get_conversation(deal.conversation_id)
        .await
        .unwrap()
        .is_none());
    assert!(h
        .store
        .messages(deal.conversation_id)
        .await
        .unwrap()
        .is_empty());

    // The pair can start over with a fresh conversation
    let id = h
        .state
        .conversations
        .find_or_create_conversation(deal.buyer, deal.seller, deal.product.id)
        .await
        .unwrap();
    assert_eq!(id, deal.conversation_id);
    assert_eq!(h.store.messages(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_hide_twice_is_noop() {
    let mut h = Harness::new();
    let deal = h.deal().await;
    h.settle().await;

    h.state
        .conversations
        .hide_conversation(deal.conversation_id, deal.buyer)
        .await
        .unwrap();
    h.state
        .conversations
        .hide_conversation(deal.conversation_id, deal.buyer)
        .await
        .unwrap();
    // One conversation update, nothing else
    assert_eq!(h.settle().await, 1);
}
