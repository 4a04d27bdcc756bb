use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use super::apply::{apply, Requirements, Staging};
use super::batch::WriteBatch;
use super::change::{Change, ChangeEvent};
use super::{DocumentStore, CHANGE_FEED_CAPACITY};
use crate::error::ServiceResult;
use crate::models::{Conversation, Message, Notification, Product, Review, UserProfile};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, UserProfile>,
    products: HashMap<Uuid, Product>,
    conversations: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Message>,
    reviews: HashMap<Uuid, Review>,
    notifications: HashMap<String, Notification>,
}

impl State {
    fn stage(&self, req: &Requirements) -> Staging {
        let mut staging = Staging::new(Utc::now());

        for id in &req.users {
            staging.users.load(*id, self.users.get(id).cloned());
        }
        for id in &req.products {
            staging.products.load(*id, self.products.get(id).cloned());
        }
        for id in &req.conversations {
            staging
                .conversations
                .load(*id, self.conversations.get(id).cloned());
        }
        for conversation_id in &req.message_tails {
            let tail = self
                .messages
                .values()
                .filter(|m| m.conversation_id == *conversation_id)
                .map(|m| m.timestamp)
                .max();
            if let Some(tail) = tail {
                staging.message_tails.insert(*conversation_id, tail);
            }
        }
        for msg in self
            .messages
            .values()
            .filter(|m| req.message_logs.contains(&m.conversation_id))
        {
            staging.messages.load(msg.id, Some(msg.clone()));
        }
        for id in &req.reviews {
            staging.reviews.load(*id, self.reviews.get(id).cloned());
        }
        for review in self.reviews.values() {
            let pair = (review.reviewer_id, review.product_id);
            if req.review_pairs.contains(&pair) {
                staging.review_pairs.insert(pair);
            }
        }
        for id in &req.notifications {
            staging
                .notifications
                .load(id.clone(), self.notifications.get(id).cloned());
        }
        for n in self.notifications.values() {
            let unread_hit = !n.is_read && req.unread_notifications_of.contains(&n.user_id);
            let expired_hit = req
                .expired_before
                .map(|cutoff| n.is_expired(cutoff))
                .unwrap_or(false);
            if unread_hit || expired_hit {
                staging.notifications.load(n.id.clone(), Some(n.clone()));
            }
        }

        staging
    }

    fn persist(&mut self, events: &[ChangeEvent]) {
        for event in events {
            match event {
                ChangeEvent::User(c) => write(&mut self.users, c, |u| u.id),
                ChangeEvent::Product(c) => write(&mut self.products, c, |p| p.id),
                ChangeEvent::Conversation(c) => write(&mut self.conversations, c, |c| c.id),
                ChangeEvent::Message(c) => write(&mut self.messages, c, |m| m.id),
                ChangeEvent::Review(c) => write(&mut self.reviews, c, |r| r.id),
                ChangeEvent::Notification(c) => {
                    write(&mut self.notifications, c, |n| n.id.clone())
                }
            }
        }
    }
}

fn write<K, T>(map: &mut HashMap<K, T>, change: &Change<T>, key: impl Fn(&T) -> K)
where
    K: Eq + std::hash::Hash,
    T: Clone,
{
    match (&change.before, &change.after) {
        (_, Some(after)) => {
            map.insert(key(after), after.clone());
        }
        (Some(before), None) => {
            map.remove(&key(before));
        }
        (None, None) => {}
    }
}

/// In-process store behind a single lock. Used by tests and local runs
/// without a database.
pub struct MemoryStore {
    state: Mutex<State>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn commit(&self, batch: WriteBatch) -> ServiceResult<Vec<ChangeEvent>> {
        let mut state = self.state.lock().await;
        let req = Requirements::of(&batch);
        let events = apply(batch, state.stage(&req))?;
        state.persist(&events);

        // Published under the lock so subscribers see commit order
        for event in &events {
            let _ = self.changes.send(event.clone());
        }
        Ok(events)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn get_conversation(&self, id: Uuid) -> ServiceResult<Option<Conversation>> {
        Ok(self.state.lock().await.conversations.get(&id).cloned())
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<Conversation>> {
        let state = self.state.lock().await;
        let mut list: Vec<_> = state
            .conversations
            .values()
            .filter(|c| c.is_participant(user_id))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(list)
    }

    async fn conversations_for_user_and_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> ServiceResult<Vec<Conversation>> {
        let state = self.state.lock().await;
        Ok(state
            .conversations
            .values()
            .filter(|c| c.is_participant(user_id) && c.product.id == product_id)
            .cloned()
            .collect())
    }

    async fn messages(&self, conversation_id: Uuid) -> ServiceResult<Vec<Message>> {
        let state = self.state.lock().await;
        let mut list: Vec<_> = state
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        list.sort_by_key(|m| m.timestamp);
        Ok(list)
    }

    async fn get_product(&self, id: Uuid) -> ServiceResult<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn products_favorited_by(&self, user_id: Uuid) -> ServiceResult<Vec<Product>> {
        let state = self.state.lock().await;
        let mut list: Vec<_> = state
            .products
            .values()
            .filter(|p| p.favorited_by.contains(&user_id))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(list)
    }

    async fn products_by_seller(&self, seller_id: Uuid) -> ServiceResult<Vec<Product>> {
        let state = self.state.lock().await;
        let mut list: Vec<_> = state
            .products
            .values()
            .filter(|p| p.seller_id == seller_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn get_user(&self, id: Uuid) -> ServiceResult<Option<UserProfile>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn review_exists(&self, reviewer_id: Uuid, product_id: Uuid) -> ServiceResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .reviews
            .values()
            .any(|r| r.reviewer_id == reviewer_id && r.product_id == product_id))
    }

    async fn get_review(&self, id: Uuid) -> ServiceResult<Option<Review>> {
        Ok(self.state.lock().await.reviews.get(&id).cloned())
    }

    async fn reviews_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<Review>> {
        let state = self.state.lock().await;
        let mut list: Vec<_> = state
            .reviews
            .values()
            .filter(|r| r.rated_user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn get_notification(&self, id: &str) -> ServiceResult<Option<Notification>> {
        Ok(self.state.lock().await.notifications.get(id).cloned())
    }

    async fn notifications_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<Notification>> {
        let state = self.state.lock().await;
        let mut list: Vec<_> = state
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ProfileUpsert, WriteOp};

    #[tokio::test]
    async fn test_failed_batch_leaves_no_trace() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        let user_id = Uuid::new_v4();

        let batch = WriteBatch::new()
            .op(WriteOp::UpsertProfile(ProfileUpsert {
                id: user_id,
                display_name: "Ana".to_string(),
                photo_url: None,
            }))
            .op(WriteOp::RecordRating {
                user_id: Uuid::new_v4(),
                rating: 4,
            });

        assert!(store.commit(batch).await.is_err());
        assert!(store.get_user(user_id).await.unwrap().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        let user_id = Uuid::new_v4();

        store
            .commit(WriteBatch::new().op(WriteOp::UpsertProfile(ProfileUpsert {
                id: user_id,
                display_name: "Ana".to_string(),
                photo_url: None,
            })))
            .await
            .unwrap();

        match rx.try_recv().unwrap() {
            ChangeEvent::User(change) => {
                assert!(change.before.is_none());
                assert_eq!(change.after.unwrap().display_name, "Ana");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
