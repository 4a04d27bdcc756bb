//! Shared fixtures: an in-memory store, every service wired to it and a
//! trigger runner drained on demand.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

use marketplace_service::models::Product;
use marketplace_service::push::{DeliveryOutcome, PushPayload, PushTransport};
use marketplace_service::services::NewListing;
use marketplace_service::store::{ChangeEvent, DocumentStore, MemoryStore};
use marketplace_service::triggers::TriggerRunner;
use marketplace_service::AppState;

pub const RETENTION_DAYS: i64 = 30;

pub struct Harness {
    pub state: AppState,
    pub store: Arc<dyn DocumentStore>,
    rx: broadcast::Receiver<ChangeEvent>,
    runner: TriggerRunner,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_transport(transport: Arc<dyn PushTransport>) -> Self {
        Self::build(Some(transport))
    }

    fn build(transport: Option<Arc<dyn PushTransport>>) -> Self {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let rx = store.subscribe();
        let state = AppState::new(store.clone(), RETENTION_DAYS, transport);
        let runner = state.trigger_runner();
        Self {
            state,
            store,
            rx,
            runner,
        }
    }

    /// Run triggers over everything committed so far.
    pub async fn settle(&mut self) -> usize {
        self.runner.drain(&mut self.rx).await
    }

    pub async fn user(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state
            .users
            .upsert_profile(id, name, None)
            .await
            .unwrap();
        id
    }

    pub async fn listing(&self, seller_id: Uuid, name: &str, price: i64) -> Product {
        self.state
            .products
            .create_listing(
                seller_id,
                NewListing {
                    name: name.to_string(),
                    price,
                    image_url: Some(format!("https://img.example/{}.jpg", name)),
                },
            )
            .await
            .unwrap()
    }

    /// Buyer "Alice", seller "Bob", a $150 camera and their conversation.
    pub async fn deal(&self) -> Deal {
        let buyer = self.user("Alice").await;
        let seller = self.user("Bob").await;
        let product = self.listing(seller, "Camera", 150).await;
        let conversation_id = self
            .state
            .conversations
            .find_or_create_conversation(buyer, seller, product.id)
            .await
            .unwrap();
        Deal {
            buyer,
            seller,
            product,
            conversation_id,
        }
    }
}

pub struct Deal {
    pub buyer: Uuid,
    pub seller: Uuid,
    pub product: Product,
    pub conversation_id: Uuid,
}

/// Records deliveries; tokens in `invalid` are rejected as unregistered.
#[derive(Default)]
pub struct FakeTransport {
    pub invalid: HashSet<String>,
    pub delivered: Mutex<Vec<(String, PushPayload)>>,
}

impl FakeTransport {
    pub fn rejecting(tokens: &[&str]) -> Self {
        Self {
            invalid: tokens.iter().map(|t| t.to_string()).collect(),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn delivered_tokens(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn deliver(&self, token: &str, payload: &PushPayload) -> DeliveryOutcome {
        if self.invalid.contains(token) {
            return DeliveryOutcome::TokenInvalid("UNREGISTERED".to_string());
        }
        self.delivered
            .lock()
            .unwrap()
            .push((token.to_string(), payload.clone()));
        DeliveryOutcome::Delivered
    }
}
