use actix_web::web;
use std::sync::Arc;

use crate::push::{PushSender, PushTransport};
use crate::services::{
    BidService, ConversationService, MessageService, NotificationService, ProductService,
    ReviewService, UserService,
};
use crate::store::DocumentStore;
use crate::triggers::{default_triggers, TriggerRunner};

/// Every service wired to one store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub conversations: Arc<ConversationService>,
    pub messages: Arc<MessageService>,
    pub bids: Arc<BidService>,
    pub reviews: Arc<ReviewService>,
    pub products: Arc<ProductService>,
    pub notifications: Arc<NotificationService>,
    pub users: Arc<UserService>,
    pub push: Option<Arc<PushSender>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        retention_days: i64,
        transport: Option<Arc<dyn PushTransport>>,
    ) -> Self {
        Self {
            conversations: Arc::new(ConversationService::new(store.clone())),
            messages: Arc::new(MessageService::new(store.clone())),
            bids: Arc::new(BidService::new(store.clone())),
            reviews: Arc::new(ReviewService::new(store.clone())),
            products: Arc::new(ProductService::new(store.clone())),
            notifications: Arc::new(NotificationService::new(store.clone(), retention_days)),
            users: Arc::new(UserService::new(store.clone())),
            push: transport.map(|t| Arc::new(PushSender::new(t, store.clone()))),
            store,
        }
    }

    pub fn trigger_runner(&self) -> TriggerRunner {
        TriggerRunner::new(default_triggers(
            self.store.clone(),
            self.notifications.clone(),
            self.push.clone(),
        ))
    }

    /// Register each service as app data for the handlers.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.conversations.clone()))
            .app_data(web::Data::new(self.messages.clone()))
            .app_data(web::Data::new(self.bids.clone()))
            .app_data(web::Data::new(self.reviews.clone()))
            .app_data(web::Data::new(self.products.clone()))
            .app_data(web::Data::new(self.notifications.clone()))
            .app_data(web::Data::new(self.users.clone()));
    }
}
