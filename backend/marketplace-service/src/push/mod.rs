/// Push delivery: payload model, transport seam and the token-pruning sender.
pub mod fcm;
pub mod sender;

use async_trait::async_trait;
use std::collections::HashMap;

pub use fcm::FcmTransport;
pub use sender::{PushReport, PushSender};

/// Message fanned out to every device token of one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    /// Click-through deep link, e.g. `/chat/{conversation_id}`
    pub link: Option<String>,
    pub data: HashMap<String, String>,
    pub tokens: Vec<String>,
}

/// Result of delivering to a single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Provider reports the token as unregistered or invalid
    TokenInvalid(String),
    /// Any other failure; logged, not retried
    Failed(String),
}

impl DeliveryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::TokenInvalid(_) => "token_invalid",
            DeliveryOutcome::Failed(_) => "failed",
        }
    }
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn deliver(&self, token: &str, payload: &PushPayload) -> DeliveryOutcome;
}
