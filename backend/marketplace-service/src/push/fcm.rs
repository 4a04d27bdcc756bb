use async_trait::async_trait;
use fcm_push::{FcmClient, PushMessage, ServiceAccountKey};
use std::path::Path;
use tracing::info;

use super::{DeliveryOutcome, PushPayload, PushTransport};
use crate::error::ServiceResult;

/// FCM HTTP v1 transport.
pub struct FcmTransport {
    client: FcmClient,
}

impl FcmTransport {
    pub fn new(client: FcmClient) -> Self {
        Self { client }
    }

    /// Load the service-account key; `project_id` overrides the key's own.
    pub async fn from_key_file(
        path: impl AsRef<Path>,
        project_id: Option<String>,
    ) -> ServiceResult<Self> {
        let key = ServiceAccountKey::from_file(path).await?;
        let mut client = FcmClient::new(key);
        if let Some(project_id) = project_id {
            client.project_id = project_id;
        }
        info!(project_id = %client.project_id, "FCM transport initialized");
        Ok(Self::new(client))
    }
}

#[async_trait]
impl PushTransport for FcmTransport {
    async fn deliver(&self, token: &str, payload: &PushPayload) -> DeliveryOutcome {
        let message = PushMessage {
            token: token.to_string(),
            title: payload.title.clone(),
            body: payload.body.clone(),
            image: payload.image.clone(),
            link: payload.link.clone(),
            data: payload.data.clone(),
        };

        match self.client.send(&message).await {
            Ok(_) => DeliveryOutcome::Delivered,
            Err(e) if e.is_token_invalid() => DeliveryOutcome::TokenInvalid(e.code().to_string()),
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        }
    }
}
