use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::UserProfile;
use crate::store::{DocumentStore, ProfileUpsert, WriteBatch, WriteOp};

/// Profiles mirrored from the identity provider, plus device tokens.
pub struct UserService {
    store: Arc<dyn DocumentStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn upsert_profile(
        &self,
        id: Uuid,
        display_name: &str,
        photo_url: Option<String>,
    ) -> ServiceResult<UserProfile> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ServiceError::Validation(
                "display name must not be empty".to_string(),
            ));
        }
        self.store
            .commit(WriteBatch::new().op(WriteOp::UpsertProfile(ProfileUpsert {
                id,
                display_name: display_name.to_string(),
                photo_url,
            })))
            .await?;
        self.get_profile(id).await
    }

    pub async fn get_profile(&self, id: Uuid) -> ServiceResult<UserProfile> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", id)))
    }

    pub async fn register_device_token(&self, user_id: Uuid, token: &str) -> ServiceResult<()> {
        self.store
            .commit(WriteBatch::new().op(WriteOp::AddPushToken {
                user_id,
                token: token.trim().to_string(),
            }))
            .await?;
        info!(user_id = %user_id, "Device token registered");
        Ok(())
    }

    pub async fn unregister_device_token(&self, user_id: Uuid, token: &str) -> ServiceResult<()> {
        self.store
            .commit(WriteBatch::new().op(WriteOp::RemovePushTokens {
                user_id,
                tokens: vec![token.trim().to_string()],
            }))
            .await?;
        info!(user_id = %user_id, "Device token unregistered");
        Ok(())
    }
}
