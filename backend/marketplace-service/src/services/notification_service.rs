/// Notification inbox: persistence, read state and retention.
///
/// Triggers call `publish`; clients read and acknowledge through the rest.
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::models::{Notification, NotificationType, RelatedData};
use crate::store::{ChangeEvent, DocumentStore, WriteBatch, WriteOp};

/// Notification to write. `id` decides dedup: deterministic ids overwrite.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub id: String,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub message: String,
    pub related_data: RelatedData,
}

pub struct NotificationService {
    store: Arc<dyn DocumentStore>,
    retention: Duration,
}

impl NotificationService {
    pub fn new(store: Arc<dyn DocumentStore>, retention_days: i64) -> Self {
        Self {
            store,
            retention: Duration::days(retention_days),
        }
    }

    /// Insert or overwrite the notification by id.
    pub async fn publish(&self, new: NewNotification) -> ServiceResult<Notification> {
        let now = Utc::now();
        let notification = Notification {
            id: new.id,
            user_id: new.user_id,
            notification_type: new.notification_type,
            message: new.message,
            is_read: false,
            created_at: now,
            expires_at: now + self.retention,
            related_data: new.related_data,
        };

        self.store
            .commit(WriteBatch::new().op(WriteOp::UpsertNotification(notification.clone())))
            .await?;
        metrics::record_notification_written(notification.notification_type.as_str());
        debug!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            notification_type = notification.notification_type.as_str(),
            "Notification written"
        );
        Ok(notification)
    }

    /// Unexpired notifications, newest first.
    pub async fn list(&self, user_id: Uuid) -> ServiceResult<Vec<Notification>> {
        let now = Utc::now();
        let mut list = self.store.notifications_for_user(user_id).await?;
        list.retain(|n| !n.is_expired(now));
        Ok(list)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> ServiceResult<usize> {
        Ok(self
            .list(user_id)
            .await?
            .iter()
            .filter(|n| !n.is_read)
            .count())
    }

    pub async fn mark_as_read(&self, id: &str, user_id: Uuid) -> ServiceResult<()> {
        let notification = self
            .store
            .get_notification(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("notification {}", id)))?;
        if notification.user_id != user_id {
            return Err(ServiceError::PermissionDenied(
                "notification belongs to another user".to_string(),
            ));
        }
        if notification.is_read {
            return Ok(());
        }
        self.store
            .commit(WriteBatch::new().op(WriteOp::MarkNotificationRead { id: id.to_string() }))
            .await?;
        Ok(())
    }

    /// Returns how many notifications flipped to read.
    pub async fn mark_all_read(&self, user_id: Uuid) -> ServiceResult<usize> {
        let events = self
            .store
            .commit(WriteBatch::new().op(WriteOp::MarkAllNotificationsRead { user_id }))
            .await?;
        Ok(count_notifications(&events))
    }

    /// Delete every notification past its expiry. Returns the number removed.
    pub async fn purge_expired(&self) -> ServiceResult<usize> {
        let events = self
            .store
            .commit(WriteBatch::new().op(WriteOp::PurgeNotificationsBefore(Utc::now())))
            .await?;
        let purged = count_notifications(&events);
        if purged > 0 {
            info!(purged = purged, "Expired notifications purged");
        }
        Ok(purged)
    }
}

fn count_notifications(events: &[ChangeEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ChangeEvent::Notification(_)))
        .count()
}
