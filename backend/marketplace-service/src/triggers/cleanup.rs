use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::Trigger;
use crate::error::ServiceResult;
use crate::metrics;
use crate::store::{Change, ChangeEvent, DocumentStore, WriteBatch, WriteOp};

/// Hard-deletes a conversation once every participant has hidden it.
/// Messages go first so an interrupted run never leaves orphans.
pub struct ConversationCleanupTrigger {
    store: Arc<dyn DocumentStore>,
}

impl ConversationCleanupTrigger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Trigger for ConversationCleanupTrigger {
    fn name(&self) -> &'static str {
        "conversation_cleanup"
    }

    async fn handle(&self, event: &ChangeEvent) -> ServiceResult<()> {
        let ChangeEvent::Conversation(Change {
            before: Some(before),
            after: Some(after),
        }) = event
        else {
            return Ok(());
        };
        if before.hidden_for == after.hidden_for || !after.hidden_by_all() {
            return Ok(());
        }

        let id = after.id;
        self.store
            .commit(WriteBatch::new().op(WriteOp::DeleteMessages {
                conversation_id: id,
            }))
            .await?;
        self.store
            .commit(WriteBatch::new().op(WriteOp::DeleteConversation(id)))
            .await?;

        metrics::record_conversation_purged();
        info!(conversation_id = %id, "Conversation hidden by all participants, deleted");
        Ok(())
    }
}
