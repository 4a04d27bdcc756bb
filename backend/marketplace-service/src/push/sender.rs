/// Push Notification Sender
///
/// Delivers one payload to every token of a recipient and prunes tokens the
/// provider rejects as unregistered or invalid. Other failures are logged
/// and dropped.
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DeliveryOutcome, PushPayload, PushTransport};
use crate::metrics;
use crate::store::{DocumentStore, WriteBatch, WriteOp};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushReport {
    pub delivered: usize,
    pub failed: usize,
    pub pruned: Vec<String>,
}

pub struct PushSender {
    transport: Arc<dyn PushTransport>,
    store: Arc<dyn DocumentStore>,
}

impl PushSender {
    pub fn new(transport: Arc<dyn PushTransport>, store: Arc<dyn DocumentStore>) -> Self {
        Self { transport, store }
    }

    pub async fn send(&self, user_id: Uuid, payload: &PushPayload) -> PushReport {
        let outcomes = join_all(
            payload
                .tokens
                .iter()
                .map(|token| async move { (token, self.transport.deliver(token, payload).await) }),
        )
        .await;

        let mut report = PushReport::default();
        for (token, outcome) in outcomes {
            metrics::record_push_delivery(outcome.label());
            match outcome {
                DeliveryOutcome::Delivered => report.delivered += 1,
                DeliveryOutcome::TokenInvalid(code) => {
                    debug!(user_id = %user_id, code = %code, "Push token rejected");
                    report.pruned.push(token.clone());
                }
                DeliveryOutcome::Failed(reason) => {
                    warn!(user_id = %user_id, error = %reason, "Push delivery failed");
                    report.failed += 1;
                }
            }
        }

        if !report.pruned.is_empty() {
            let batch = WriteBatch::new().op(WriteOp::RemovePushTokens {
                user_id,
                tokens: report.pruned.clone(),
            });
            match self.store.commit(batch).await {
                Ok(_) => {
                    metrics::record_tokens_pruned(report.pruned.len());
                    info!(
                        user_id = %user_id,
                        pruned = report.pruned.len(),
                        "Pruned invalid push tokens"
                    );
                }
                Err(e) => warn!(user_id = %user_id, error = %e, "Failed to prune push tokens"),
            }
        }

        report
    }
}
