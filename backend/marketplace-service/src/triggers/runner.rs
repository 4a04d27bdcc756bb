use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, error, info, warn};

use super::Trigger;
use crate::metrics;
use crate::store::ChangeEvent;

/// Dispatches change events to every registered trigger.
pub struct TriggerRunner {
    triggers: Vec<Arc<dyn Trigger>>,
}

impl TriggerRunner {
    pub fn new(triggers: Vec<Arc<dyn Trigger>>) -> Self {
        Self { triggers }
    }

    pub async fn dispatch(&self, event: &ChangeEvent) {
        for trigger in &self.triggers {
            if let Err(e) = trigger.handle(event).await {
                metrics::record_trigger_failure(trigger.name());
                warn!(
                    trigger = trigger.name(),
                    collection = event.collection(),
                    error = %e,
                    "Trigger failed"
                );
            }
        }
    }

    /// Consume the change feed until the store is dropped.
    pub async fn run(&self, mut rx: broadcast::Receiver<ChangeEvent>) {
        info!(triggers = self.triggers.len(), "Trigger runner starting");
        loop {
            match rx.recv().await {
                Ok(event) => self.dispatch(&event).await,
                Err(RecvError::Lagged(skipped)) => {
                    error!(skipped = skipped, "Trigger runner lagged; events dropped");
                }
                Err(RecvError::Closed) => {
                    info!("Change feed closed, trigger runner stopping");
                    break;
                }
            }
        }
    }

    /// Process everything currently queued, including events produced by the
    /// triggers themselves. Returns the number of events handled.
    pub async fn drain(&self, rx: &mut broadcast::Receiver<ChangeEvent>) -> usize {
        let mut handled = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    self.dispatch(&event).await;
                    handled += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    error!(skipped = skipped, "Trigger drain lagged; events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        debug!(handled = handled, "Trigger drain finished");
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ServiceError, ServiceResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    #[async_trait]
    impl Trigger for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn handle(&self, _event: &ChangeEvent) -> ServiceResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Trigger for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _event: &ChangeEvent) -> ServiceResult<()> {
            Err(ServiceError::Internal("boom".to_string()))
        }
    }

    fn event() -> ChangeEvent {
        let user = crate::models::UserProfile::new(uuid::Uuid::new_v4(), "Bob", None);
        ChangeEvent::User(crate::store::Change {
            before: None,
            after: Some(user),
        })
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_triggers() {
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let runner = TriggerRunner::new(vec![
            Arc::new(Failing) as Arc<dyn Trigger>,
            counting.clone() as Arc<dyn Trigger>,
        ]);

        let (tx, mut rx) = broadcast::channel(8);
        tx.send(event()).unwrap();
        tx.send(event()).unwrap();

        assert_eq!(runner.drain(&mut rx).await, 2);
        assert_eq!(counting.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_stops_when_feed_closes() {
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let runner = TriggerRunner::new(vec![counting.clone() as Arc<dyn Trigger>]);

        let (tx, rx) = broadcast::channel(8);
        tx.send(event()).unwrap();
        drop(tx);

        runner.run(rx).await;
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }
}
