//! Notification outbox worker
//!
//! Treatments and treatment recalls queue patient notifications in the same
//! transaction that moves the units. This worker polls the queue, hands each
//! intent to a [`NotificationSink`] and marks it dispatched. Delivery is
//! at-least-once: an intent whose mark fails is sent again on the next pass.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::LedgerResult;
use crate::models::NotificationIntent;
use crate::store::LedgerStore;

/// Delivery channel for patient notifications (SMS gateway, push, ...)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, intent: &NotificationIntent) -> anyhow::Result<()>;
}

/// Sink that only logs. Used when no delivery channel is configured.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, intent: &NotificationIntent) -> anyhow::Result<()> {
        info!(
            notification_id = %intent.id,
            notification_type = intent.notification_type.as_str(),
            "Notification queued for patient"
        );
        Ok(())
    }
}

pub struct OutboxWorker {
    store: Arc<dyn LedgerStore>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    batch_size: u32,
}

impl OutboxWorker {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        poll_interval_ms: u64,
    ) -> Self {
        Self {
            store,
            sink,
            clock,
            poll_interval: Duration::from_millis(poll_interval_ms),
            batch_size: 100,
        }
    }

    /// Deliver one batch of pending intents. Returns how many were marked dispatched.
    pub async fn drain_once(&self) -> LedgerResult<usize> {
        let pending = self.store.pending_notifications(self.batch_size).await?;
        let mut dispatched = 0;
        for intent in &pending {
            if let Err(e) = self.sink.deliver(intent).await {
                warn!(notification_id = %intent.id, "Delivery failed, will retry: {}", e);
                continue;
            }
            if self
                .store
                .mark_notification_dispatched(intent.id, self.clock.now())
                .await?
            {
                dispatched += 1;
            }
        }
        if dispatched > 0 {
            debug!(dispatched, pending = pending.len(), "Outbox drained");
        }
        Ok(dispatched)
    }

    /// Run the polling loop forever
    pub async fn run(&self) {
        info!("Outbox worker starting, poll interval: {:?}", self.poll_interval);
        loop {
            if let Err(e) = self.drain_once().await {
                error!("Outbox drain failed: {}", e);
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::core_types::NotificationType;
    use crate::store::{LedgerTx, MemoryStore};
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<Uuid>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, intent: &NotificationIntent) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("gateway down");
            }
            self.delivered.lock().unwrap().push(intent.id);
            Ok(())
        }
    }

    async fn enqueue(store: &MemoryStore, kind: NotificationType) -> Uuid {
        let intent = NotificationIntent {
            id: Uuid::new_v4(),
            notification_type: kind,
            patient_phone: "01012345678".into(),
            content: "{}".into(),
            created_at: Utc::now(),
            dispatched_at: None,
        };
        let mut tx = store.begin().await.unwrap();
        tx.enqueue_notification(&intent).await.unwrap();
        tx.commit().await.unwrap();
        intent.id
    }

    #[tokio::test]
    async fn test_drain_marks_dispatched_once() {
        let store = MemoryStore::new();
        let first = enqueue(&store, NotificationType::Certification).await;
        let second = enqueue(&store, NotificationType::Recall).await;

        let sink = Arc::new(RecordingSink::default());
        let worker = OutboxWorker::new(
            Arc::new(store.clone()),
            sink.clone(),
            Arc::new(SystemClock),
            10,
        );
        assert_eq!(worker.drain_once().await.unwrap(), 2);
        assert_eq!(worker.drain_once().await.unwrap(), 0);
        assert_eq!(*sink.delivered.lock().unwrap(), vec![first, second]);
        assert!(store.pending_notifications(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_stays_pending() {
        let store = MemoryStore::new();
        enqueue(&store, NotificationType::Certification).await;

        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let worker = OutboxWorker::new(Arc::new(store.clone()), sink, Arc::new(SystemClock), 10);
        assert_eq!(worker.drain_once().await.unwrap(), 0);
        assert_eq!(store.pending_notifications(10).await.unwrap().len(), 1);
    }
}
