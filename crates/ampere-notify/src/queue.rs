//! Task queue decoupling dispatch from delivery
//!
//! The dispatch trigger enqueues one `Notify` task per page; workers turn
//! those into `Transmit` tasks and re-enqueue failed transmissions with a
//! delay. The queue is the only place backoff delays are applied.
//!
//! Immediate enqueues never wait for capacity: a full queue is reported as
//! [`QueueError::Full`] so the trigger can shed load instead of stalling.
//! Delayed tasks wait for capacity on their own timer task.

use std::sync::Mutex;
use std::time::Duration;

use ampere_persistence::{ChangedEntity, SubscriptionData};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::warn;

use crate::delivery::DeliveryAttempt;
use crate::error::QueueError;

/// Unit of work processed by the worker pool
#[derive(Clone, Debug, PartialEq)]
pub enum NotificationTask {
    /// Build and send the notification for one page
    Notify {
        batch_time: DateTime<Utc>,
        subscription: SubscriptionData,
        entities: Vec<ChangedEntity>,
    },
    /// Send (or resend) an already built payload
    Transmit(DeliveryAttempt),
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Add a task, optionally visible only after `delay`. Fails with
    /// [`QueueError`] when an immediate task cannot be accepted.
    async fn enqueue(&self, task: NotificationTask, delay: Option<Duration>)
    -> anyhow::Result<()>;

    /// Next task, or `None` once the queue is closed and drained
    async fn dequeue(&self) -> Option<NotificationTask>;
}

/// Bounded in-process queue over a tokio channel
pub struct InMemoryTaskQueue {
    tx: Mutex<Option<mpsc::Sender<NotificationTask>>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<NotificationTask>>,
}

impl InMemoryTaskQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<NotificationTask>, QueueError> {
        self.tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(QueueError::Closed)
    }

    /// Stop accepting tasks. Already delayed tasks are still delivered, so
    /// `dequeue` only returns `None` once their timers have fired.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(
        &self,
        task: NotificationTask,
        delay: Option<Duration>,
    ) -> anyhow::Result<()> {
        let tx = self.sender()?;
        match delay {
            Some(delay) if !delay.is_zero() => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if tx.send(task).await.is_err() {
                        warn!("Task queue closed before delayed task became due");
                    }
                });
            }
            _ => tx.try_send(task).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            })?,
        }
        Ok(())
    }

    async fn dequeue(&self) -> Option<NotificationTask> {
        self.rx.lock().await.recv().await
    }
}
