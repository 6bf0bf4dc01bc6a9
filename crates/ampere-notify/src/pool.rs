//! Worker pool consuming the task queue
//!
//! Each worker loops on `dequeue` until the queue closes or shutdown is
//! signalled. Task handling never returns an error to the loop: build
//! failures are logged and the page dropped, delivery failures become
//! state transitions.
//!
//! Shutdown drains: once the queue is closed the workers keep consuming
//! until it is empty or the drain deadline passes. Pending retry timers
//! keep the queue open, so only the deadline bounds the drain.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::builder;
use crate::delivery::{DeliveryAttempt, DeliveryOutcome, DeliveryWorker};
use crate::queue::{NotificationTask, TaskQueue};

/// Process one task to its next resting point
pub async fn process_task(
    task: NotificationTask,
    queue: &dyn TaskQueue,
    delivery: &DeliveryWorker,
) -> Option<DeliveryOutcome> {
    let attempt = match task {
        NotificationTask::Notify {
            batch_time,
            subscription,
            entities,
        } => match builder::build(&subscription, batch_time, &entities) {
            Ok(notification) => DeliveryAttempt::new(notification),
            Err(e) => {
                error!(
                    subscription_id = subscription.subscription_id,
                    entities = entities.len(),
                    error = %e,
                    "Failed to build notification, page dropped"
                );
                return None;
            }
        },
        NotificationTask::Transmit(attempt) => attempt,
    };

    let outcome = delivery.attempt(&attempt).await;
    if let DeliveryOutcome::Retry { next, delay } = &outcome {
        let destination = next.destination.clone();
        if let Err(e) = queue
            .enqueue(NotificationTask::Transmit(next.clone()), Some(*delay))
            .await
        {
            error!(
                destination = %destination,
                error = %e,
                "Failed to schedule notification retry, payload dropped"
            );
        }
    }
    Some(outcome)
}

/// Fixed-size set of delivery workers
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WorkerPool {
    pub fn start(workers: usize, queue: Arc<dyn TaskQueue>, delivery: Arc<DeliveryWorker>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let workers = workers.max(1);

        let handles = (0..workers)
            .map(|id| {
                let queue = queue.clone();
                let delivery = delivery.clone();
                let mut shutdown_rx = shutdown_tx.subscribe();
                tokio::spawn(async move {
                    debug!(worker = id, "Notification worker started");
                    loop {
                        tokio::select! {
                            _ = shutdown_rx.recv() => break,
                            task = queue.dequeue() => match task {
                                Some(task) => {
                                    process_task(task, queue.as_ref(), &delivery).await;
                                }
                                None => break,
                            },
                        }
                    }
                    debug!(worker = id, "Notification worker stopped");
                })
            })
            .collect();

        info!(workers, "Notification worker pool started");
        Self {
            handles,
            shutdown_tx,
        }
    }

    /// Wait for the workers to drain the queue, then stop them.
    ///
    /// Call after closing the queue. Workers still running when
    /// `drain_timeout` expires are signalled and awaited until their
    /// in-flight task finishes; tasks left in the queue are dropped.
    pub async fn shutdown(self, drain_timeout: Duration) {
        let deadline = tokio::time::Instant::now() + drain_timeout;
        let mut remaining = Vec::new();
        for mut handle in self.handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Err(e)) => error!(error = %e, "Notification worker terminated abnormally"),
                Ok(Ok(())) => {}
                Err(_) => remaining.push(handle),
            }
        }

        if !remaining.is_empty() {
            warn!(
                workers = remaining.len(),
                drain_timeout_ms = drain_timeout.as_millis() as u64,
                "Notification queue not drained before deadline, stopping workers"
            );
            let _ = self.shutdown_tx.send(());
            for handle in remaining {
                if let Err(e) = handle.await {
                    error!(error = %e, "Notification worker terminated abnormally");
                }
            }
        }
        info!("Notification worker pool stopped");
    }
}
