//! Dispatch trigger
//!
//! Entry point called after a write batch commits. It locates the batch,
//! materialises its entities, matches them against subscriptions and
//! enqueues one task per page. Everything after the enqueue runs in the
//! worker pool.

use std::sync::Arc;

use ampere_common::ResourceKind;
use ampere_persistence::{ChangePersistence, PersistenceService, SubscriptionPersistence};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::builder::{self, Notification};
use crate::matcher::{self, SubscriptionMatch};
use crate::metrics;
use crate::queue::{NotificationTask, TaskQueue};

pub struct DispatchEngine {
    persistence: Arc<dyn PersistenceService>,
    queue: Arc<dyn TaskQueue>,
}

impl DispatchEngine {
    pub fn new(persistence: Arc<dyn PersistenceService>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { persistence, queue }
    }

    /// Locate, resolve and match one change batch
    pub async fn match_batch(
        &self,
        kind: ResourceKind,
        timestamp: DateTime<Utc>,
    ) -> anyhow::Result<Vec<SubscriptionMatch>> {
        let keys = self.persistence.locate_change_batch(kind, timestamp).await?;
        if keys.is_empty() {
            debug!(kind = %kind, timestamp = %timestamp, "Empty change batch");
            return Ok(Vec::new());
        }

        let entities = self
            .persistence
            .fetch_changed_entities(kind, &keys)
            .await?;
        let subscriptions = self.persistence.list_active_subscriptions(kind).await?;

        let matches = matcher::match_subscriptions(&subscriptions, &entities);
        debug!(
            kind = %kind,
            timestamp = %timestamp,
            located = keys.len(),
            resolved = entities.len(),
            subscriptions = subscriptions.len(),
            matched = matches.len(),
            "Matched change batch"
        );
        Ok(matches)
    }

    /// Build every notification for a batch without enqueueing anything
    pub async fn build_notifications(
        &self,
        kind: ResourceKind,
        timestamp: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Notification>> {
        let mut notifications = Vec::new();
        for matched in self.match_batch(kind, timestamp).await? {
            for page in &matched.pages {
                notifications.push(builder::build(&matched.subscription, timestamp, page)?);
            }
        }
        Ok(notifications)
    }

    /// Enqueue one notification task per (subscription, page).
    ///
    /// Returns the number of tasks enqueued. Delivery outcomes are never
    /// reported back here. When the queue rejects a page the pages already
    /// enqueued stay queued and the error says how many there were.
    pub async fn notify_resource_changed(
        &self,
        kind: ResourceKind,
        timestamp: DateTime<Utc>,
    ) -> anyhow::Result<usize> {
        let matches = self.match_batch(kind, timestamp).await?;
        let total: usize = matches.iter().map(|m| m.pages.len()).sum();

        let mut enqueued = 0;
        for matched in matches {
            let SubscriptionMatch {
                subscription,
                pages,
            } = matched;
            for entities in pages {
                let task = NotificationTask::Notify {
                    batch_time: timestamp,
                    subscription: subscription.clone(),
                    entities,
                };
                if let Err(e) = self.queue.enqueue(task, None).await {
                    error!(
                        kind = %kind,
                        timestamp = %timestamp,
                        subscription_id = subscription.subscription_id,
                        enqueued,
                        total,
                        error = %e,
                        "Dispatch interrupted, remaining pages not enqueued"
                    );
                    metrics::record_enqueued(kind.as_str(), enqueued);
                    return Err(e.context(format!(
                        "enqueued {} of {} pages before failure",
                        enqueued, total
                    )));
                }
                enqueued += 1;
            }
        }

        metrics::record_enqueued(kind.as_str(), enqueued);
        info!(
            kind = %kind,
            timestamp = %timestamp,
            enqueued,
            "Resource change dispatched"
        );
        Ok(enqueued)
    }
}
