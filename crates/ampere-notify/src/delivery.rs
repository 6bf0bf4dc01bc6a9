//! Notification delivery
//!
//! A [`DeliveryAttempt`] is a small state machine:
//!
//! ```text
//! PENDING -> DELIVERED        2xx
//!         -> REJECTED         3xx, 4xx
//!         -> RETRY_SCHEDULED  5xx / network error / timeout, attempts left
//!         -> ABANDONED        5xx / network error / timeout, ceiling reached
//! ```
//!
//! [`DeliveryWorker::attempt`] performs one transition. Retries are not
//! slept on here; the caller re-enqueues the next attempt with the returned
//! delay, so the backoff schedule lives in the task queue.

use std::sync::Arc;
use std::time::Duration;

use ampere_common::{NOTIFICATION_CONTENT_TYPE, SUBSCRIPTION_HREF_HEADER};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::builder::Notification;
use crate::error::TransportError;
use crate::metrics;

/// Performs one HTTP POST and reports the response status
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn post(
        &self,
        uri: &str,
        headers: &[(&'static str, String)],
        body: Bytes,
    ) -> Result<u16, TransportError>;
}

/// `reqwest`-backed transport with a per-call timeout.
///
/// Redirects are not followed; a 3xx reaches the state machine as-is.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NotificationTransport for ReqwestTransport {
    async fn post(
        &self,
        uri: &str,
        headers: &[(&'static str, String)],
        body: Bytes,
    ) -> Result<u16, TransportError> {
        let mut request = self.client.post(uri);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = request.body(body).send().await?;
        Ok(response.status().as_u16())
    }
}

/// Retry ceiling and backoff schedule
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Fraction of the delay added or removed at random
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 10_000,
            max_delay_ms: 600_000,
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt` (1-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32 - 1);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let jitter_range = capped_delay * self.jitter;
        let jitter = if jitter_range > 0.0 {
            (rand::random::<f64>() - 0.5) * 2.0 * jitter_range
        } else {
            0.0
        };
        let final_delay = (capped_delay + jitter).max(0.0) as u64;

        Duration::from_millis(final_delay)
    }

    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// One in-flight delivery
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveryAttempt {
    pub destination: String,
    pub payload: Bytes,
    pub subscription_href: String,
    /// 1-based number of the attempt about to be made
    pub attempt: u32,
}

impl DeliveryAttempt {
    pub fn new(notification: Notification) -> Self {
        Self {
            destination: notification.destination,
            payload: notification.payload,
            subscription_href: notification.subscription_href,
            attempt: 1,
        }
    }

    fn next(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("content-type", NOTIFICATION_CONTENT_TYPE.to_string()),
            (SUBSCRIPTION_HREF_HEADER, self.subscription_href.clone()),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryState {
    Delivered,
    Rejected,
    RetryScheduled,
    Abandoned,
}

impl DeliveryState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, DeliveryState::RetryScheduled)
    }
}

/// Result of one transition out of `PENDING`
#[derive(Clone, Debug, PartialEq)]
pub enum DeliveryOutcome {
    Delivered { status: u16 },
    Rejected { status: Option<u16> },
    Retry { next: DeliveryAttempt, delay: Duration },
    Abandoned,
}

impl DeliveryOutcome {
    pub fn state(&self) -> DeliveryState {
        match self {
            DeliveryOutcome::Delivered { .. } => DeliveryState::Delivered,
            DeliveryOutcome::Rejected { .. } => DeliveryState::Rejected,
            DeliveryOutcome::Retry { .. } => DeliveryState::RetryScheduled,
            DeliveryOutcome::Abandoned => DeliveryState::Abandoned,
        }
    }
}

/// Drives delivery attempts through the transport
pub struct DeliveryWorker {
    transport: Arc<dyn NotificationTransport>,
    policy: RetryPolicy,
}

impl DeliveryWorker {
    pub fn new(transport: Arc<dyn NotificationTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Make one attempt and decide the next state. Never fails.
    pub async fn attempt(&self, attempt: &DeliveryAttempt) -> DeliveryOutcome {
        let result = self
            .transport
            .post(
                &attempt.destination,
                &attempt.headers(),
                attempt.payload.clone(),
            )
            .await;

        let payload_bytes = attempt.payload.len();
        match result {
            Ok(status) if (200..300).contains(&status) => {
                info!(
                    destination = %attempt.destination,
                    subscription_href = %attempt.subscription_href,
                    payload_bytes,
                    attempt = attempt.attempt,
                    status,
                    "Notification delivered"
                );
                metrics::record_delivered(payload_bytes);
                DeliveryOutcome::Delivered { status }
            }
            Ok(status) if (300..500).contains(&status) => {
                warn!(
                    destination = %attempt.destination,
                    subscription_href = %attempt.subscription_href,
                    payload_bytes,
                    attempt = attempt.attempt,
                    status,
                    "Notification rejected by destination"
                );
                metrics::record_rejected(Some(status));
                DeliveryOutcome::Rejected {
                    status: Some(status),
                }
            }
            Err(e) if !e.is_transient() => {
                warn!(
                    destination = %attempt.destination,
                    subscription_href = %attempt.subscription_href,
                    payload_bytes,
                    attempt = attempt.attempt,
                    error = %e,
                    "Notification request cannot be sent"
                );
                metrics::record_rejected(None);
                DeliveryOutcome::Rejected { status: None }
            }
            failure => {
                let (status, error) = match &failure {
                    Ok(status) => (Some(*status), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                self.transient_failure(attempt, status, error)
            }
        }
    }

    fn transient_failure(
        &self,
        attempt: &DeliveryAttempt,
        status: Option<u16>,
        error: Option<String>,
    ) -> DeliveryOutcome {
        let payload_bytes = attempt.payload.len();

        if !self.policy.has_attempts_left(attempt.attempt) {
            warn!(
                destination = %attempt.destination,
                subscription_href = %attempt.subscription_href,
                payload_bytes,
                attempt = attempt.attempt,
                status,
                error = error.as_deref(),
                "Notification abandoned after exhausting retries"
            );
            metrics::record_abandoned();
            return DeliveryOutcome::Abandoned;
        }

        let delay = self.policy.calculate_delay(attempt.attempt);
        info!(
            destination = %attempt.destination,
            subscription_href = %attempt.subscription_href,
            payload_bytes,
            attempt = attempt.attempt,
            status,
            error = error.as_deref(),
            delay_ms = delay.as_millis() as u64,
            "Notification delivery failed, retry scheduled"
        );
        metrics::record_retried();
        DeliveryOutcome::Retry {
            next: attempt.next(),
            delay,
        }
    }
}
