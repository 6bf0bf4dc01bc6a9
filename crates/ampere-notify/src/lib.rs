//! Ampere Notify - Change notification and subscription dispatch
//!
//! Pipeline, leaves first:
//! - [`matcher`]: selects and pages changed entities per subscription
//! - [`builder`]: serializes a page into a notification payload
//! - [`delivery`]: posts a payload and drives the retry state machine
//! - [`queue`] / [`pool`]: the task queue and the workers consuming it
//! - [`dispatch`]: the trigger invoked after a committed write batch

pub mod builder;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod pool;
pub mod queue;

pub use builder::Notification;
pub use delivery::{
    DeliveryAttempt, DeliveryOutcome, DeliveryState, DeliveryWorker, NotificationTransport,
    ReqwestTransport, RetryPolicy,
};
pub use dispatch::DispatchEngine;
pub use error::{QueueError, TransportError};
pub use matcher::SubscriptionMatch;
pub use pool::WorkerPool;
pub use queue::{InMemoryTaskQueue, NotificationTask, TaskQueue};
