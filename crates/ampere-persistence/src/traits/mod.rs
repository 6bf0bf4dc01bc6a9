//! Persistence traits for change tracking and subscriptions
//!
//! The dispatch pipeline only talks to storage through these traits, so a
//! test or an alternative backend can stand in for the SQL implementation.

pub mod change;
pub mod subscription;

pub use change::ChangePersistence;
pub use subscription::SubscriptionPersistence;

use async_trait::async_trait;

/// Unified persistence service trait
#[async_trait]
pub trait PersistenceService: ChangePersistence + SubscriptionPersistence + Send + Sync {
    /// Health check for the storage backend
    async fn health_check(&self) -> anyhow::Result<()>;
}
