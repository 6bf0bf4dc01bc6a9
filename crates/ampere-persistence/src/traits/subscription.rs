//! Subscription persistence trait

use ampere_common::ResourceKind;
use async_trait::async_trait;

use crate::model::SubscriptionData;

#[async_trait]
pub trait SubscriptionPersistence: Send + Sync {
    /// Every subscription for `kind` with its conditions, ascending by id
    async fn list_active_subscriptions(
        &self,
        kind: ResourceKind,
    ) -> anyhow::Result<Vec<SubscriptionData>>;
}
