//! Change batch persistence trait

use std::collections::BTreeSet;

use ampere_common::ResourceKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::ChangedEntity;

/// Lookup of the entities touched by one write batch
#[async_trait]
pub trait ChangePersistence: Send + Sync {
    /// Primary keys of every `kind` entity changed or deleted at exactly `timestamp`
    async fn locate_change_batch(
        &self,
        kind: ResourceKind,
        timestamp: DateTime<Utc>,
    ) -> anyhow::Result<BTreeSet<i64>>;

    /// Materialise `keys` into entities, ascending by primary key.
    ///
    /// Deleted entities are rebuilt from their latest deletion snapshot.
    /// Keys that resolve to nothing are omitted.
    async fn fetch_changed_entities(
        &self,
        kind: ResourceKind,
        keys: &BTreeSet<i64>,
    ) -> anyhow::Result<Vec<ChangedEntity>>;
}
