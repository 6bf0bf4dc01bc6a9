//! Archive resolution and change batch lookup
//!
//! Every tracked live table has an append-only archive counterpart holding
//! snapshots of rows as they were updated or deleted. Two generic operations
//! work over any (live, archive) entity pair:
//!
//! - [`resolve_with_archive`] materialises a set of primary keys into live
//!   rows, falling back to the most recent deletion snapshot for keys that
//!   are no longer live.
//! - [`locate_change_batch`] finds every key whose live row was modified, or
//!   whose deletion was recorded, at one exact timestamp.
//!
//! Both require the live table to have a single-column integer primary key,
//! and the archive table to carry a column of the same name.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use ampere_common::AmpereError;
use sea_orm::prelude::DateTimeUtc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityName, EntityTrait, IdenStatic, Iterable, ModelTrait,
    PrimaryKeyToColumn, QueryFilter, QueryOrder, QuerySelect, Value,
};
use tracing::debug;

/// A live table whose rows carry a last-modified timestamp
pub trait TrackedEntity: EntityTrait {
    fn changed_time_column() -> Self::Column;
}

/// The archive counterpart of a [`TrackedEntity`]
pub trait ArchiveEntity: EntityTrait {
    fn deleted_time_column() -> Self::Column;
}

/// Accessors every archive row provides
pub trait ArchiveRecord {
    /// Primary key of the live row this snapshot was taken from
    fn archived_key(&self) -> i64;
    fn archive_time(&self) -> DateTimeUtc;
    fn deleted_time(&self) -> Option<DateTimeUtc>;
}

/// Output of [`resolve_with_archive`]
#[derive(Clone, Debug)]
pub struct ResolvedRows<L, A> {
    /// Rows still present in the live table, ascending by primary key
    pub live: Vec<L>,
    /// Authoritative deletion snapshots, ascending by primary key
    pub archived: Vec<A>,
}

impl<L, A> Default for ResolvedRows<L, A> {
    fn default() -> Self {
        Self {
            live: Vec::new(),
            archived: Vec::new(),
        }
    }
}

impl<L, A> ResolvedRows<L, A> {
    pub fn len(&self) -> usize {
        self.live.len() + self.archived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty() && self.archived.is_empty()
    }
}

/// Return the single primary key column of `E`, or an invariant error
pub fn single_primary_key<E: EntityTrait>() -> anyhow::Result<E::Column> {
    let mut keys = E::PrimaryKey::iter();
    match (keys.next(), keys.next()) {
        (Some(key), None) => Ok(key.into_column()),
        _ => Err(AmpereError::Invariant(format!(
            "table '{}' must have a single-column primary key",
            E::default().table_name()
        ))
        .into()),
    }
}

/// Find the archive column that mirrors the live primary key column
fn archive_key_column<L: EntityTrait, A: EntityTrait>(
    live_key: &L::Column,
) -> anyhow::Result<A::Column> {
    A::Column::from_str(live_key.as_str()).map_err(|_| {
        AmpereError::Invariant(format!(
            "archive table '{}' has no column '{}'",
            A::default().table_name(),
            live_key.as_str()
        ))
        .into()
    })
}

/// Interpret a primary key value as an integer key
pub fn key_from_value(value: Value) -> Option<i64> {
    match value {
        Value::BigInt(Some(v)) => Some(v),
        Value::Int(Some(v)) => Some(v as i64),
        Value::SmallInt(Some(v)) => Some(v as i64),
        Value::BigUnsigned(Some(v)) => i64::try_from(v).ok(),
        Value::Unsigned(Some(v)) => Some(v as i64),
        _ => None,
    }
}

/// Fetch the rows for `keys`, falling back to deletion snapshots.
///
/// Keys present in the live table come back in `live` only. Keys absent
/// from the live table but with at least one archive row carrying a
/// `deleted_time` come back exactly once in `archived`, as the row with the
/// greatest `(deleted_time, archive_time)`. Keys matching neither are
/// silently omitted.
pub async fn resolve_with_archive<L, A, C>(
    db: &C,
    keys: &BTreeSet<i64>,
) -> anyhow::Result<ResolvedRows<L::Model, A::Model>>
where
    L: EntityTrait,
    A: ArchiveEntity,
    A::Model: ArchiveRecord,
    C: ConnectionTrait,
{
    let live_key = single_primary_key::<L>()?;
    let archive_key = archive_key_column::<L, A>(&live_key)?;

    if keys.is_empty() {
        return Ok(ResolvedRows::default());
    }

    let live = L::find()
        .filter(live_key.is_in(keys.iter().copied()))
        .order_by_asc(live_key)
        .all(db)
        .await?;

    let found: BTreeSet<i64> = live
        .iter()
        .filter_map(|row| key_from_value(row.get(live_key)))
        .collect();
    let missing: Vec<i64> = keys.difference(&found).copied().collect();

    if missing.is_empty() {
        return Ok(ResolvedRows {
            live,
            archived: Vec::new(),
        });
    }

    let candidates = A::find()
        .filter(archive_key.is_in(missing.iter().copied()))
        .filter(A::deleted_time_column().is_not_null())
        .order_by_asc(archive_key)
        .all(db)
        .await?;

    // Keep the (deleted_time, archive_time) maximum per key
    let mut latest: BTreeMap<i64, A::Model> = BTreeMap::new();
    for row in candidates {
        let key = row.archived_key();
        let replace = match latest.get(&key) {
            Some(current) => {
                (row.deleted_time(), row.archive_time())
                    > (current.deleted_time(), current.archive_time())
            }
            None => true,
        };
        if replace {
            latest.insert(key, row);
        }
    }

    debug!(
        table = L::default().table_name(),
        requested = keys.len(),
        live = live.len(),
        archived = latest.len(),
        unresolved = missing.len() - latest.len(),
        "Resolved keys against archive"
    );

    Ok(ResolvedRows {
        live,
        archived: latest.into_values().collect(),
    })
}

/// Primary keys of every row changed or deleted at exactly `timestamp`.
///
/// This is the definition of one change batch: live rows whose
/// `changed_time` equals `timestamp`, unioned with archive rows whose
/// `deleted_time` equals `timestamp`.
pub async fn locate_change_batch<L, A, C>(
    db: &C,
    timestamp: DateTimeUtc,
) -> anyhow::Result<BTreeSet<i64>>
where
    L: TrackedEntity,
    A: ArchiveEntity,
    C: ConnectionTrait,
{
    let live_key = single_primary_key::<L>()?;
    let archive_key = archive_key_column::<L, A>(&live_key)?;

    let changed: Vec<i64> = L::find()
        .select_only()
        .column(live_key)
        .filter(L::changed_time_column().eq(timestamp))
        .into_tuple()
        .all(db)
        .await?;

    let deleted: Vec<i64> = A::find()
        .select_only()
        .column(archive_key)
        .filter(A::deleted_time_column().eq(timestamp))
        .into_tuple()
        .all(db)
        .await?;

    let batch: BTreeSet<i64> = changed.into_iter().chain(deleted).collect();
    debug!(
        table = L::default().table_name(),
        timestamp = %timestamp,
        size = batch.len(),
        "Located change batch"
    );
    Ok(batch)
}
