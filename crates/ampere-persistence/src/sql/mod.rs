//! SQL-based persistence backend (MySQL/PostgreSQL/SQLite via SeaORM)
//!
//! Implements the persistence traits over the live/archive table pairs of
//! every resource kind. All queries are reads; nothing here writes.

use std::collections::{BTreeSet, HashMap};

use ampere_common::{AmpereError, ConditionAttribute, ResourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Schema,
};
use parking_lot::RwLock;
use tracing::debug;

use crate::archive::{self, ArchiveEntity, ArchiveRecord, TrackedEntity};
use crate::entity::{
    archive_dynamic_operating_envelope, archive_site, archive_site_reading,
    archive_tariff_generated_rate, dynamic_operating_envelope, site, site_reading, subscription,
    subscription_condition, tariff_generated_rate,
};
use crate::model::*;
use crate::traits::*;

/// External database persistence service
///
/// The connection pool can be swapped while the service is shared, so
/// rotated credentials reach every query issued after the swap.
pub struct ExternalDbPersistService {
    db: RwLock<DatabaseConnection>,
}

impl ExternalDbPersistService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db: RwLock::new(db),
        }
    }

    /// Handle to the current connection pool
    pub fn db(&self) -> DatabaseConnection {
        self.db.read().clone()
    }

    /// Route subsequent queries through `db`. Queries already holding the
    /// previous pool finish on it; the previous pool closes once released.
    pub fn replace_connection(&self, db: DatabaseConnection) {
        *self.db.write() = db;
        debug!("Database connection pool replaced");
    }

    async fn locate<L, A>(&self, timestamp: DateTime<Utc>) -> anyhow::Result<BTreeSet<i64>>
    where
        L: TrackedEntity,
        A: ArchiveEntity,
    {
        archive::locate_change_batch::<L, A, _>(&self.db(), timestamp).await
    }

    /// Resolve entities that hang off a site, taking the aggregator from the
    /// parent site. Children whose site cannot be resolved are dropped.
    async fn resolve_site_children<L, A>(
        &self,
        keys: &BTreeSet<i64>,
    ) -> anyhow::Result<Vec<ChangedEntity>>
    where
        L: EntityTrait,
        L::Model: Into<SiteChild>,
        A: ArchiveEntity,
        A::Model: ArchiveRecord + Into<SiteChild>,
    {
        let db = self.db();
        let rows = archive::resolve_with_archive::<L, A, _>(&db, keys).await?;
        let children: Vec<SiteChild> = rows
            .live
            .into_iter()
            .map(Into::into)
            .chain(rows.archived.into_iter().map(Into::into))
            .collect();

        let site_ids: BTreeSet<i64> = children.iter().map(|c| c.site_id).collect();
        let sites = archive::resolve_with_archive::<site::Entity, archive_site::Entity, _>(
            &db, &site_ids,
        )
        .await?;
        let owners: HashMap<i64, i64> = sites
            .live
            .iter()
            .map(|s| (s.site_id, s.aggregator_id))
            .chain(sites.archived.iter().map(|s| (s.site_id, s.aggregator_id)))
            .collect();

        let mut entities = Vec::with_capacity(children.len());
        for child in children {
            match owners.get(&child.site_id) {
                Some(&aggregator_id) => entities.push(child.into_changed(aggregator_id)),
                None => debug!(
                    primary_key = child.primary_key,
                    site_id = child.site_id,
                    "Dropping entity whose parent site cannot be resolved"
                ),
            }
        }
        Ok(entities)
    }
}

/// Create every table known to this crate if it does not exist yet
pub async fn create_schema<C: ConnectionTrait>(db: &C) -> anyhow::Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(site::Entity),
        schema.create_table_from_entity(archive_site::Entity),
        schema.create_table_from_entity(dynamic_operating_envelope::Entity),
        schema.create_table_from_entity(archive_dynamic_operating_envelope::Entity),
        schema.create_table_from_entity(tariff_generated_rate::Entity),
        schema.create_table_from_entity(archive_tariff_generated_rate::Entity),
        schema.create_table_from_entity(site_reading::Entity),
        schema.create_table_from_entity(archive_site_reading::Entity),
        schema.create_table_from_entity(subscription::Entity),
        schema.create_table_from_entity(subscription_condition::Entity),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }
    debug!(tables = statements.len(), "Schema ensured");
    Ok(())
}

// ============================================================================
// PersistenceService implementation
// ============================================================================

#[async_trait]
impl PersistenceService for ExternalDbPersistService {
    async fn health_check(&self) -> anyhow::Result<()> {
        self.db().ping().await?;
        Ok(())
    }
}

// ============================================================================
// ChangePersistence implementation
// ============================================================================

/// A site child before its aggregator is known
pub(crate) struct SiteChild {
    primary_key: i64,
    site_id: i64,
    changed_time: DateTime<Utc>,
    deleted_time: Option<DateTime<Utc>>,
    payload: EntityPayload,
}

impl SiteChild {
    fn into_changed(self, aggregator_id: i64) -> ChangedEntity {
        ChangedEntity {
            primary_key: self.primary_key,
            aggregator_id,
            site_id: self.site_id,
            changed_time: self.changed_time,
            deleted_time: self.deleted_time,
            payload: self.payload,
        }
    }
}

fn site_to_changed(m: site::Model) -> ChangedEntity {
    ChangedEntity {
        primary_key: m.site_id,
        aggregator_id: m.aggregator_id,
        site_id: m.site_id,
        changed_time: m.changed_time,
        deleted_time: None,
        payload: EntityPayload::Site(SiteData {
            site_id: m.site_id,
            nmi: m.nmi,
            lfdi: m.lfdi,
            sfdi: m.sfdi,
            device_category: m.device_category,
            timezone_id: m.timezone_id,
        }),
    }
}

fn archived_site_to_changed(m: archive_site::Model) -> ChangedEntity {
    ChangedEntity {
        primary_key: m.site_id,
        aggregator_id: m.aggregator_id,
        site_id: m.site_id,
        changed_time: m.changed_time,
        deleted_time: m.deleted_time,
        payload: EntityPayload::Site(SiteData {
            site_id: m.site_id,
            nmi: m.nmi,
            lfdi: m.lfdi,
            sfdi: m.sfdi,
            device_category: m.device_category,
            timezone_id: m.timezone_id,
        }),
    }
}

impl From<dynamic_operating_envelope::Model> for SiteChild {
    fn from(m: dynamic_operating_envelope::Model) -> Self {
        SiteChild {
            primary_key: m.dynamic_operating_envelope_id,
            site_id: m.site_id,
            changed_time: m.changed_time,
            deleted_time: None,
            payload: EntityPayload::DynamicOperatingEnvelope(DynamicOperatingEnvelopeData {
                dynamic_operating_envelope_id: m.dynamic_operating_envelope_id,
                site_id: m.site_id,
                start_time: m.start_time,
                duration_seconds: m.duration_seconds,
                import_limit_active_watts: m.import_limit_active_watts,
                export_limit_watts: m.export_limit_watts,
            }),
        }
    }
}

impl From<archive_dynamic_operating_envelope::Model> for SiteChild {
    fn from(m: archive_dynamic_operating_envelope::Model) -> Self {
        SiteChild {
            primary_key: m.dynamic_operating_envelope_id,
            site_id: m.site_id,
            changed_time: m.changed_time,
            deleted_time: m.deleted_time,
            payload: EntityPayload::DynamicOperatingEnvelope(DynamicOperatingEnvelopeData {
                dynamic_operating_envelope_id: m.dynamic_operating_envelope_id,
                site_id: m.site_id,
                start_time: m.start_time,
                duration_seconds: m.duration_seconds,
                import_limit_active_watts: m.import_limit_active_watts,
                export_limit_watts: m.export_limit_watts,
            }),
        }
    }
}

impl From<tariff_generated_rate::Model> for SiteChild {
    fn from(m: tariff_generated_rate::Model) -> Self {
        SiteChild {
            primary_key: m.tariff_generated_rate_id,
            site_id: m.site_id,
            changed_time: m.changed_time,
            deleted_time: None,
            payload: EntityPayload::TariffGeneratedRate(TariffGeneratedRateData {
                tariff_generated_rate_id: m.tariff_generated_rate_id,
                tariff_id: m.tariff_id,
                site_id: m.site_id,
                start_time: m.start_time,
                duration_seconds: m.duration_seconds,
                import_active_price: m.import_active_price,
                export_active_price: m.export_active_price,
            }),
        }
    }
}

impl From<archive_tariff_generated_rate::Model> for SiteChild {
    fn from(m: archive_tariff_generated_rate::Model) -> Self {
        SiteChild {
            primary_key: m.tariff_generated_rate_id,
            site_id: m.site_id,
            changed_time: m.changed_time,
            deleted_time: m.deleted_time,
            payload: EntityPayload::TariffGeneratedRate(TariffGeneratedRateData {
                tariff_generated_rate_id: m.tariff_generated_rate_id,
                tariff_id: m.tariff_id,
                site_id: m.site_id,
                start_time: m.start_time,
                duration_seconds: m.duration_seconds,
                import_active_price: m.import_active_price,
                export_active_price: m.export_active_price,
            }),
        }
    }
}

impl From<site_reading::Model> for SiteChild {
    fn from(m: site_reading::Model) -> Self {
        SiteChild {
            primary_key: m.site_reading_id,
            site_id: m.site_id,
            changed_time: m.changed_time,
            deleted_time: None,
            payload: EntityPayload::Reading(ReadingData {
                site_reading_id: m.site_reading_id,
                site_reading_type_id: m.site_reading_type_id,
                site_id: m.site_id,
                local_id: m.local_id,
                quality_flags: m.quality_flags,
                time_period_start: m.time_period_start,
                time_period_seconds: m.time_period_seconds,
                value: m.value,
            }),
        }
    }
}

impl From<archive_site_reading::Model> for SiteChild {
    fn from(m: archive_site_reading::Model) -> Self {
        SiteChild {
            primary_key: m.site_reading_id,
            site_id: m.site_id,
            changed_time: m.changed_time,
            deleted_time: m.deleted_time,
            payload: EntityPayload::Reading(ReadingData {
                site_reading_id: m.site_reading_id,
                site_reading_type_id: m.site_reading_type_id,
                site_id: m.site_id,
                local_id: m.local_id,
                quality_flags: m.quality_flags,
                time_period_start: m.time_period_start,
                time_period_seconds: m.time_period_seconds,
                value: m.value,
            }),
        }
    }
}

#[async_trait]
impl ChangePersistence for ExternalDbPersistService {
    async fn locate_change_batch(
        &self,
        kind: ResourceKind,
        timestamp: DateTime<Utc>,
    ) -> anyhow::Result<BTreeSet<i64>> {
        match kind {
            ResourceKind::Site => {
                self.locate::<site::Entity, archive_site::Entity>(timestamp)
                    .await
            }
            ResourceKind::DynamicOperatingEnvelope => {
                self.locate::<
                    dynamic_operating_envelope::Entity,
                    archive_dynamic_operating_envelope::Entity,
                >(timestamp)
                .await
            }
            ResourceKind::TariffGeneratedRate => {
                self.locate::<tariff_generated_rate::Entity, archive_tariff_generated_rate::Entity>(
                    timestamp,
                )
                .await
            }
            ResourceKind::Reading => {
                self.locate::<site_reading::Entity, archive_site_reading::Entity>(timestamp)
                    .await
            }
        }
    }

    async fn fetch_changed_entities(
        &self,
        kind: ResourceKind,
        keys: &BTreeSet<i64>,
    ) -> anyhow::Result<Vec<ChangedEntity>> {
        let mut entities: Vec<ChangedEntity> = match kind {
            ResourceKind::Site => {
                let rows = archive::resolve_with_archive::<site::Entity, archive_site::Entity, _>(
                    &self.db(),
                    keys,
                )
                .await?;
                rows.live
                    .into_iter()
                    .map(site_to_changed)
                    .chain(rows.archived.into_iter().map(archived_site_to_changed))
                    .collect()
            }
            ResourceKind::DynamicOperatingEnvelope => {
                self.resolve_site_children::<
                    dynamic_operating_envelope::Entity,
                    archive_dynamic_operating_envelope::Entity,
                >(keys)
                .await?
            }
            ResourceKind::TariffGeneratedRate => {
                self.resolve_site_children::<
                    tariff_generated_rate::Entity,
                    archive_tariff_generated_rate::Entity,
                >(keys)
                .await?
            }
            ResourceKind::Reading => {
                self.resolve_site_children::<site_reading::Entity, archive_site_reading::Entity>(
                    keys,
                )
                .await?
            }
        };

        entities.sort_by_key(|e| e.primary_key);
        Ok(entities)
    }
}

// ============================================================================
// SubscriptionPersistence implementation
// ============================================================================

fn condition_from_model(m: subscription_condition::Model) -> anyhow::Result<ConditionData> {
    let attribute = ConditionAttribute::from_code(m.attribute).ok_or_else(|| {
        AmpereError::Configuration(format!(
            "subscription {} has condition {} with unknown attribute code {}",
            m.subscription_id, m.subscription_condition_id, m.attribute
        ))
    })?;
    Ok(ConditionData {
        attribute,
        lower_threshold: m.lower_threshold,
        upper_threshold: m.upper_threshold,
    })
}

fn subscription_from_model(
    m: subscription::Model,
    resource_kind: ResourceKind,
    conditions: Vec<ConditionData>,
) -> anyhow::Result<SubscriptionData> {
    let entity_limit = usize::try_from(m.entity_limit)
        .ok()
        .filter(|limit| *limit >= 1)
        .ok_or_else(|| {
            AmpereError::Configuration(format!(
                "subscription {} has entity_limit {}, must be at least 1",
                m.subscription_id, m.entity_limit
            ))
        })?;
    Ok(SubscriptionData {
        subscription_id: m.subscription_id,
        aggregator_id: m.aggregator_id,
        resource_kind,
        scoped_site_id: m.scoped_site_id,
        notification_uri: m.notification_uri,
        entity_limit,
        conditions,
    })
}

#[async_trait]
impl SubscriptionPersistence for ExternalDbPersistService {
    async fn list_active_subscriptions(
        &self,
        kind: ResourceKind,
    ) -> anyhow::Result<Vec<SubscriptionData>> {
        let db = self.db();
        let subscriptions = subscription::Entity::find()
            .filter(subscription::Column::ResourceType.eq(kind.code()))
            .order_by_asc(subscription::Column::SubscriptionId)
            .all(&db)
            .await?;

        if subscriptions.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = subscriptions.iter().map(|s| s.subscription_id).collect();
        let condition_rows = subscription_condition::Entity::find()
            .filter(subscription_condition::Column::SubscriptionId.is_in(ids))
            .order_by_asc(subscription_condition::Column::SubscriptionConditionId)
            .all(&db)
            .await?;

        let mut conditions: HashMap<i64, Vec<ConditionData>> = HashMap::new();
        for row in condition_rows {
            let subscription_id = row.subscription_id;
            conditions
                .entry(subscription_id)
                .or_default()
                .push(condition_from_model(row)?);
        }

        subscriptions
            .into_iter()
            .map(|s| {
                let own = conditions.remove(&s.subscription_id).unwrap_or_default();
                subscription_from_model(s, kind, own)
            })
            .collect()
    }
}
