//! Domain model types for the persistence abstraction layer
//!
//! These types are returned by the persistence traits, decoupled from the
//! live/archive entity split. A [`ChangedEntity`] looks the same whether it
//! was read from a live row or reconstructed from a deletion snapshot; the
//! only difference is a populated `deleted_time`.

use ampere_common::{ConditionAttribute, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Site fields published in notifications
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteData {
    pub site_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nmi: Option<String>,
    pub lfdi: String,
    pub sfdi: i64,
    pub device_category: i32,
    pub timezone_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicOperatingEnvelopeData {
    pub dynamic_operating_envelope_id: i64,
    pub site_id: i64,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub import_limit_active_watts: f64,
    pub export_limit_watts: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffGeneratedRateData {
    pub tariff_generated_rate_id: i64,
    pub tariff_id: i64,
    pub site_id: i64,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub import_active_price: f64,
    pub export_active_price: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingData {
    pub site_reading_id: i64,
    pub site_reading_type_id: i64,
    pub site_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_id: Option<i32>,
    pub quality_flags: i32,
    pub time_period_start: DateTime<Utc>,
    pub time_period_seconds: i64,
    pub value: i64,
}

/// Kind-specific fields of a changed entity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EntityPayload {
    Site(SiteData),
    DynamicOperatingEnvelope(DynamicOperatingEnvelopeData),
    TariffGeneratedRate(TariffGeneratedRateData),
    Reading(ReadingData),
}

impl EntityPayload {
    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            EntityPayload::Site(_) => ResourceKind::Site,
            EntityPayload::DynamicOperatingEnvelope(_) => ResourceKind::DynamicOperatingEnvelope,
            EntityPayload::TariffGeneratedRate(_) => ResourceKind::TariffGeneratedRate,
            EntityPayload::Reading(_) => ResourceKind::Reading,
        }
    }
}

/// One entity of a change batch, live or deleted
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedEntity {
    pub primary_key: i64,
    /// Aggregator owning the entity (for site children, the parent site's)
    pub aggregator_id: i64,
    /// The entity's site (for sites, the site itself)
    pub site_id: i64,
    pub changed_time: DateTime<Utc>,
    /// Populated only when the entity was resolved from a deletion snapshot
    pub deleted_time: Option<DateTime<Utc>>,
    pub payload: EntityPayload,
}

impl ChangedEntity {
    pub fn resource_kind(&self) -> ResourceKind {
        self.payload.resource_kind()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_time.is_some()
    }

    /// Numeric value of `attribute`, or `None` when this kind has no such attribute
    pub fn attribute(&self, attribute: ConditionAttribute) -> Option<f64> {
        match (&self.payload, attribute) {
            (EntityPayload::Reading(r), ConditionAttribute::ReadingValue) => Some(r.value as f64),
            (
                EntityPayload::DynamicOperatingEnvelope(doe),
                ConditionAttribute::ImportLimitWatts,
            ) => Some(doe.import_limit_active_watts),
            (
                EntityPayload::DynamicOperatingEnvelope(doe),
                ConditionAttribute::ExportLimitWatts,
            ) => Some(doe.export_limit_watts),
            (EntityPayload::TariffGeneratedRate(rate), ConditionAttribute::ImportActivePrice) => {
                Some(rate.import_active_price)
            }
            (EntityPayload::TariffGeneratedRate(rate), ConditionAttribute::ExportActivePrice) => {
                Some(rate.export_active_price)
            }
            _ => None,
        }
    }
}

/// Inclusive range filter on one attribute. Absent bounds are unbounded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionData {
    pub attribute: ConditionAttribute,
    pub lower_threshold: Option<f64>,
    pub upper_threshold: Option<f64>,
}

/// A subscription with its conditions, as loaded for one dispatch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionData {
    pub subscription_id: i64,
    pub aggregator_id: i64,
    pub resource_kind: ResourceKind,
    pub scoped_site_id: Option<i64>,
    pub notification_uri: String,
    /// Always at least 1
    pub entity_limit: usize,
    pub conditions: Vec<ConditionData>,
}

impl SubscriptionData {
    /// Path identifying this subscription to its owner
    pub fn href(&self) -> String {
        match self.scoped_site_id {
            Some(site_id) => format!("/edev/{}/sub/{}", site_id, self.subscription_id),
            None => format!("/sub/{}", self.subscription_id),
        }
    }
}
