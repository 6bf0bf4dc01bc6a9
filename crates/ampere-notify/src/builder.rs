//! Notification builder and wire mapper
//!
//! Turns one page of entities for one subscription into a transport-ready
//! JSON payload. Every wire type is a struct with a fixed field order, so
//! the same inputs always serialize to the same bytes.

use ampere_common::{AmpereError, NOTIFICATION_CONTENT_TYPE, ResourceKind};
use ampere_persistence::{
    ChangedEntity, DynamicOperatingEnvelopeData, EntityPayload, ReadingData, SiteData,
    SubscriptionData, TariffGeneratedRateData,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A payload ready for delivery
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub destination: String,
    pub subscription_href: String,
    pub content_type: &'static str,
    pub payload: Bytes,
    pub entity_count: usize,
}

/// Path segment naming each resource kind below a device
fn kind_path(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Site => "edev",
        ResourceKind::DynamicOperatingEnvelope => "derp/doe/derc",
        ResourceKind::TariffGeneratedRate => "tp/rc",
        ResourceKind::Reading => "upt/mr/r",
    }
}

/// The resource list a subscription watches
pub fn subscribed_resource(subscription: &SubscriptionData) -> String {
    match (subscription.resource_kind, subscription.scoped_site_id) {
        (ResourceKind::Site, Some(site_id)) => format!("/edev/{}", site_id),
        (kind, Some(site_id)) => format!("/edev/{}/{}", site_id, kind_path(kind)),
        (kind, None) => format!("/{}", kind_path(kind)),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationEnvelope<'a> {
    subscription_href: &'a str,
    subscribed_resource: String,
    batch_time: DateTime<Utc>,
    status: u8,
    resource: ResourceList<'a>,
}

#[derive(Serialize)]
struct ResourceList<'a> {
    kind: &'static str,
    all: usize,
    results: usize,
    items: Vec<WireItem<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireData<'a> {
    Site(&'a SiteData),
    DynamicOperatingEnvelope(&'a DynamicOperatingEnvelopeData),
    TariffGeneratedRate(&'a TariffGeneratedRateData),
    Reading(&'a ReadingData),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireItem<'a> {
    #[serde(flatten)]
    data: WireData<'a>,
    changed_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted_time: Option<DateTime<Utc>>,
}

impl<'a> From<&'a ChangedEntity> for WireItem<'a> {
    fn from(entity: &'a ChangedEntity) -> Self {
        let data = match &entity.payload {
            EntityPayload::Site(d) => WireData::Site(d),
            EntityPayload::DynamicOperatingEnvelope(d) => WireData::DynamicOperatingEnvelope(d),
            EntityPayload::TariffGeneratedRate(d) => WireData::TariffGeneratedRate(d),
            EntityPayload::Reading(d) => WireData::Reading(d),
        };
        WireItem {
            data,
            changed_time: entity.changed_time,
            deleted_time: entity.deleted_time,
        }
    }
}

/// Serialize `entities` for `kind`
pub fn serialize(
    kind: ResourceKind,
    subscription_href: &str,
    subscribed_resource: String,
    batch_time: DateTime<Utc>,
    entities: &[ChangedEntity],
) -> Result<Bytes, AmpereError> {
    if let Some(stray) = entities.iter().find(|e| e.resource_kind() != kind) {
        return Err(AmpereError::Invariant(format!(
            "entity {} of kind {} in a {} notification",
            stray.primary_key,
            stray.resource_kind(),
            kind
        )));
    }

    let envelope = NotificationEnvelope {
        subscription_href,
        subscribed_resource,
        batch_time,
        status: 0,
        resource: ResourceList {
            kind: kind.as_str(),
            all: entities.len(),
            results: entities.len(),
            items: entities.iter().map(WireItem::from).collect(),
        },
    };

    serde_json::to_vec(&envelope)
        .map(Bytes::from)
        .map_err(|e| AmpereError::Serialization(e.to_string()))
}

/// Build the notification for one page of a subscription's matches
pub fn build(
    subscription: &SubscriptionData,
    batch_time: DateTime<Utc>,
    entities: &[ChangedEntity],
) -> Result<Notification, AmpereError> {
    let subscription_href = subscription.href();
    let payload = serialize(
        subscription.resource_kind,
        &subscription_href,
        subscribed_resource(subscription),
        batch_time,
        entities,
    )?;

    Ok(Notification {
        destination: subscription.notification_uri.clone(),
        subscription_href,
        content_type: NOTIFICATION_CONTENT_TYPE,
        payload,
        entity_count: entities.len(),
    })
}
