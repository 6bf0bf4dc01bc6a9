//! Subscription entity
//!
//! Registered by an aggregator to receive notifications for one resource kind.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "subscription")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub subscription_id: i64,
    pub aggregator_id: i64,
    pub changed_time: DateTimeUtc,
    /// `ResourceKind` storage code
    pub resource_type: i32,
    /// When set, only entities of this site are selected
    pub scoped_site_id: Option<i64>,
    #[sea_orm(column_type = "Text")]
    pub notification_uri: String,
    /// Maximum entities per notification payload
    pub entity_limit: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
