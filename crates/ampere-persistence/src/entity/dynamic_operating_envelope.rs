//! Dynamic operating envelope (DER control) entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::archive::TrackedEntity;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dynamic_operating_envelope")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub dynamic_operating_envelope_id: i64,
    /// Site the envelope applies to
    pub site_id: i64,
    pub start_time: DateTimeUtc,
    pub duration_seconds: i64,
    pub import_limit_active_watts: f64,
    pub export_limit_watts: f64,
    pub created_time: DateTimeUtc,
    pub changed_time: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TrackedEntity for Entity {
    fn changed_time_column() -> Column {
        Column::ChangedTime
    }
}
