//! Site-specific tariff rate entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::archive::TrackedEntity;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tariff_generated_rate")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub tariff_generated_rate_id: i64,
    pub tariff_id: i64,
    pub site_id: i64,
    pub start_time: DateTimeUtc,
    pub duration_seconds: i64,
    /// Price per kWh for imported energy
    pub import_active_price: f64,
    /// Price per kWh for exported energy
    pub export_active_price: f64,
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
