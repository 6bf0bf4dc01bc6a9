//! Site reading entity
//!
//! A single metered value for one reading type over one time period.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::archive::TrackedEntity;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "site_reading")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub site_reading_id: i64,
    pub site_reading_type_id: i64,
    pub site_id: i64,
    pub local_id: Option<i32>,
    pub quality_flags: i32,
    pub time_period_start: DateTimeUtc,
    pub time_period_seconds: i64,
    pub value: i64,
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
