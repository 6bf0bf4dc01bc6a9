//! Site entity
//!
//! A metering/DER site owned by exactly one aggregator.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::archive::TrackedEntity;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "site")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub site_id: i64,
    /// Owning aggregator
    pub aggregator_id: i64,
    /// National metering identifier
    pub nmi: Option<String>,
    /// Long form device identifier
    pub lfdi: String,
    /// Short form device identifier
    pub sfdi: i64,
    pub device_category: i32,
    pub timezone_id: String,
    pub created_time: DateTimeUtc,
    /// Last modification time, shared by every row of one write batch
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
