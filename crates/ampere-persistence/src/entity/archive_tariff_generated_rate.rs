//! Archived tariff rate snapshots

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::archive::{ArchiveEntity, ArchiveRecord};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "archive_tariff_generated_rate")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub archive_id: i64,
    pub tariff_generated_rate_id: i64,
    pub tariff_id: i64,
    pub site_id: i64,
    pub start_time: DateTimeUtc,
    pub duration_seconds: i64,
    pub import_active_price: f64,
    pub export_active_price: f64,
    pub created_time: DateTimeUtc,
    pub changed_time: DateTimeUtc,
    pub archive_time: DateTimeUtc,
    pub deleted_time: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ArchiveEntity for Entity {
    fn deleted_time_column() -> Column {
        Column::DeletedTime
    }
}

impl ArchiveRecord for Model {
    fn archived_key(&self) -> i64 {
        self.tariff_generated_rate_id
    }

    fn archive_time(&self) -> DateTimeUtc {
        self.archive_time
    }

    fn deleted_time(&self) -> Option<DateTimeUtc> {
        self.deleted_time
    }
}
