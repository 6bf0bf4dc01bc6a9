//! Archived site reading snapshots

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::archive::{ArchiveEntity, ArchiveRecord};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "archive_site_reading")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub archive_id: i64,
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
        self.site_reading_id
    }

    fn archive_time(&self) -> DateTimeUtc {
        self.archive_time
    }

    fn deleted_time(&self) -> Option<DateTimeUtc> {
        self.deleted_time
    }
}
