//! Archived site snapshots

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::archive::{ArchiveEntity, ArchiveRecord};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "archive_site")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub archive_id: i64,
    pub site_id: i64,
    pub aggregator_id: i64,
    pub nmi: Option<String>,
    pub lfdi: String,
    pub sfdi: i64,
    pub device_category: i32,
    pub timezone_id: String,
    pub created_time: DateTimeUtc,
    pub changed_time: DateTimeUtc,
    /// When this snapshot was taken
    pub archive_time: DateTimeUtc,
    /// Set when the snapshot records a deletion
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
        self.site_id
    }

    fn archive_time(&self) -> DateTimeUtc {
        self.archive_time
    }

    fn deleted_time(&self) -> Option<DateTimeUtc> {
        self.deleted_time
    }
}
