//! Subscription condition entity
//!
//! Inclusive range filter on one entity attribute.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscription_condition")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub subscription_condition_id: i64,
    pub subscription_id: i64,
    /// `ConditionAttribute` storage code
    pub attribute: i32,
    pub lower_threshold: Option<f64>,
    pub upper_threshold: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
