//! Ampere Persistence - Database entities and change tracking
//!
//! This crate provides:
//! - SeaORM entity definitions for tracked tables, their archives and subscriptions
//! - Archive resolution and change batch lookup over any live/archive pair
//! - Persistence trait abstractions consumed by the dispatch pipeline
//! - Domain model types for persistence operations

pub mod archive;
pub mod entity;
pub mod model;
pub mod sql;
pub mod traits;

// Re-export sea-orm for convenience
pub use sea_orm;

pub use archive::{ResolvedRows, locate_change_batch, resolve_with_archive};

// Re-export persistence traits
pub use traits::{ChangePersistence, PersistenceService, SubscriptionPersistence};

// Re-export SQL backend
pub use sql::{ExternalDbPersistService, create_schema};

// Re-export model types
pub use model::{
    ChangedEntity, ConditionData, DynamicOperatingEnvelopeData, EntityPayload, ReadingData,
    SiteData, SubscriptionData, TariffGeneratedRateData,
};
