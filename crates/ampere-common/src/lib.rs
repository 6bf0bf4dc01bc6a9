//! Ampere Common - Shared types, errors, and utilities
//!
//! This crate provides the foundational types used across all Ampere components:
//! - Error types (`AmpereError`)
//! - The closed resource kind and condition attribute enumerations
//! - A process-wide refreshing cache for values such as credential tokens

pub mod cache;
pub mod error;
pub mod resource;

// Re-exports for convenience
pub use cache::{RefreshingCache, ValueFetcher};
pub use error::AmpereError;
pub use resource::{ConditionAttribute, ResourceKind};

/// Header carrying the subscription href on every outbound notification
pub const SUBSCRIPTION_HREF_HEADER: &str = "x-ampere-subscription-href";

/// Content type of every outbound notification payload
pub const NOTIFICATION_CONTENT_TYPE: &str = "application/json";
