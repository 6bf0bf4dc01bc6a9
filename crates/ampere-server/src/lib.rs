//! Ampere server library
//!
//! Wires configuration, logging, storage, the notification worker pool and
//! the internal HTTP surface together. `main.rs` only sequences start-up and
//! shutdown.

pub mod api;
pub mod config;
pub mod startup;
pub mod token;

pub use api::AppState;
pub use config::{Cli, Configuration};
