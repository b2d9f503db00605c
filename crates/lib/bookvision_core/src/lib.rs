//! # bookvision_core
//!
//! Auth domain logic for BookVision: tokens, roles and credential stores.

pub mod auth;
pub mod migrate;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
