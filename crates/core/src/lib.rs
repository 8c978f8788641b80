//! Core shared types and traits for the achievement overlay
//! 
//! This crate contains:
//! - Data models produced by the provider and held by the reconciliation engine
//! - Push-event and control-surface message types
//! - Error types
//! - The `Provider` trait (with `async` feature)

pub mod models;
pub mod messages;
pub mod error;

#[cfg(feature = "async")]
pub mod provider;

pub use models::*;
pub use messages::*;
pub use error::*;

#[cfg(feature = "async")]
pub use provider::*;
