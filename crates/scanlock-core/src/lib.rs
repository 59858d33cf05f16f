//! Scanlock Core
//!
//! Core domain types, traits, and error handling for the Scanlock license
//! service. This crate has minimal dependencies and defines the shared
//! vocabulary used across all other crates.

pub mod audit;
pub mod error;
pub mod ids;
pub mod license;
pub mod ports;
pub mod tier;

pub use error::{Error, Result};
pub use ids::*;
