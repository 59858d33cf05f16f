//! Test fakes and fixtures for Scanlock integration tests.

pub mod fixtures;
pub mod helpers;
