//! Application state shared across handlers.

use scanlock_service::LicenseService;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub licenses: Arc<LicenseService>,
}

impl AppState {
    pub fn new(licenses: Arc<LicenseService>) -> Self {
        Self { licenses }
    }
}
