//! License lifecycle orchestration for Scanlock.
//!
//! [`LicenseService`] composes the key generator, device fingerprinter,
//! integrity hasher, license store, and verification cache into the public
//! create/verify/revoke operations.

pub mod audit;
pub mod service;

pub use audit::TracingAuditSink;
pub use service::{
    CreateLicenseRequest, CreatedLicense, LicenseService, RequestContext, VerifiedLicense,
};
