//! Verification-result cache for Scanlock.
//!
//! The cache is never authoritative: it holds recent positive and negative
//! verification outcomes with bounded TTLs so a hot license key does not
//! hit the store on every request. Negative entries mean a revoke is
//! visible at worst one TTL late unless actively invalidated, a deliberate
//! consistency/latency trade-off.

mod memory;

pub use memory::MemoryVerificationCache;

use std::time::Duration;

/// TTL for the write-through entry created at issuance.
pub const CREATE_TTL: Duration = Duration::from_secs(24 * 3600);

/// TTL for positive and negative verification outcomes.
pub const VERIFY_TTL: Duration = Duration::from_secs(3600);
