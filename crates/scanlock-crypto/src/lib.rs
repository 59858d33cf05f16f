//! Cryptographic building blocks for Scanlock licensing.
//!
//! Three independent concerns live here:
//! - license key generation (one-way derived from OS randomness),
//! - device fingerprinting (salted PBKDF2, deliberately slow),
//! - integrity hashing (main/backup SHA-512 pair with constant-time
//!   comparison).

pub mod fingerprint;
pub mod integrity;
pub mod keygen;

pub use fingerprint::{derive_fingerprint, generate_salt, FINGERPRINT_BYTES, PBKDF2_ITERATIONS};
pub use integrity::{compute_hashes, generate_verification_token, verify_integrity};
pub use keygen::generate_license_key;
