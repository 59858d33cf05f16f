//! Device fingerprint derivation.
//!
//! The fingerprint is a deterministic function of the device attributes and
//! a per-license salt, derived with PBKDF2-HMAC-SHA512 at an iteration
//! count that makes brute-force forgery expensive even with a known salt.
//!
//! The salt is generated exactly once at issuance, persisted on the
//! license, and reused for every later recomputation. Regenerating it per
//! call would make stored-fingerprint comparison impossible to pass.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use scanlock_core::license::DeviceAttributes;
use scanlock_core::{Error, Result};
use sha2::Sha512;

/// PBKDF2 iteration count. Lowering this weakens forgery resistance.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derived fingerprint length in bytes (hex-encoded to twice this).
pub const FINGERPRINT_BYTES: usize = 64;

const SALT_BYTES: usize = 16;

/// Generate a fresh hex-encoded fingerprint salt.
pub fn generate_salt() -> Result<String> {
    let mut salt = [0u8; SALT_BYTES];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| Error::KeyGeneration(e.to_string()))?;
    Ok(hex::encode(salt))
}

/// Derive the fingerprint for `attributes` under `salt_hex`.
///
/// Only the required attributes participate; the open `extra` map does not,
/// so optional attributes can evolve without re-binding devices.
pub fn derive_fingerprint(attributes: &DeviceAttributes, salt_hex: &str) -> String {
    let data = format!(
        "{}{}{}{}",
        attributes.device_id, attributes.platform, attributes.model, attributes.version
    );
    let mut output = [0u8; FINGERPRINT_BYTES];
    pbkdf2_hmac::<Sha512>(
        data.as_bytes(),
        salt_hex.as_bytes(),
        PBKDF2_ITERATIONS,
        &mut output,
    );
    hex::encode(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn attrs() -> DeviceAttributes {
        DeviceAttributes {
            device_id: "device-123".to_string(),
            platform: "linux".to_string(),
            model: "thinkpad".to_string(),
            version: "6.1".to_string(),
            extra: HashMap::new(),
        }
    }

    #[test]
    fn test_deterministic_under_same_salt() {
        let salt = generate_salt().unwrap();
        assert_eq!(derive_fingerprint(&attrs(), &salt), derive_fingerprint(&attrs(), &salt));
    }

    #[test]
    fn test_differs_under_fresh_salt() {
        let a = derive_fingerprint(&attrs(), &generate_salt().unwrap());
        let b = derive_fingerprint(&attrs(), &generate_salt().unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn test_differs_for_other_device() {
        let salt = generate_salt().unwrap();
        let mut other = attrs();
        other.device_id = "device-456".to_string();
        assert_ne!(derive_fingerprint(&attrs(), &salt), derive_fingerprint(&other, &salt));
    }

    #[test]
    fn test_extra_attributes_do_not_affect_fingerprint() {
        let salt = generate_salt().unwrap();
        let mut with_extra = attrs();
        with_extra
            .extra
            .insert("locale".to_string(), "en_US".to_string());
        assert_eq!(
            derive_fingerprint(&attrs(), &salt),
            derive_fingerprint(&with_extra, &salt)
        );
    }

    #[test]
    fn test_output_length() {
        let salt = generate_salt().unwrap();
        assert_eq!(derive_fingerprint(&attrs(), &salt).len(), FINGERPRINT_BYTES * 2);
    }
}
