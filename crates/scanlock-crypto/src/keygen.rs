//! License key generation.
//!
//! Keys concatenate a base-36 timestamp, a random hex component, and the
//! tail of a SHA-512 digest over further random bytes, uppercased. The
//! timestamp keeps index locality reasonable and helps debugging; hashing
//! the raw randomness means the key never exposes generator state.

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use scanlock_core::{Error, Result};
use sha2::{Digest, Sha512};

const RANDOM_COMPONENT_BYTES: usize = 8;
const HASH_ENTROPY_BYTES: usize = 32;
const HASH_TAIL_CHARS: usize = 12;

/// Generate a new license key.
///
/// Fails with [`Error::KeyGeneration`] only if the OS random source is
/// unavailable, in which case creation must be aborted.
pub fn generate_license_key() -> Result<String> {
    let mut random = [0u8; RANDOM_COMPONENT_BYTES];
    OsRng
        .try_fill_bytes(&mut random)
        .map_err(|e| Error::KeyGeneration(e.to_string()))?;

    let mut entropy = [0u8; HASH_ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(|e| Error::KeyGeneration(e.to_string()))?;

    let timestamp = to_base36(Utc::now().timestamp_millis());
    let digest = hex::encode(Sha512::digest(entropy));
    let tail = &digest[digest.len() - HASH_TAIL_CHARS..];

    Ok(format!("{}-{}-{}", timestamp, hex::encode(random), tail).to_uppercase())
}

fn to_base36(mut value: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value <= 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_shape() {
        let key = generate_license_key().unwrap();
        assert_eq!(key, key.to_uppercase());
        let parts: Vec<&str> = key.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), RANDOM_COMPONENT_BYTES * 2);
        assert_eq!(parts[2].len(), HASH_TAIL_CHARS);
    }

    #[test]
    fn test_keys_do_not_collide() {
        let keys: HashSet<String> = (0..1000)
            .map(|_| generate_license_key().unwrap())
            .collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
