//! Room password hashing.
//!
//! Rooms can carry an optional password set at creation. Only the sha256 hex
//! digest is stored; verification uses constant-time comparison.

use sha2::{Digest, Sha256};

/// Hash a room password for storage.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a supplied password against a stored hash.
///
/// `stored: None` means the room has no password; any (or no) supplied value
/// is accepted.
pub fn verify_password(stored: Option<&str>, supplied: Option<&str>) -> bool {
    match stored {
        None => true,
        Some(hash) => match supplied {
            Some(pw) => constant_time_eq(hash.as_bytes(), hash_password(pw).as_bytes()),
            None => false,
        },
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
