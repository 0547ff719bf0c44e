//! Cache key validation and normalization
//!
//! Keys are restricted to `[A-Za-z0-9_-]` with a bounded length so every
//! backend (in-memory map, remote key-value store) can accept them
//! verbatim. Both functions are pure and stateless.

use crate::domain::error::{Error, Result};

/// Maximum accepted key length in bytes
pub const MAX_KEY_LENGTH: usize = 128;

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Validate a cache key against the character and length policy.
///
/// Rejects empty or whitespace-only keys, keys longer than
/// [`MAX_KEY_LENGTH`], and keys containing characters outside
/// `[A-Za-z0-9_-]`.
pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::validation("cache key must not be empty"));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(Error::validation(format!(
            "cache key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    if let Some(offending) = key.chars().find(|c| !is_allowed_char(*c)) {
        return Err(Error::validation(format!(
            "cache key contains disallowed character '{}'",
            offending
        )));
    }
    Ok(())
}

/// Normalize an arbitrary string into an acceptable cache key.
///
/// Trims surrounding whitespace, lower-cases ASCII letters (the
/// normalization casing policy), replaces every disallowed character with
/// `-`, and truncates to [`MAX_KEY_LENGTH`] bytes.
pub fn normalize_key(key: &str) -> String {
    let mut normalized: String = key
        .trim()
        .chars()
        .map(|c| {
            if is_allowed_char(c) {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    normalized.truncate(MAX_KEY_LENGTH);
    normalized
}
