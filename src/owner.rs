//! Ownership keys: scope for a client's persisted board rows.
//!
//! ARCHITECTURE
//! ============
//! Every remote row is addressed by `(owner_key, board_index)`. The key is
//! either an anonymous per-browser id minted by `POST /api/session` (the
//! browser stores it and sends it back on every visit) or a shared room id
//! taken from a room link. The controller does not care which.

use std::fmt::{self, Write};

use rand::Rng;

const MAX_OWNER_KEY_LEN: usize = 128;
const ANONYMOUS_PREFIX: &str = "anon-";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OwnerKeyError {
    #[error("owner key must not be empty")]
    Empty,
    #[error("owner key longer than {MAX_OWNER_KEY_LEN} characters")]
    TooLong,
    #[error("owner key contains invalid character {0:?}")]
    InvalidChar(char),
}

impl crate::frame::ErrorCode for OwnerKeyError {
    fn error_code(&self) -> &'static str {
        "E_INVALID_OWNER"
    }
}

/// Validated ownership key. Immutable once a controller is built around it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerKey(String);

impl OwnerKey {
    /// Parse a client-supplied room or session id.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, too long, or contains anything
    /// other than ASCII alphanumerics, `-` and `_`.
    pub fn parse(raw: &str) -> Result<Self, OwnerKeyError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(OwnerKeyError::Empty);
        }
        if raw.len() > MAX_OWNER_KEY_LEN {
            return Err(OwnerKeyError::TooLong);
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(OwnerKeyError::InvalidChar(bad));
        }
        Ok(Self(raw.to_owned()))
    }

    /// Mint a fresh anonymous key from 16 random bytes.
    #[must_use]
    pub fn anonymous() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        let mut key = String::with_capacity(ANONYMOUS_PREFIX.len() + bytes.len() * 2);
        key.push_str(ANONYMOUS_PREFIX);
        for b in bytes {
            let _ = write!(key, "{b:02x}");
        }
        Self(key)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.0.starts_with(ANONYMOUS_PREFIX)
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_room_ids() {
        let key = OwnerKey::parse("  team-retro_2024 ").unwrap();
        assert_eq!(key.as_str(), "team-retro_2024");
        assert!(!key.is_anonymous());
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(OwnerKey::parse("   "), Err(OwnerKeyError::Empty));
        assert_eq!(OwnerKey::parse("a/b"), Err(OwnerKeyError::InvalidChar('/')));
        assert_eq!(OwnerKey::parse(&"x".repeat(129)), Err(OwnerKeyError::TooLong));
    }

    #[test]
    fn anonymous_keys_are_unique_and_parseable() {
        let a = OwnerKey::anonymous();
        let b = OwnerKey::anonymous();
        assert_ne!(a, b);
        assert!(a.is_anonymous());
        assert_eq!(a.as_str().len(), ANONYMOUS_PREFIX.len() + 32);
        assert_eq!(OwnerKey::parse(a.as_str()).unwrap(), a);
    }
}
