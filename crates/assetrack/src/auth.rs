//! Users, roles, password hashing, and session contents.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::Error;

/// PBKDF2 rounds for newly hashed passwords.
pub const PASSWORD_ROUNDS: u32 = 200_000;

/// Identifier of the hash scheme in stored hashes.
const HASH_SCHEME: &str = "pbkdf2-sha256";

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const TOKEN_LEN: usize = 32;

/// What a user is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Administrator: may import, scrap assets and manage users.
    Developer,
    /// Regular plant user.
    User,
}

impl Role {
    /// Whether this role may perform administrative operations.
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Developer)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Developer => write!(f, "developer"),
            Self::User => write!(f, "user"),
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "developer" => Ok(Self::Developer),
            "user" => Ok(Self::User),
            other => Err(Error::validation(format!("unknown role: {other}"))),
        }
    }
}

/// A login account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Database id.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Encoded PBKDF2 hash, see [`hash_password`].
    pub password_hash: String,
    /// Access level.
    pub role: Role,
    /// Disabled users cannot log in.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// Hash a password with the default number of rounds.
#[must_use]
pub fn hash_password(password: &str) -> String {
    hash_password_with_rounds(password, PASSWORD_ROUNDS)
}

/// Hash a password as `pbkdf2-sha256$<rounds>$<salt hex>$<hash hex>`.
#[must_use]
pub fn hash_password_with_rounds(password: &str, rounds: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hash = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut hash);

    format!(
        "{HASH_SCHEME}${rounds}${}${}",
        hex::encode(salt),
        hex::encode(hash)
    )
}

/// Check a password against a stored hash in constant time.
///
/// Malformed stored hashes never verify.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(rounds), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };

    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(rounds) = rounds.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };
    if rounds == 0 || expected.len() != HASH_LEN {
        return false;
    }

    let mut computed = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut computed);
    bool::from(computed.as_slice().ct_eq(expected.as_slice()))
}

/// Accept `user` only if it exists, is active and `password` matches.
///
/// # Errors
///
/// Returns [`Error::InvalidCredentials`] for every kind of failure.
pub fn authenticate(user: Option<User>, password: &str) -> Result<User, Error> {
    match user {
        Some(user) if user.is_active && verify_password(password, &user.password_hash) => {
            Ok(user)
        }
        _ => Err(Error::InvalidCredentials),
    }
}

/// Generate a random session token.
#[must_use]
pub fn new_session_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Severity of a flash message, named after the CSS classes used to show it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    /// Operation completed.
    Success,
    /// Neutral information.
    Info,
    /// Something was skipped or looks odd.
    Warning,
    /// Operation failed.
    Danger,
}

impl FlashLevel {
    /// CSS class suffix.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    /// Severity.
    pub level: FlashLevel,
    /// Text shown to the user.
    pub message: String,
}

impl Flash {
    /// Create a flash message.
    #[must_use]
    pub fn new(level: FlashLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    /// Shorthand for a success message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Success, message)
    }

    /// Shorthand for a warning message.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Warning, message)
    }

    /// Shorthand for an error message.
    #[must_use]
    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Danger, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low round count keeps the tests fast; the scheme is identical.
    const TEST_ROUNDS: u32 = 1_000;

    #[test]
    fn test_role_round_trip_text() {
        assert_eq!(Role::Developer.to_string(), "developer");
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!("Developer".parse::<Role>().unwrap(), Role::Developer);
        assert_eq!(" user ".parse::<Role>().unwrap(), Role::User);
        assert!("purchase".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_is_admin() {
        assert!(Role::Developer.is_admin());
        assert!(!Role::User.is_admin());
    }

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password_with_rounds("s3cret", TEST_ROUNDS);
        assert!(stored.starts_with("pbkdf2-sha256$1000$"));
        assert!(verify_password("s3cret", &stored));
        assert!(!verify_password("S3cret", &stored));
        assert!(!verify_password("", &stored));
    }

    #[test]
    fn test_hash_is_salted() {
        let a = hash_password_with_rounds("same", TEST_ROUNDS);
        let b = hash_password_with_rounds("same", TEST_ROUNDS);
        assert_ne!(a, b);
        assert!(verify_password("same", &a));
        assert!(verify_password("same", &b));
    }

    #[test]
    fn test_verify_malformed_hashes() {
        assert!(!verify_password("pw", ""));
        assert!(!verify_password("pw", "plaintext"));
        assert!(!verify_password("pw", "md5$1000$00$00"));
        assert!(!verify_password("pw", "pbkdf2-sha256$abc$00$00"));
        assert!(!verify_password("pw", "pbkdf2-sha256$1000$zz$00"));
        assert!(!verify_password("pw", "pbkdf2-sha256$0$00$00"));
        assert!(!verify_password("pw", "pbkdf2-sha256$1000$00$00$extra"));
    }

    fn account(active: bool) -> User {
        User {
            id: 1,
            username: "ravi".to_string(),
            password_hash: hash_password_with_rounds("secret", TEST_ROUNDS),
            role: Role::User,
            is_active: active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_authenticate() {
        assert_eq!(authenticate(Some(account(true)), "secret").unwrap().id, 1);
        assert!(matches!(
            authenticate(Some(account(true)), "wrong"),
            Err(Error::InvalidCredentials)
        ));
        assert!(authenticate(Some(account(false)), "secret").is_err());
        assert!(authenticate(None, "secret").is_err());
    }

    #[test]
    fn test_session_tokens_are_unique_hex() {
        let a = new_session_token();
        let b = new_session_token();
        assert_eq!(a.len(), TOKEN_LEN * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_flash_serialization() {
        let flash = Flash::danger("Access denied");
        let json = serde_json::to_string(&flash).unwrap();
        assert!(json.contains("\"danger\""));
        let back: Flash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flash);
    }
}
