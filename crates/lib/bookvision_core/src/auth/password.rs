//! Password hashing via bcrypt.
//!
//! Only credential store implementations call into this module.

use std::sync::LazyLock;

use super::AuthError;

/// bcrypt cost factor.
pub const BCRYPT_COST: u32 = 10;

/// Hash verified against when the username does not exist, so that unknown
/// and known usernames cost the same.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| bcrypt::hash("bookvision-dummy-password", BCRYPT_COST).ok());

/// Hash a password with bcrypt. Each call draws a fresh random salt.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash).map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}

/// Burn one bcrypt verification for a username that does not exist.
pub fn verify_dummy(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = bcrypt::verify(password, hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("pwd123456", TEST_COST).unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_password("pwd123456", &hash).unwrap());
        assert!(!verify_password("pwd1234567", &hash).unwrap());
    }

    #[test]
    fn same_password_different_salts() {
        let a = hash_password("secret", TEST_COST).unwrap();
        let b = hash_password("secret", TEST_COST).unwrap();
        assert_ne!(a, b);
        assert!(verify_password("secret", &a).unwrap());
        assert!(verify_password("secret", &b).unwrap());
    }

    #[test]
    fn malformed_hash_is_internal_error() {
        let result = verify_password("secret", "not-a-bcrypt-hash");
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }
}
