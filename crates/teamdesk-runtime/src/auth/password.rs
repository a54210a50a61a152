use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use teamdesk_core::error::{Result, TeamdeskError};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hashes a password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(TeamdeskError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TeamdeskError::Internal(format!("Failed to hash password: {e}")))
}

/// Checks a password against a stored Argon2 hash.
///
/// A malformed hash is treated as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        tracing::warn!("Stored password hash is not a valid PHC string");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("test_password_123").unwrap();

        assert!(verify_password("test_password_123", &hash));
        assert!(!verify_password("wrong_password", &hash));
    }

    #[test]
    fn test_hash_generates_different_salts() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password("same_password", &hash1));
        assert!(verify_password("same_password", &hash2));
    }

    #[test]
    fn test_short_password_rejected() {
        let err = hash_password("abc").unwrap_err();
        assert!(matches!(err, TeamdeskError::Validation(_)));
    }

    #[test]
    fn test_verify_invalid_hash_format() {
        assert!(!verify_password("password", "not_a_valid_hash"));
    }
}
