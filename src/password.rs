/// Password hashing with Argon2id
///
/// Hashes carry their own salt and parameters in the PHC string, so old
/// hashes keep verifying after a parameter upgrade.
use crate::error::{MarketError, MarketResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a plaintext password with a fresh random salt
pub fn hash(plaintext: &str) -> MarketResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| MarketError::Internal(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored hash
///
/// Returns false for malformed hashes instead of erroring; timing
/// resistance is delegated to the Argon2 primitive.
pub fn verify(plaintext: &str, hash_string: &str) -> bool {
    match PasswordHash::new(hash_string) {
        Ok(parsed) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hashed = hash("password123").unwrap();
        assert!(verify("password123", &hashed));
        assert!(!verify("password124", &hashed));
    }

    #[test]
    fn test_salts_are_unique() {
        let a = hash("password123").unwrap();
        let b = hash("password123").unwrap();
        assert_ne!(a, b);
        assert!(verify("password123", &a));
        assert!(verify("password123", &b));
    }

    #[test]
    fn test_malformed_hash_returns_false() {
        assert!(!verify("password123", "not-a-phc-string"));
        assert!(!verify("password123", ""));
    }
}
