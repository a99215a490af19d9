use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::AuthError;

const SALT_LENGTH: usize = 16;
const RESET_TOKEN_LENGTH: usize = 32;

/// Argon2id hash in PHC string format
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; SALT_LENGTH];
    rand::rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| AuthError::Hashing(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// False for a wrong password or an unparseable hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Random reset token: `(plain, sha256)`. Only the digest is stored; the
/// plain token is mailed to the user.
pub fn generate_reset_token() -> (String, String) {
    let mut bytes = [0u8; RESET_TOKEN_LENGTH];
    rand::rng().fill_bytes(&mut bytes);
    let plain = hex::encode(bytes);
    let digest = hash_reset_token(&plain);
    (plain, digest)
}

pub fn hash_reset_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_and_are_salted() {
        let a = hash_password("pass1234").unwrap();
        let b = hash_password("pass1234").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
        assert!(verify_password("pass1234", &a));
        assert!(!verify_password("pass12345", &a));
        assert!(!verify_password("pass1234", "not a hash"));
    }

    #[test]
    fn reset_tokens_store_only_the_digest() {
        let (plain, digest) = generate_reset_token();
        assert_eq!(plain.len(), 64);
        assert_ne!(plain, digest);
        assert_eq!(hash_reset_token(&plain), digest);
    }
}
