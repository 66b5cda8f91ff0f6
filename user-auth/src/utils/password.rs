use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

pub const PASSWORD_POLICY_DESCRIPTION: &str =
    "Password must be 8 to 128 characters long and contain at least one letter and one digit";

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the password against the account password policy.
    pub fn meets_policy(&self) -> bool {
        let len = self.0.chars().count();
        (8..=128).contains(&len)
            && self.0.chars().any(|c| c.is_alphabetic())
            && self.0.chars().any(|c| c.is_ascii_digit())
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash a password using Argon2id with a fresh random salt.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Verify a password against a stored hash.
///
/// A malformed stored hash is reported the same way as a mismatch.
pub fn verify_password(password: &Password, password_hash: &PasswordHashString) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(password_hash.as_str()) else {
        tracing::warn!("Stored password hash has an invalid format");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let password = Password::new("mySecurePassword123");
        let hash = hash_password(&password).expect("Failed to hash password");

        assert!(hash.as_str().starts_with("$argon2"));
        assert!(verify_password(&password, &hash));
    }

    #[test]
    fn test_verify_password_incorrect() {
        let hash = hash_password(&Password::new("mySecurePassword123")).unwrap();
        assert!(!verify_password(&Password::new("wrongPassword1"), &hash));
    }

    #[test]
    fn test_verify_password_malformed_hash() {
        let hash = PasswordHashString::new("not-a-hash".to_string());
        assert!(!verify_password(&Password::new("mySecurePassword123"), &hash));
    }

    #[test]
    fn test_salted_hashes_differ() {
        let password = Password::new("mySecurePassword123");
        let hash1 = hash_password(&password).unwrap();
        let hash2 = hash_password(&password).unwrap();
        assert_ne!(hash1.as_str(), hash2.as_str());
    }

    #[test]
    fn test_password_policy() {
        assert!(Password::new("abcdefg1").meets_policy());
        assert!(!Password::new("abc1").meets_policy());
        assert!(!Password::new("abcdefgh").meets_policy());
        assert!(!Password::new("12345678").meets_policy());
        assert!(!Password::new(format!("a1{}", "x".repeat(127))).meets_policy());
    }

    #[test]
    fn test_debug_hides_password() {
        assert_eq!(format!("{:?}", Password::new("secret123")), "Password(***)");
    }
}
