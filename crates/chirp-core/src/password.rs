//! Password hashing and password strength rules
//!
//! Hashes are Argon2id PHC strings. The strength rules mirror what the signup
//! form enforces: minimum length, not entirely numeric, not on the built-in
//! common list, and not too similar to the username.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::validation::messages;
use crate::{Error, Result};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Similarity ratio at or above which a password counts as "too similar".
pub const MAX_SIMILARITY: f64 = 0.7;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password12", "password123", "passw0rd", "p@ssw0rd",
    "12345678", "123456789", "1234567890", "87654321", "11111111", "00000000",
    "qwertyuiop", "qwerty123", "qwerty12", "1q2w3e4r", "1qaz2wsx", "zaq12wsx",
    "asdfghjkl", "iloveyou", "sunshine", "princess", "football", "baseball",
    "basketball", "welcome1", "welcome123", "trustno1", "superman", "starwars",
    "whatever", "michelle", "jennifer", "computer", "corvette", "mercedes",
    "letmein1", "letmein123", "abcd1234", "abc12345", "admin123", "administrator",
    "changeme", "internet", "monkey123", "dragon123", "master123", "shadow123",
    "charlie1", "access14", "freedom1", "nicole123", "secret123", "qazwsxedc",
];

/// Argon2 cost parameters used when hashing new passwords.
///
/// Verification always uses the parameters embedded in the stored hash, so
/// these can change without invalidating existing accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHashing {
    /// Memory cost in KiB
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    /// Number of passes
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Degree of parallelism
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    Params::DEFAULT_M_COST
}
fn default_iterations() -> u32 {
    Params::DEFAULT_T_COST
}
fn default_parallelism() -> u32 {
    Params::DEFAULT_P_COST
}

impl Default for PasswordHashing {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl PasswordHashing {
    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| Error::PasswordHash(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a plain password into a PHC string with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| Error::PasswordHash(e.to_string()))?;
        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::PasswordHash(e.to_string()))?;
        Ok(hash.to_string())
    }
}

/// Verify a password against a stored PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Every strength message that applies to `password`, in a stable order.
pub fn strength_errors(password: &str, username: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if is_too_similar(password, username) {
        problems.push(messages::PASSWORD_TOO_SIMILAR);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(messages::PASSWORD_TOO_SHORT);
    }
    if is_common(password) {
        problems.push(messages::PASSWORD_TOO_COMMON);
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        problems.push(messages::PASSWORD_ENTIRELY_NUMERIC);
    }
    problems
}

pub fn is_common(password: &str) -> bool {
    let candidate = password.trim().to_lowercase();
    COMMON_PASSWORDS.contains(&candidate.as_str())
}

/// True when the password closely resembles the username or any word-separated
/// part of it.
pub fn is_too_similar(password: &str, username: &str) -> bool {
    if username.is_empty() {
        return false;
    }
    let password = password.to_lowercase();
    let username = username.to_lowercase();

    username
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .chain(std::iter::once(username.as_str()))
        .filter(|part| !exceeds_length_ratio(&password, part))
        .any(|part| quick_ratio(&password, part) >= MAX_SIMILARITY)
}

// A part far shorter than the password cannot reach the similarity bound.
fn exceeds_length_ratio(password: &str, part: &str) -> bool {
    let password_len = password.chars().count();
    let part_len = part.chars().count();
    let length_bound = MAX_SIMILARITY / 2.0 * password_len as f64;
    password_len >= 10 * part_len && (part_len as f64) < length_bound
}

/// Upper bound on sequence similarity: twice the size of the character
/// multiset intersection over the combined length.
fn quick_ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    let mut available: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *available.entry(c).or_default() += 1;
    }
    let mut matches = 0usize;
    for c in a.chars() {
        if let Some(count) = available.get_mut(&c)
            && *count > 0
        {
            *count -= 1;
            matches += 1;
        }
    }
    2.0 * matches as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hashing() -> PasswordHashing {
        PasswordHashing {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hashing = fast_hashing();
        let hash = hashing.hash("testpassword").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("testpassword"));
        assert!(verify_password("testpassword", &hash));
        assert!(!verify_password("wrongpassword", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let hashing = fast_hashing();
        let a = hashing.hash("testpassword").unwrap();
        let b = hashing.hash("testpassword").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn test_invalid_params_error() {
        let hashing = PasswordHashing {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(matches!(hashing.hash("x"), Err(Error::PasswordHash(_))));
    }

    #[test]
    fn test_strength_accepts_reasonable_password() {
        assert!(strength_errors("testpassword", "testuser").is_empty());
        assert!(strength_errors("firstpassword", "testuser").is_empty());
    }

    #[test]
    fn test_strength_short() {
        assert_eq!(
            strength_errors("short", "testuser"),
            vec![messages::PASSWORD_TOO_SHORT]
        );
    }

    #[test]
    fn test_strength_numeric() {
        assert_eq!(
            strength_errors("84927274", "testuser"),
            vec![messages::PASSWORD_ENTIRELY_NUMERIC]
        );
    }

    #[test]
    fn test_strength_non_ascii_numerals_are_not_numeric() {
        assert!(strength_errors("ⅫⅫⅫⅫⅫⅫⅫⅫ", "testuser").is_empty());
        assert!(strength_errors("٣٤٥٦٧٨٩٠", "testuser").is_empty());
    }

    #[test]
    fn test_strength_similar_to_username() {
        assert_eq!(
            strength_errors("testuserr", "testuser"),
            vec![messages::PASSWORD_TOO_SIMILAR]
        );
    }

    #[test]
    fn test_strength_common() {
        assert_eq!(
            strength_errors("Password1", "testuser"),
            vec![messages::PASSWORD_TOO_COMMON]
        );
    }

    #[test]
    fn test_strength_reports_all_problems() {
        let problems = strength_errors("1234567", "testuser");
        assert!(problems.contains(&messages::PASSWORD_TOO_SHORT));
        assert!(problems.contains(&messages::PASSWORD_ENTIRELY_NUMERIC));
    }

    #[test]
    fn test_similarity_checks_username_parts() {
        assert!(is_too_similar("jonathan99", "jonathan.smith"));
        assert!(!is_too_similar("completelydifferent", "jonathan.smith"));
    }

    #[test]
    fn test_similarity_ignores_tiny_parts() {
        // "a" is far too short relative to the password to matter
        assert!(!is_too_similar("averyveryverylongpassphrase", "a.b"));
    }

    #[test]
    fn test_quick_ratio() {
        assert_eq!(quick_ratio("abc", "abc"), 1.0);
        assert_eq!(quick_ratio("abc", "xyz"), 0.0);
        assert!((quick_ratio("testuserr", "testuser") - 16.0 / 17.0).abs() < 1e-9);
    }
}
