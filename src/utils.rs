//! Password hashing and the shared clock helper.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand_core::OsRng;

use crate::errors::{AppError, AppResult};

const MIN_PASSWORD_LENGTH: usize = 8;

fn validate_password(password: &str) -> AppResult<()> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Argon2id with the crate defaults. The produced hash string encodes its
/// own parameters, so defaults can change without invalidating stored
/// hashes.
pub fn hash_password(password: &str) -> AppResult<String> {
    validate_password(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AppError::internal(format!("password hashing failed: {err}")))?;

    Ok(hash.to_string())
}

/// False for a mismatch; an error only when the stored hash itself is
/// malformed.
pub fn verify_password(password: &str, stored: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|err| AppError::internal(format!("stored password hash is malformed: {err}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}
