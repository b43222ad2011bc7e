/// Password Hashing and Verification
///
/// bcrypt hashing plus the strength policy applied at registration and
/// password change. Hashing is CPU-bound by design; route handlers run it
/// under `actix_web::web::block` so the reactor threads stay free.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash a password using bcrypt.
///
/// Rejects empty input; callers are expected to have run
/// `validate_password_strength` beforehand so field errors can be
/// aggregated with the rest of the payload.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password").into());
    }

    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

/// Verify a password against its stored hash.
///
/// Uses bcrypt's constant-time comparison. A malformed hash yields
/// `false` rather than an error, so login failures stay uniform.
pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}

/// Validate password strength requirements:
/// - 8 to 128 characters
/// - at least one digit, one lowercase, one uppercase
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password", MIN_PASSWORD_LENGTH));
    }

    // bcrypt truncates past 72 bytes; cap well below to bound hashing cost
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_LENGTH));
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(ValidationError::InvalidFormat(
            "password",
            "must contain at least one digit, one lowercase letter, and one uppercase letter",
        ));
    }

    Ok(())
}
