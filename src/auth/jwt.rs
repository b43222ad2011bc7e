/// JWT Token Generation and Validation

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::AppError;
use crate::store::User;

/// Generate a new access token for a user.
///
/// Embeds the user ID, email, and role; signed HS256 with the server
/// secret and expiring after `access_token_expiry` seconds.
pub fn generate_access_token(user: &User, config: &JwtSettings) -> Result<String, AppError> {
    let claims = Claims::new(
        user.id,
        user.email.clone(),
        user.role,
        config.access_token_expiry,
        config.issuer.clone(),
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token generation failed: {}", e)))
}

/// Validate an access token and extract its claims.
///
/// Fails with `Unauthorized` if the signature is invalid, the token is
/// expired or malformed, or the issuer does not match. A token is never
/// partially trusted.
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT validation error: {}", e);
        AppError::Unauthorized("invalid or expired token".to_string())
    })
}
