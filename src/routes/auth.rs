/// Authentication Routes
///
/// Registration, login, and refresh-token rotation.

use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{
    generate_access_token, generate_refresh_token, hash_password, hash_token,
    validate_password_strength, verify_password,
};
use crate::cache::{check_rate_limit, SessionCache};
use crate::configuration::{JwtSettings, RateLimitSettings};
use crate::error::AppError;
use crate::store::{CredentialStore, NewUser, Role, User};
use crate::validators::{validate_email, validate_name};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Public view of a user. The password hash is deliberately absent and
/// has no serializable path out of the service.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Access/refresh token pair
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Register/login response: the user plus a token pair
#[derive(Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

/// Mint an access token and a fresh refresh token for `user`, storing
/// the refresh token hash in the session cache.
async fn issue_token_pair(
    user: &User,
    jwt_config: &JwtSettings,
    cache: &dyn SessionCache,
) -> Result<TokenResponse, AppError> {
    let access_token = generate_access_token(user, jwt_config)?;
    let refresh_token = generate_refresh_token();

    cache
        .store_refresh_token(
            &hash_token(&refresh_token),
            user.id,
            Duration::from_secs(jwt_config.refresh_token_expiry.max(0) as u64),
        )
        .await?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: jwt_config.access_token_expiry,
    })
}

/// Uniform 401 for unknown email, wrong password, and inactive account.
/// A distinct message would let a caller enumerate registered accounts.
fn invalid_credentials() -> AppError {
    AppError::Unauthorized("invalid email or password".to_string())
}

/// POST /auth/register
///
/// # Errors
/// - 400: validation failure; all violated fields are listed
/// - 409: email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    store: web::Data<dyn CredentialStore>,
    cache: web::Data<dyn SessionCache>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    // Collect every violated field before failing
    let mut errors = Vec::new();
    let email = validate_email(&form.email).map_err(|e| errors.push(e)).ok();
    let first_name = validate_name(&form.first_name, "first_name")
        .map_err(|e| errors.push(e))
        .ok();
    let last_name = validate_name(&form.last_name, "last_name")
        .map_err(|e| errors.push(e))
        .ok();
    if let Err(e) = validate_password_strength(&form.password) {
        errors.push(e);
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    let (email, first_name, last_name) = (
        email.unwrap_or_default(),
        first_name.unwrap_or_default(),
        last_name.unwrap_or_default(),
    );

    // bcrypt is deliberately slow; keep it off the reactor threads
    let password = form.password.clone();
    let password_hash = web::block(move || hash_password(&password)).await??;

    let user = store
        .create_user(NewUser {
            email,
            password_hash,
            first_name,
            last_name,
            role: Role::User,
        })
        .await?;

    let tokens = issue_token_pair(&user, jwt_config.get_ref(), cache.get_ref()).await?;

    tracing::info!(user_id = %user.id, "user registered");
    metrics::increment_counter!("auth_registrations_total");

    Ok(HttpResponse::Created().json(AuthResponse {
        user: UserResponse::from(&user),
        tokens,
    }))
}

/// POST /auth/login
///
/// Rate limited per client IP before any credential work happens, so
/// throttled callers learn nothing about credential validity.
///
/// # Errors
/// - 400: malformed email
/// - 401: unknown email, wrong password, or inactive account (uniform)
/// - 429: too many attempts within the window
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    store: web::Data<dyn CredentialStore>,
    cache: web::Data<dyn SessionCache>,
    jwt_config: web::Data<JwtSettings>,
    rate_limit: web::Data<RateLimitSettings>,
) -> Result<HttpResponse, AppError> {
    let client_ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    check_rate_limit(
        cache.get_ref(),
        &format!("login:{}", client_ip),
        rate_limit.max_attempts,
        Duration::from_secs(rate_limit.window_seconds),
    )
    .await?;

    let email = validate_email(&form.email)?;

    let user = match store.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            metrics::increment_counter!("auth_login_failures_total");
            return Err(invalid_credentials());
        }
    };

    let password = form.password.clone();
    let stored_hash = user.password_hash.clone();
    let password_valid = web::block(move || verify_password(&password, &stored_hash)).await?;

    if !password_valid || !user.is_active {
        metrics::increment_counter!("auth_login_failures_total");
        return Err(invalid_credentials());
    }

    let tokens = issue_token_pair(&user, jwt_config.get_ref(), cache.get_ref()).await?;

    tracing::info!(user_id = %user.id, "user logged in");
    metrics::increment_counter!("auth_login_successes_total");

    Ok(HttpResponse::Ok().json(AuthResponse {
        user: UserResponse::from(&user),
        tokens,
    }))
}

/// POST /auth/refresh
///
/// Token rotation: the presented token is consumed atomically, so a
/// second call with the same token (replay, or the loser of a
/// concurrent rotation) gets 401.
///
/// # Errors
/// - 401: unknown, expired, or already-consumed refresh token; or the
///   owning account has been deactivated
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    store: web::Data<dyn CredentialStore>,
    cache: web::Data<dyn SessionCache>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let token_hash = hash_token(&form.refresh_token);

    let user_id = cache
        .consume_refresh_token(&token_hash)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid or expired refresh token".to_string()))?;

    let user = store
        .find_by_id(user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("invalid or expired refresh token".to_string()))?;

    let tokens = issue_token_pair(&user, jwt_config.get_ref(), cache.get_ref()).await?;

    tracing::info!(user_id = %user.id, "tokens rotated");

    Ok(HttpResponse::Ok().json(tokens))
}
