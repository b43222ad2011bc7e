/// Profile Routes
///
/// Authenticated endpoints for reading and mutating the caller's own
/// account. Claims arrive via the JWT middleware.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::{hash_password, validate_password_strength, verify_password, Claims};
use crate::cache::SessionCache;
use crate::error::AppError;
use crate::routes::auth::UserResponse;
use crate::store::{CredentialStore, User};
use crate::validators::validate_name;

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Load the authenticated user. A valid token for a since-deactivated
/// account gets 403; identity is already proven here, so the generic
/// login message would protect nothing.
async fn load_active_user(
    claims: &Claims,
    store: &dyn CredentialStore,
) -> Result<User, AppError> {
    let user_id = claims.user_id()?;
    let user = store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    if !user.is_active {
        return Err(AppError::Forbidden("account is inactive".to_string()));
    }
    Ok(user)
}

/// GET /api/profile
pub async fn get_profile(
    claims: web::ReqData<Claims>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let user = load_active_user(&claims, store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// PUT /api/profile
///
/// # Errors
/// - 400: invalid name fields (all violations listed)
pub async fn update_profile(
    claims: web::ReqData<Claims>,
    form: web::Json<UpdateProfileRequest>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let user = load_active_user(&claims, store.get_ref()).await?;

    let mut errors = Vec::new();
    let first_name = validate_name(&form.first_name, "first_name")
        .map_err(|e| errors.push(e))
        .ok();
    let last_name = validate_name(&form.last_name, "last_name")
        .map_err(|e| errors.push(e))
        .ok();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let updated = store
        .update_profile(
            user.id,
            &first_name.unwrap_or_default(),
            &last_name.unwrap_or_default(),
        )
        .await?;

    tracing::info!(user_id = %updated.id, "profile updated");

    Ok(HttpResponse::Ok().json(UserResponse::from(&updated)))
}

/// PUT /api/password
///
/// Requires the current password. On success every outstanding refresh
/// token for the user is revoked; already-issued access tokens stay
/// valid until they expire (stateless by policy).
///
/// # Errors
/// - 400: new password fails the strength policy
/// - 401: current password is wrong
pub async fn change_password(
    claims: web::ReqData<Claims>,
    form: web::Json<ChangePasswordRequest>,
    store: web::Data<dyn CredentialStore>,
    cache: web::Data<dyn SessionCache>,
) -> Result<HttpResponse, AppError> {
    let user = load_active_user(&claims, store.get_ref()).await?;

    let current = form.current_password.clone();
    let stored_hash = user.password_hash.clone();
    let current_valid = web::block(move || verify_password(&current, &stored_hash)).await?;
    if !current_valid {
        return Err(AppError::Unauthorized("invalid credentials".to_string()));
    }

    validate_password_strength(&form.new_password)?;

    let new_password = form.new_password.clone();
    let new_hash = web::block(move || hash_password(&new_password)).await??;

    store.update_password_hash(user.id, &new_hash).await?;
    cache.revoke_user_tokens(user.id).await?;

    tracing::info!(user_id = %user.id, "password changed, refresh tokens revoked");

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "password updated" })))
}
