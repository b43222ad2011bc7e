/// Admin Routes
///
/// Admin-only account management. The JWT middleware authenticates;
/// the role check here authorizes.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Claims;
use crate::error::AppError;
use crate::routes::auth::UserResponse;
use crate::store::CredentialStore;

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// PUT /api/admin/users/{id}/active
///
/// # Errors
/// - 403: caller is not an admin
/// - 404: no such user
pub async fn set_user_active(
    claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
    form: web::Json<SetActiveRequest>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    claims.require_admin()?;

    let user_id = path.into_inner();
    store.set_active(user_id, form.active).await?;

    let user = store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    tracing::info!(
        admin = %claims.sub,
        user_id = %user.id,
        active = form.active,
        "account active flag changed"
    );

    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}
