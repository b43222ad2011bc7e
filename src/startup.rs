use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{error::JsonPayloadError, web, App, HttpRequest, HttpServer};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::cache::SessionCache;
use crate::configuration::Settings;
use crate::error::{AppError, ValidationError};
use crate::middleware::{JwtMiddleware, RequestLogging};
use crate::routes::{
    change_password, get_profile, health_check, login, metrics, refresh, register,
    set_user_active, update_profile,
};
use crate::store::CredentialStore;

/// Malformed or missing JSON bodies get the same error shape as every
/// other failure instead of actix's default plaintext 400.
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::warn!(error = %err, "rejected request body");
    AppError::Validation(vec![ValidationError::InvalidFormat(
        "body",
        "malformed or missing JSON body",
    )])
    .into()
}

pub fn run(
    listener: TcpListener,
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn SessionCache>,
    settings: Settings,
    metrics_handle: PrometheusHandle,
) -> Result<Server, std::io::Error> {
    let store = web::Data::from(store);
    let cache = web::Data::from(cache);
    let jwt_settings = settings.jwt;
    let jwt_data = web::Data::new(jwt_settings.clone());
    let rate_limit_data = web::Data::new(settings.rate_limit);
    let metrics_data = web::Data::new(metrics_handle);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogging)
            // Shared state
            .app_data(store.clone())
            .app_data(cache.clone())
            .app_data(jwt_data.clone())
            .app_data(rate_limit_data.clone())
            .app_data(metrics_data.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/metrics", web::get().to(metrics))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            // Protected routes (JWT required; admin routes also check role)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(jwt_settings.clone()))
                    .route("/profile", web::get().to(get_profile))
                    .route("/profile", web::put().to(update_profile))
                    .route("/password", web::put().to(change_password))
                    .route("/admin/users/{id}/active", web::put().to(set_user_active)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
