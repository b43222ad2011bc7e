use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use auth_service::cache::RedisSessionCache;
use auth_service::configuration::get_configuration;
use auth_service::startup::run;
use auth_service::store::PgCredentialStore;
use auth_service::telemetry::init_telemetry;
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("starting auth service");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!("failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "configuration error")
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(
            configuration.database.connect_timeout_seconds,
        ))
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("failed to create connection pool: {}", e);
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "database error")
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("failed to run migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "migration error")
    })?;
    tracing::info!("database ready");

    let cache = RedisSessionCache::connect(
        &configuration.cache.url,
        Duration::from_millis(configuration.cache.operation_timeout_ms),
    )
    .await
    .map_err(|e| {
        tracing::error!("failed to connect to session cache: {}", e);
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "cache error")
    })?;
    tracing::info!("session cache ready");

    let metrics_handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        tracing::error!("failed to install metrics recorder: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "metrics error")
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("listening on {}", address);

    let server = run(
        listener,
        Arc::new(PgCredentialStore::new(pool)),
        Arc::new(cache),
        configuration,
        metrics_handle,
    )?;

    server.await
}
