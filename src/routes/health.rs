use actix_web::{web, HttpResponse};
use metrics_exporter_prometheus::PrometheusHandle;

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// GET /metrics — Prometheus exposition format.
pub async fn metrics(handle: web::Data<PrometheusHandle>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(handle.render())
}
