//! Request logging, CORS and host extraction

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::CorsConfig;

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = std::time::Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let host = request_host(request.headers()).unwrap_or("unknown").to_string();
    let client_ip = get_client_ip(request.headers());

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        host = %host,
        status = %status,
        duration_ms = duration.as_millis(),
        client_ip = %client_ip,
        "Request processed"
    );

    response
}

/// CORS layer factory
pub fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut cors = CorsLayer::new().max_age(std::time::Duration::from_secs(config.max_age_seconds));

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        cors = cors.allow_origin(tower_http::cors::Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    let methods: Result<Vec<_>, _> = config
        .allowed_methods
        .iter()
        .map(|method| method.parse())
        .collect();
    if let Ok(methods) = methods {
        cors = cors.allow_methods(methods);
    }

    let headers: Result<Vec<_>, _> = config
        .allowed_headers
        .iter()
        .map(|header| header.parse())
        .collect();
    if let Ok(headers) = headers {
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Hostname the request was addressed to
///
/// Prefers `X-Forwarded-Host` (set by the edge proxy) over `Host`.
pub fn request_host(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("X-Forwarded-Host")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| headers.get(header::HOST).and_then(|value| value.to_str().ok()))
        .map(str::trim)
        .filter(|host| !host.is_empty())
}

/// Extract client IP from request headers
fn get_client_ip(headers: &HeaderMap) -> String {
    if let Some(first_ip) = headers
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
    {
        return first_ip.trim().to_string();
    }

    if let Some(real_ip) = headers.get("X-Real-IP").and_then(|value| value.to_str().ok()) {
        return real_ip.to_string();
    }

    "unknown".to_string()
}
