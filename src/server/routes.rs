//! Router configuration for the HTTP API.

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers;
use super::AppState;
use crate::error::InvoiceError;

/// Create the router with all routes, CORS and request tracing.
pub fn create_router(state: AppState, cors_origins: &[String]) -> Result<Router, InvoiceError> {
    let cors = create_cors_layer(cors_origins)?;
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/process-invoice", post(handlers::process_invoice))
        .route("/process", post(handlers::process_invoice))
        .route("/process-invoice-ai", post(handlers::process_invoice_ai))
        .layer(body_limit)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state);

    Ok(router)
}

/// `*` allows any origin; anything else is an explicit allow-list.
fn create_cors_layer(origins: &[String]) -> Result<CorsLayer, InvoiceError> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return Ok(cors.allow_origin(Any));
    }

    let mut values = Vec::with_capacity(origins.len());
    for origin in origins {
        let value = origin.parse::<HeaderValue>().map_err(|e| {
            InvoiceError::InvalidConfig(format!("invalid CORS origin '{}': {}", origin, e))
        })?;
        values.push(value);
    }
    Ok(cors.allow_origin(AllowOrigin::list(values)))
}
