//! HTTP application wiring (Axum router + shared services).
//!
//! - `services.rs`: store and collaborator wiring
//! - `routes/`: handlers, one file per resource
//! - `dto.rs`: request/response shapes
//! - `errors.rs`: the response envelope and error mapping

use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use assetkeep_auth::Hs256JwtValidator;
use assetkeep_infra::config::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Avatars and item photos travel as base64 text.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    match frontend_url.and_then(|url| HeaderValue::from_str(url).ok()) {
        Some(origin) => base.allow_origin(origin),
        None => base.allow_origin(Any),
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices, config: &AppConfig) -> Router {
    errors::expose_internal_detail(!config.env.is_production());
    router(services, &config.jwt_secret, config.frontend_url.as_deref())
}

/// Router over already-built services. Black-box tests use this directly.
pub fn router(services: AppServices, jwt_secret: &str, frontend_url: Option<&str>) -> Router {
    let auth_state = middleware::AuthState {
        jwt: Arc::new(Hs256JwtValidator::new(jwt_secret)),
        accounts: services.accounts.clone(),
    };
    let services = Arc::new(services);

    let protected = routes::router().route_layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .merge(protected)
        .fallback(routes::system::not_found)
        .layer(Extension(services))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(frontend_url)),
        )
}
