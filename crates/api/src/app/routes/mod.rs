use axum::Router;

pub mod admin;
pub mod ai;
pub mod auth;
pub mod billing;
pub mod categories;
pub mod dashboard;
pub mod items;
pub mod lending;
pub mod locations;
pub mod profiles;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    let api = Router::new()
        .nest("/auth", auth::router())
        .nest("/profiles", profiles::router())
        .nest("/locations", locations::router())
        .nest("/categories", categories::router())
        .nest("/items", items::router())
        .nest("/lending-logs", lending::router())
        .nest("/dashboard", dashboard::router())
        .nest("/ai", ai::router())
        .nest("/billing", billing::router())
        .nest("/admin", admin::router());

    Router::new().nest("/api", api)
}
