//! HTTP API: router, shared state, and security middleware.

pub mod handlers;
pub mod middleware;

use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::db::Database;
use crate::integrations::Integrations;
use middleware::SecurityConfig;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub integrations: Integrations,
}

/// Build the application router with security settings from the
/// environment.
pub fn create_router(state: AppState) -> Router {
    create_router_with_security(state, SecurityConfig::from_env())
}

/// Build the application router with explicit security settings (tests use
/// this to toggle auth without touching the environment).
pub fn create_router_with_security(state: AppState, security: SecurityConfig) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/users", post(handlers::create_user))
        .route(
            "/users/{user_id}",
            get(handlers::get_user).patch(handlers::update_user),
        )
        .route(
            "/users/{user_id}/notes",
            get(handlers::list_notes).post(handlers::create_note),
        )
        .route(
            "/users/{user_id}/notes/{note_id}",
            get(handlers::get_note)
                .patch(handlers::update_note)
                .delete(handlers::delete_note),
        )
        .route(
            "/users/{user_id}/notes/{note_id}/subtasks/{subtask_id}",
            put(handlers::set_subtask),
        )
        .route(
            "/users/{user_id}/notes/{note_id}/finish",
            post(handlers::finish_note),
        )
        .route(
            "/users/{user_id}/notes/{note_id}/due-date",
            put(handlers::set_due_date).delete(handlers::clear_due_date),
        )
        .route(
            "/users/{user_id}/voice-notes",
            post(handlers::create_voice_note),
        )
        .route(
            "/users/{user_id}/notes/{note_id}/schedule",
            post(handlers::schedule_note),
        )
        .route(
            "/users/{user_id}/notes/{note_id}/notion-sync",
            post(handlers::notion_sync),
        )
        .with_state(state);

    let mut router = Router::new().nest("/api/v1", api);

    if security.api_key.is_some() {
        router = router.layer(axum::middleware::from_fn_with_state(
            security.clone(),
            middleware::auth_middleware,
        ));
    }

    if let Some(limiter) = security.rate_limiter.clone() {
        router = router.layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(cors_layer(&security))
        .layer(TraceLayer::new_for_http())
}

/// Allow-list CORS when origins are configured, permissive otherwise
/// (local single-user mode).
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    match &security.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}
