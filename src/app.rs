use crate::handlers;
use crate::state::{AppState, StoreState};
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/log", post(handlers::log_form))
        .route("/api/dashboard", get(handlers::get_dashboard))
        .route("/api/entries", get(handlers::get_entries))
        .route("/api/status", get(handlers::get_status))
        .route("/api/log", post(handlers::log))
        .route("/api/export", get(handlers::export))
        .route("/api/import", post(handlers::import))
        .route("/api/refresh", post(handlers::refresh))
        .with_state(state)
}

/// Routes of the remote store the dashboard syncs against.
pub fn store_router(state: StoreState) -> Router {
    Router::new()
        .route("/api/data", get(handlers::get_data).put(handlers::put_data))
        .route("/api/health", get(handlers::health))
        .with_state(state)
}
