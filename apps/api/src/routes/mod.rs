pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::outreach::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/emails/generate", post(handlers::handle_generate))
        .route("/api/v1/jobs/extract", post(handlers::handle_extract_jobs))
        .route("/api/v1/portfolio", get(handlers::handle_list_portfolio))
        .route("/api/v1/portfolio/match", post(handlers::handle_match))
        .with_state(state)
}
