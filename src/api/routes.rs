//! Router configuration

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::handlers;
use super::health;
use super::state::AppState;
use crate::config::ServerConfig;

/// Build the API router with body limit, tracing and CORS layers
pub fn build_router(state: AppState) -> Router {
    let server = state.config.server.clone();

    Router::new()
        .route("/", get(handlers::service_info))
        .route("/api/health", get(health::health))
        .route("/metrics", get(handlers::metrics))
        // Jira
        .route("/api/jira/projects", get(handlers::list_projects))
        .route("/api/jira/issues", get(handlers::list_issues))
        .route("/api/jira/issues/:key", get(handlers::get_issue))
        .route(
            "/api/jira/issues/:key/comments",
            get(handlers::list_comments).post(handlers::add_comment),
        )
        .route("/api/jira/issues/:key/attachments", get(handlers::list_attachments))
        .route("/api/jira/attachments/:id/content", get(handlers::attachment_content))
        .route("/api/jira/boards", get(handlers::list_boards))
        .route("/api/jira/boards/:id/backlog", get(handlers::board_backlog))
        // Planning
        .route("/api/analyze-repository", post(handlers::analyze_repository))
        .route(
            "/api/generate-implementation-plan",
            post(handlers::generate_implementation_plan),
        )
        .route("/api/validate-pr", post(handlers::validate_pull_request))
        .layer(RequestBodyLimitLayer::new(server.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&server)),
        )
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if server.cors_origins.is_empty() {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    base.allow_origin(origins)
}
