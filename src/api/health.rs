//! Dependency health probes

use axum::{extract::State, Json};
use chrono::Utc;
use indexmap::IndexMap;
use tracing::debug;

use super::models::{HealthResponse, HealthStatus, ServiceHealth};
use super::state::AppState;
use crate::granite::TextGenerator;

/// GET /api/health
///
/// Probes Jira, GitHub and IBM concurrently. Always 200; failures show up as
/// per-service `error` entries.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (jira, github, granite) = tokio::join!(probe_jira(&state), probe_github(&state), probe_granite(&state));

    let mut services = IndexMap::new();
    services.insert("jira".to_string(), jira);
    services.insert("github".to_string(), github);
    services.insert("ibm_granite".to_string(), granite);

    let healthy = services.values().all(|s| s.status != HealthStatus::Error);
    debug!("Health check: {}", if healthy { "healthy" } else { "degraded" });

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        services,
    })
}

async fn probe_jira(state: &AppState) -> ServiceHealth {
    let Some(jira) = &state.jira else {
        return ServiceHealth::not_configured(state.jira_not_configured().to_string());
    };
    match jira.myself().await {
        Ok(user) => ServiceHealth::success(format!(
            "Connected to {} as {}",
            jira.base_url(),
            user.display_name.as_deref().unwrap_or("unknown user")
        )),
        Err(e) => ServiceHealth::error(e.to_string()),
    }
}

async fn probe_github(state: &AppState) -> ServiceHealth {
    match state.github.rate_limit().await {
        Ok(limits) if state.github.has_token() => ServiceHealth::success(format!(
            "Authenticated, {}/{} requests remaining",
            limits.core.remaining, limits.core.limit
        )),
        Ok(limits) => ServiceHealth::warning(format!(
            "No GITHUB_TOKEN; anonymous access with {}/{} requests remaining",
            limits.core.remaining, limits.core.limit
        )),
        Err(e) => ServiceHealth::error(e.to_string()),
    }
}

async fn probe_granite(state: &AppState) -> ServiceHealth {
    let Some(granite) = &state.granite else {
        return ServiceHealth::not_configured(state.granite_not_configured().to_string());
    };
    match granite.check_connection().await {
        Ok(()) => ServiceHealth::success(format!("IAM token acquired for {}", granite.model_id())),
        Err(e) => ServiceHealth::error(e.to_string()),
    }
}
