//! Route handlers
//!
//! Handlers stay thin: validate input, call one service, map the result.
//! Every failure is a `PlannerError`, rendered with its status and kind.
//! Extractors are taken as `Result` so malformed input goes through the
//! same error body.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use super::models::*;
use super::state::AppState;
use crate::analyzer::RepositoryScanResult;
use crate::error::{PlannerError, Result};
use crate::jira::{validate_issue_key, Attachment, Board, Comment, Issue, Project};
use crate::metrics::METRICS;
use crate::planner::{ImplementationPlan, PlanRequest};
use crate::review::{PullRequestReview, ReviewRequest};

const DEFAULT_SEARCH_RESULTS: u32 = 50;
const DEFAULT_BACKLOG_RESULTS: u32 = 50;

/// GET /
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "ticket-planner".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: [
            "GET /api/health",
            "GET /metrics",
            "GET /api/jira/projects",
            "GET /api/jira/issues",
            "GET /api/jira/issues/:key",
            "POST /api/analyze-repository",
            "POST /api/generate-implementation-plan",
            "POST /api/validate-pr",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    })
}

/// GET /metrics
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.export_prometheus(),
    )
}

/// GET /api/jira/projects
pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>> {
    Ok(Json(state.jira()?.list_projects().await?))
}

/// GET /api/jira/issues?project_key=&status=&max_results=
pub async fn list_issues(
    State(state): State<AppState>,
    query: std::result::Result<Query<IssueListQuery>, QueryRejection>,
) -> Result<Json<IssueListResponse>> {
    let Query(query) = query?;
    let jira = state.jira()?;
    let status = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let issues = jira
        .search_issues(
            query.project_key.trim(),
            status,
            query.max_results.unwrap_or(DEFAULT_SEARCH_RESULTS),
        )
        .await?;

    Ok(Json(IssueListResponse {
        project_key: query.project_key.trim().to_string(),
        total: issues.len(),
        issues,
    }))
}

/// GET /api/jira/issues/:key
pub async fn get_issue(
    State(state): State<AppState>,
    key: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<Issue>> {
    let Path(key) = key?;
    let jira = state.jira()?;
    validate_issue_key(&key)?;
    Ok(Json(jira.get_issue(&key).await?))
}

/// GET /api/jira/issues/:key/comments
pub async fn list_comments(
    State(state): State<AppState>,
    key: std::result::Result<Path<String>, PathRejection>,
    query: std::result::Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<CommentListResponse>> {
    let (Path(key), Query(query)) = (key?, query?);
    let jira = state.jira()?;
    validate_issue_key(&key)?;
    let max = query.max_results.unwrap_or(state.config.jira.max_comments);
    let comments = jira.list_comments(&key, max).await?;
    Ok(Json(CommentListResponse {
        issue_key: key,
        comments,
    }))
}

/// POST /api/jira/issues/:key/comments
pub async fn add_comment(
    State(state): State<AppState>,
    key: std::result::Result<Path<String>, PathRejection>,
    request: std::result::Result<Json<CommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Comment>)> {
    let (Path(key), Json(request)) = (key?, request?);
    let jira = state.jira()?;
    validate_issue_key(&key)?;
    let comment = jira.add_comment(&key, &request.text).await?;
    info!("Comment {} added to {}", comment.id, key);
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/jira/issues/:key/attachments
pub async fn list_attachments(
    State(state): State<AppState>,
    key: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<Attachment>>> {
    let Path(key) = key?;
    let jira = state.jira()?;
    validate_issue_key(&key)?;
    Ok(Json(jira.list_attachments(&key).await?))
}

/// GET /api/jira/attachments/:id/content
pub async fn attachment_content(
    State(state): State<AppState>,
    id: std::result::Result<Path<String>, PathRejection>,
) -> Result<Response> {
    let Path(id) = id?;
    let content = state.jira()?.attachment_content(&id).await?;
    let content_type = content
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(([(header::CONTENT_TYPE, content_type)], content.bytes).into_response())
}

/// GET /api/jira/boards
pub async fn list_boards(State(state): State<AppState>) -> Result<Json<Vec<Board>>> {
    Ok(Json(state.jira()?.list_boards().await?))
}

/// GET /api/jira/boards/:id/backlog
pub async fn board_backlog(
    State(state): State<AppState>,
    board_id: std::result::Result<Path<u64>, PathRejection>,
    query: std::result::Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<Vec<Issue>>> {
    let (Path(board_id), Query(query)) = (board_id?, query?);
    let jira = state.jira()?;
    let max = query.max_results.unwrap_or(DEFAULT_BACKLOG_RESULTS);
    Ok(Json(jira.board_backlog(board_id, max).await?))
}

/// POST /api/analyze-repository
pub async fn analyze_repository(
    State(state): State<AppState>,
    request: std::result::Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<RepositoryScanResult>> {
    let Json(request) = request?;
    let scan = state
        .analyzer
        .scan(
            request.github_repo_url.trim(),
            request.summary.as_deref().unwrap_or_default(),
            request.description.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(scan))
}

/// POST /api/generate-implementation-plan
pub async fn generate_implementation_plan(
    State(state): State<AppState>,
    request: std::result::Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<ImplementationPlan>> {
    let Json(request) = request?;
    if request.issue_key.trim().is_empty() {
        return Err(PlannerError::Validation("issue_key is required".to_string()));
    }
    let planner = state.planner()?;
    Ok(Json(planner.generate_implementation_plan(&request).await?))
}

/// POST /api/validate-pr
///
/// Advisory only: the assessment is a model or heuristic opinion.
pub async fn validate_pull_request(
    State(state): State<AppState>,
    request: std::result::Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<PullRequestReview>> {
    let Json(request) = request?;
    let key = request.issue_key.trim();
    if key.is_empty() {
        return Err(PlannerError::Validation("issue_key is required".to_string()));
    }
    validate_issue_key(key)?;
    let jira = state.jira()?;

    let issue = jira.get_issue(key).await?;
    Ok(Json(state.reviewer.review(request.pr_url.trim(), &issue).await?))
}
