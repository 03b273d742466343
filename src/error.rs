//! Error types shared by every integration and the HTTP layer

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Upstream bodies are clipped to this many characters before they are
/// embedded in an error message.
const MAX_UPSTREAM_MESSAGE_CHARS: usize = 500;

/// Errors surfaced by the planner and its upstream clients
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("{service} is not configured (missing {})", .missing.join(", "))]
    NotConfigured {
        service: &'static str,
        missing: Vec<&'static str>,
    },

    #[error("{service} authentication failed{}: {message}", .status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    Authentication {
        service: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Plan generation failed: {0}")]
    PlanGeneration(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{service} returned status {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Request to {service} failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("Invalid response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PlannerError>;

impl PlannerError {
    /// Stable, machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured { .. } => "not_configured",
            Self::Authentication { .. } => "authentication_error",
            Self::NotFound(_) => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout(_) => "timeout",
            Self::Generation(_) => "generation_error",
            Self::PlanGeneration(_) => "plan_generation_error",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Validation(_) => "validation_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Transport { .. } => "transport_error",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status used when the error reaches a client
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Authentication { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Generation(_) | Self::PlanGeneration(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidUrl(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } | Self::Transport { .. } | Self::InvalidResponse { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a reqwest failure, keeping timeouts distinct
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(format!("{} request timed out", service))
        } else {
            Self::Transport {
                service,
                message: err.to_string(),
            }
        }
    }

    /// Map a non-success upstream response using the common status rules.
    ///
    /// 401/403 become `Authentication`, 404 `NotFound`, 429 `RateLimited`,
    /// anything else `Upstream`.
    pub async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status();
        let retry_after = retry_after_secs(response.headers());
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = clip(&body);

        match status.as_u16() {
            401 | 403 => Self::Authentication {
                service,
                status: Some(status.as_u16()),
                message,
            },
            404 => Self::NotFound(format!("{}: {}", service, message)),
            429 => Self::RateLimited {
                message: format!("{}: {}", service, message),
                retry_after_secs: retry_after,
            },
            code => Self::Upstream {
                service,
                status: code,
                message,
            },
        }
    }
}

/// Read a `Retry-After` header expressed in seconds
pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Clip an upstream body for inclusion in an error message
pub(crate) fn clip(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_UPSTREAM_MESSAGE_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

// Extractor rejections are client input errors

impl From<JsonRejection> for PlannerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for PlannerError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for PlannerError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}

/// Error body returned by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub detail: String,
}

impl IntoResponse for PlannerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(kind = self.kind(), "request failed: {}", self);
        }

        let retry_after = match &self {
            Self::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => HeaderValue::from_str(&secs.to_string()).ok(),
            _ => None,
        };

        let detail = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let body = Json(ApiError {
            error: self.kind().to_string(),
            detail,
        });

        let mut response = (status, body).into_response();
        if let Some(value) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_configured_names_missing_variables() {
        let err = PlannerError::NotConfigured {
            service: "Jira",
            missing: vec!["JIRA_URL", "JIRA_API_TOKEN"],
        };
        assert_eq!(
            err.to_string(),
            "Jira is not configured (missing JIRA_URL, JIRA_API_TOKEN)"
        );
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_authentication_keeps_upstream_status() {
        let err = PlannerError::Authentication {
            service: "Jira",
            status: Some(401),
            message: "bad token".into(),
        };
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = PlannerError::Authentication {
            service: "IBM IAM",
            status: None,
            message: "connection refused".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            PlannerError::InvalidUrl("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PlannerError::Timeout("x".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            PlannerError::Generation("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            PlannerError::RateLimited {
                message: "x".into(),
                retry_after_secs: None
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after_header() {
        let response = PlannerError::RateLimited {
            message: "GitHub".into(),
            retry_after_secs: Some(42),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[test]
    fn test_clip_long_message() {
        let long = "x".repeat(600);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), MAX_UPSTREAM_MESSAGE_CHARS + 3);
        assert_eq!(clip("  short  "), "short");
    }
}
