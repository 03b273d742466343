//! Request and response bodies of the HTTP API

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::jira::{Comment, Issue};

/// `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueListQuery {
    pub project_key: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueListResponse {
    pub project_key: String,
    pub total: usize,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentListResponse {
    pub issue_key: String,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub github_repo_url: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Success,
    Warning,
    Error,
}

/// One dependency's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    pub configured: bool,
    pub message: String,
}

impl ServiceHealth {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Success,
            configured: true,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Warning,
            configured: true,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            configured: true,
            message: message.into(),
        }
    }

    pub fn not_configured(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            configured: false,
            message: message.into(),
        }
    }
}

/// `GET /api/health`; always served with 200
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` when no dependency reports an error, else `degraded`
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub services: IndexMap<String, ServiceHealth>,
}
