//! Jira REST payloads and the projections handed to the rest of the service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::adf;

/// Issue fields requested from search endpoints
pub const SEARCH_FIELDS: &[&str] = &[
    "summary",
    "description",
    "status",
    "assignee",
    "created",
    "updated",
    "issuetype",
    "priority",
    "labels",
    "components",
];

// ---- raw API shapes -------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RawIssue {
    pub key: String,
    #[serde(default)]
    pub fields: RawIssueFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIssueFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub status: Option<Named>,
    #[serde(default)]
    pub priority: Option<Named>,
    #[serde(default)]
    pub issuetype: Option<Named>,
    #[serde(default)]
    pub assignee: Option<RawUser>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub components: Vec<Named>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub attachment: Option<Vec<RawAttachment>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub issues: Vec<RawIssue>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    pub id: String,
    #[serde(default)]
    pub author: Option<RawUser>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub created: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentPage {
    #[serde(default)]
    pub comments: Vec<RawComment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttachment {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub author: Option<RawUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoardPage {
    #[serde(default)]
    pub values: Vec<Board>,
}

// ---- projections ------------------------------------------------------------

/// Read-only view of a Jira issue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub key: String,
    pub url: String,
    pub summary: String,
    pub description: String,
    /// Heuristically extracted; often empty
    pub acceptance_criteria: Vec<String>,
    pub status: String,
    pub priority: String,
    pub issue_type: String,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl Issue {
    /// Project a raw issue; `base_url` builds the browse link
    pub fn from_raw(raw: RawIssue, base_url: &str) -> Self {
        let fields = raw.fields;
        let description = fields.description.as_ref().map(adf::flatten).unwrap_or_default();
        let acceptance_criteria = adf::acceptance_criteria(&description);

        Self {
            url: format!("{}/browse/{}", base_url, raw.key),
            key: raw.key,
            summary: fields.summary.unwrap_or_default(),
            description,
            acceptance_criteria,
            status: fields.status.map(|s| s.name).unwrap_or_else(|| "Unknown".to_string()),
            priority: fields.priority.map(|p| p.name).unwrap_or_else(|| "Medium".to_string()),
            issue_type: fields.issuetype.map(|t| t.name).unwrap_or_else(|| "Story".to_string()),
            assignee: fields.assignee.and_then(|a| a.display_name),
            labels: fields.labels,
            components: fields.components.into_iter().map(|c| c.name).collect(),
            created: fields.created.as_deref().and_then(parse_timestamp),
            updated: fields.updated.as_deref().and_then(parse_timestamp),
        }
    }
}

/// A project from `GET /rest/api/3/project`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub project_type_key: Option<String>,
}

/// A comment with its body flattened to text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: String,
    pub author: Option<String>,
    pub body: String,
    pub created: Option<DateTime<Utc>>,
}

impl From<RawComment> for Comment {
    fn from(raw: RawComment) -> Self {
        Self {
            id: raw.id,
            author: raw.author.and_then(|a| a.display_name),
            body: raw.body.as_ref().map(adf::flatten).unwrap_or_default(),
            created: raw.created.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub size: u64,
    /// Authenticated download URL on the Jira host
    pub content_url: Option<String>,
    pub author: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

impl From<RawAttachment> for Attachment {
    fn from(raw: RawAttachment) -> Self {
        Self {
            id: raw.id,
            filename: raw.filename,
            mime_type: raw.mime_type,
            size: raw.size,
            content_url: raw.content,
            author: raw.author.and_then(|a| a.display_name),
            created: raw.created.as_deref().and_then(parse_timestamp),
        }
    }
}

/// An agile board
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub board_type: Option<String>,
}

/// The authenticated Jira user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Downloaded attachment bytes
#[derive(Debug, Clone)]
pub struct AttachmentContent {
    pub content_type: Option<String>,
    pub bytes: bytes::Bytes,
}

/// Parse Jira's `2024-01-31T09:15:00.000+0000` as well as RFC 3339
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_issue_projection() {
        let raw: RawIssue = serde_json::from_value(json!({
            "key": "SCRUM-1",
            "fields": {
                "summary": "Fix login button color",
                "description": adf::paragraph("Change to blue"),
                "status": {"name": "To Do"},
                "priority": {"name": "High"},
                "issuetype": {"name": "Bug"},
                "assignee": {"displayName": "Sam Lee", "accountId": "abc"},
                "labels": ["ui"],
                "components": [{"name": "web"}],
                "created": "2024-01-31T09:15:00.000+0000"
            }
        }))
        .unwrap();

        let issue = Issue::from_raw(raw, "https://acme.atlassian.net");
        assert_eq!(issue.url, "https://acme.atlassian.net/browse/SCRUM-1");
        assert_eq!(issue.description, "Change to blue");
        assert_eq!(issue.status, "To Do");
        assert_eq!(issue.assignee.as_deref(), Some("Sam Lee"));
        assert_eq!(issue.components, vec!["web"]);
        assert_eq!(
            issue.created,
            Some(Utc.with_ymd_and_hms(2024, 1, 31, 9, 15, 0).unwrap())
        );
        assert!(issue.updated.is_none());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let raw: RawIssue = serde_json::from_value(json!({"key": "X-2", "fields": {}})).unwrap();
        let issue = Issue::from_raw(raw, "https://j");
        assert_eq!(issue.summary, "");
        assert_eq!(issue.status, "Unknown");
        assert_eq!(issue.priority, "Medium");
        assert_eq!(issue.issue_type, "Story");
        assert!(issue.acceptance_criteria.is_empty());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-01-31T09:15:00.000+0000").is_some());
        assert!(parse_timestamp("2024-01-31T09:15:00Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
