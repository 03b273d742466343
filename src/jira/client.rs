//! Jira Cloud REST v3 / Agile 1.0 client

use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::adf;
use super::models::*;
use crate::config::JiraConfig;
use crate::credentials::JiraCredentials;
use crate::error::{PlannerError, Result};
use crate::metrics::METRICS;

const SERVICE: &str = "Jira";

static ISSUE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*-\d+$").expect("valid issue key regex"));
static PROJECT_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid project key regex"));

/// Reject anything that is not a plain `PROJ-123` key
pub fn validate_issue_key(key: &str) -> Result<()> {
    if ISSUE_KEY.is_match(key) {
        Ok(())
    } else {
        Err(PlannerError::Validation(format!("invalid issue key '{}'", key)))
    }
}

pub fn validate_project_key(key: &str) -> Result<()> {
    if PROJECT_KEY.is_match(key) {
        Ok(())
    } else {
        Err(PlannerError::Validation(format!("invalid project key '{}'", key)))
    }
}

/// Build the search JQL; the status value is quoted and escaped
pub fn build_jql(project_key: &str, status: Option<&str>) -> Result<String> {
    validate_project_key(project_key)?;
    let mut jql = format!("project = {}", project_key);
    if let Some(status) = status.map(str::trim).filter(|s| !s.is_empty()) {
        let escaped = status.replace('\\', "\\\\").replace('\'', "\\'");
        jql.push_str(&format!(" AND status = '{}'", escaped));
    }
    jql.push_str(" ORDER BY updated DESC");
    Ok(jql)
}

/// Jira client authenticated with basic auth (email + API token)
pub struct JiraClient {
    http: Client,
    base_url: String,
    base_origin: url::Origin,
    auth_header: SecretString,
    config: JiraConfig,
}

impl JiraClient {
    /// Create a new Jira client
    pub fn new(config: JiraConfig, credentials: JiraCredentials) -> Result<Self> {
        let base_url = credentials.base_url.trim_end_matches('/').to_string();
        let base_origin = Url::parse(&base_url)
            .map_err(|e| PlannerError::InvalidUrl(format!("JIRA_URL '{}': {}", base_url, e)))?
            .origin();

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PlannerError::Internal(format!("failed to build Jira client: {}", e)))?;

        let pair = format!(
            "{}:{}",
            credentials.email,
            credentials.api_token.expose_secret()
        );
        let auth_header = SecretString::new(format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(pair)
        ));

        Ok(Self {
            http,
            base_url,
            base_origin,
            auth_header,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header(reqwest::header::AUTHORIZATION, self.auth_header.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let start = Instant::now();
        let response = request.send().await.map_err(|e| {
            METRICS.record_upstream("jira", false, start.elapsed());
            PlannerError::from_reqwest(SERVICE, e)
        })?;

        if !response.status().is_success() {
            METRICS.record_upstream("jira", false, start.elapsed());
            warn!("Jira returned {} for {}", response.status(), response.url().path());
            return Err(PlannerError::from_response(SERVICE, response).await);
        }

        METRICS.record_upstream("jira", true, start.elapsed());
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .send(self.request(reqwest::Method::GET, path).query(query))
            .await?;
        response.json().await.map_err(|e| PlannerError::InvalidResponse {
            service: SERVICE,
            message: e.to_string(),
        })
    }

    /// `GET /rest/api/3/myself`; used as the connectivity probe
    pub async fn myself(&self) -> Result<JiraUser> {
        self.get_json("/rest/api/3/myself", &[]).await
    }

    /// `GET /rest/api/3/project`
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let projects: Vec<Project> = self.get_json("/rest/api/3/project", &[]).await?;
        info!("Fetched {} Jira projects", projects.len());
        Ok(projects)
    }

    /// Search a project's issues, newest update first
    pub async fn search_issues(
        &self,
        project_key: &str,
        status: Option<&str>,
        max_results: u32,
    ) -> Result<Vec<Issue>> {
        let jql = build_jql(project_key, status)?;
        let max_results = max_results.clamp(1, self.config.max_search_results.max(1));
        debug!("Jira search: {} (max {})", jql, max_results);

        let page: SearchResponse = self
            .get_json(
                "/rest/api/3/search",
                &[
                    ("jql", jql),
                    ("maxResults", max_results.to_string()),
                    ("fields", SEARCH_FIELDS.join(",")),
                ],
            )
            .await?;

        Ok(page
            .issues
            .into_iter()
            .map(|raw| Issue::from_raw(raw, &self.base_url))
            .collect())
    }

    /// Fetch one issue with its description flattened
    pub async fn get_issue(&self, key: &str) -> Result<Issue> {
        validate_issue_key(key)?;
        let raw: RawIssue = self
            .get_json(
                &format!("/rest/api/3/issue/{}", key),
                &[("expand", "changelog,attachments,comments".to_string())],
            )
            .await
            .map_err(|e| match e {
                PlannerError::NotFound(_) => {
                    PlannerError::NotFound(format!("Jira issue {} not found", key))
                }
                other => other,
            })?;
        Ok(Issue::from_raw(raw, &self.base_url))
    }

    /// Post a plain-text comment, wrapped in a one-paragraph ADF document
    pub async fn add_comment(&self, key: &str, text: &str) -> Result<Comment> {
        validate_issue_key(key)?;
        if text.trim().is_empty() {
            return Err(PlannerError::Validation("comment text is empty".to_string()));
        }

        let body = serde_json::json!({ "body": adf::paragraph(text) });
        let response = self
            .send(
                self.request(reqwest::Method::POST, &format!("/rest/api/3/issue/{}/comment", key))
                    .json(&body),
            )
            .await?;
        let raw: RawComment = response.json().await.map_err(|e| PlannerError::InvalidResponse {
            service: SERVICE,
            message: e.to_string(),
        })?;
        info!("Added comment {} to {}", raw.id, key);
        Ok(raw.into())
    }

    /// Most recent comments, oldest first
    pub async fn list_comments(&self, key: &str, max_results: u32) -> Result<Vec<Comment>> {
        validate_issue_key(key)?;
        let page: CommentPage = self
            .get_json(
                &format!("/rest/api/3/issue/{}/comment", key),
                &[
                    ("maxResults", max_results.max(1).to_string()),
                    ("orderBy", "-created".to_string()),
                ],
            )
            .await?;

        let mut comments: Vec<Comment> = page.comments.into_iter().map(Comment::from).collect();
        comments.reverse();
        Ok(comments)
    }

    /// Attachment metadata; an issue without attachments yields an empty list
    pub async fn list_attachments(&self, key: &str) -> Result<Vec<Attachment>> {
        validate_issue_key(key)?;
        let raw: RawIssue = self
            .get_json(
                &format!("/rest/api/3/issue/{}", key),
                &[("fields", "attachment".to_string())],
            )
            .await?;
        Ok(raw
            .fields
            .attachment
            .unwrap_or_default()
            .into_iter()
            .map(Attachment::from)
            .collect())
    }

    /// Download an attachment by its content URL.
    ///
    /// Only URLs on the configured Jira origin are fetched, so the basic-auth
    /// header never leaves that host.
    pub async fn download_attachment(&self, url: &str) -> Result<AttachmentContent> {
        let parsed = Url::parse(url)
            .map_err(|e| PlannerError::InvalidUrl(format!("attachment URL '{}': {}", url, e)))?;
        if parsed.origin() != self.base_origin {
            return Err(PlannerError::Validation(format!(
                "refusing to send Jira credentials to {}",
                parsed.origin().ascii_serialization()
            )));
        }

        let response = self
            .send(
                self.http
                    .get(parsed)
                    .header(reqwest::header::AUTHORIZATION, self.auth_header.expose_secret()),
            )
            .await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PlannerError::from_reqwest(SERVICE, e))?;
        debug!("Downloaded {} attachment bytes", bytes.len());

        Ok(AttachmentContent { content_type, bytes })
    }

    /// Download an attachment by id
    pub async fn attachment_content(&self, attachment_id: &str) -> Result<AttachmentContent> {
        if attachment_id.is_empty() || !attachment_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(PlannerError::Validation(format!(
                "invalid attachment id '{}'",
                attachment_id
            )));
        }
        self.download_attachment(&format!(
            "{}/rest/api/3/attachment/content/{}",
            self.base_url, attachment_id
        ))
        .await
    }

    /// `GET /rest/agile/1.0/board`
    pub async fn list_boards(&self) -> Result<Vec<Board>> {
        let page: BoardPage = self.get_json("/rest/agile/1.0/board", &[]).await?;
        Ok(page.values)
    }

    /// `GET /rest/agile/1.0/board/{id}/backlog`
    pub async fn board_backlog(&self, board_id: u64, max_results: u32) -> Result<Vec<Issue>> {
        let max_results = max_results.clamp(1, self.config.max_search_results.max(1));
        let page: SearchResponse = self
            .get_json(
                &format!("/rest/agile/1.0/board/{}/backlog", board_id),
                &[
                    ("maxResults", max_results.to_string()),
                    ("fields", SEARCH_FIELDS.join(",")),
                ],
            )
            .await?;
        Ok(page
            .issues
            .into_iter()
            .map(|raw| Issue::from_raw(raw, &self.base_url))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client_for(server: &Server) -> JiraClient {
        JiraClient::new(
            JiraConfig::default(),
            JiraCredentials {
                base_url: server.url(),
                email: "dev@acme.io".into(),
                api_token: SecretString::new("tok".into()),
            },
        )
        .unwrap()
    }

    fn basic_auth() -> String {
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode("dev@acme.io:tok")
        )
    }

    #[test]
    fn test_build_jql() {
        assert_eq!(
            build_jql("SCRUM", None).unwrap(),
            "project = SCRUM ORDER BY updated DESC"
        );
        assert_eq!(
            build_jql("SCRUM", Some("In Progress")).unwrap(),
            "project = SCRUM AND status = 'In Progress' ORDER BY updated DESC"
        );
        assert_eq!(
            build_jql("SCRUM", Some("Won't Do")).unwrap(),
            "project = SCRUM AND status = 'Won\\'t Do' ORDER BY updated DESC"
        );
        assert!(matches!(
            build_jql("SCRUM OR 1=1", None),
            Err(PlannerError::Validation(_))
        ));
    }

    #[test]
    fn test_issue_key_validation() {
        assert!(validate_issue_key("SCRUM-1").is_ok());
        assert!(validate_issue_key("ab_c-42").is_ok());
        assert!(validate_issue_key("SCRUM").is_err());
        assert!(validate_issue_key("../SCRUM-1").is_err());
    }

    #[tokio::test]
    async fn test_get_issue_sends_basic_auth_and_flattens() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/api/3/issue/SCRUM-1")
            .match_query(Matcher::UrlEncoded(
                "expand".into(),
                "changelog,attachments,comments".into(),
            ))
            .match_header("authorization", basic_auth().as_str())
            .with_status(200)
            .with_body(
                json!({
                    "key": "SCRUM-1",
                    "fields": {
                        "summary": "Fix login button color",
                        "description": adf::paragraph("Change to blue"),
                        "status": {"name": "To Do"}
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let issue = client_for(&server).get_issue("SCRUM-1").await.unwrap();
        assert_eq!(issue.summary, "Fix login button color");
        assert_eq!(issue.description, "Change to blue");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/rest/api/3/issue/SCRUM-404")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"errorMessages":["Issue does not exist"]}"#)
            .create_async()
            .await;
        let _denied = server
            .mock("GET", "/rest/api/3/issue/SCRUM-401")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/rest/api/3/issue/SCRUM-500")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.get_issue("SCRUM-404").await,
            Err(PlannerError::NotFound(_))
        ));
        assert!(matches!(
            client.get_issue("SCRUM-401").await,
            Err(PlannerError::Authentication { status: Some(401), .. })
        ));
        assert!(matches!(
            client.get_issue("SCRUM-500").await,
            Err(PlannerError::Upstream { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_search_issues_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/api/3/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "jql".into(),
                    "project = SCRUM AND status = 'To Do' ORDER BY updated DESC".into(),
                ),
                Matcher::UrlEncoded("maxResults".into(), "25".into()),
                Matcher::UrlEncoded("fields".into(), SEARCH_FIELDS.join(",")),
            ]))
            .with_status(200)
            .with_body(
                json!({"issues": [
                    {"key": "SCRUM-2", "fields": {"summary": "Second"}},
                    {"key": "SCRUM-1", "fields": {"summary": "First"}}
                ], "total": 2})
                .to_string(),
            )
            .create_async()
            .await;

        let issues = client_for(&server)
            .search_issues("SCRUM", Some("To Do"), 25)
            .await
            .unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].key, "SCRUM-2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_comments_returns_newest_in_chronological_order() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/api/3/issue/SCRUM-1/comment")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("maxResults".into(), "2".into()),
                Matcher::UrlEncoded("orderBy".into(), "-created".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"comments": [
                    {"id": "3", "author": {"displayName": "Dana"}, "body": "newest"},
                    {"id": "2", "author": {"displayName": "Sam"}, "body": adf::paragraph("older")}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let comments = client_for(&server).list_comments("SCRUM-1", 2).await.unwrap();
        let bodies: Vec<&str> = comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["older", "newest"]);
        assert_eq!(comments[1].author.as_deref(), Some("Dana"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_add_comment_wraps_text_in_adf() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/api/3/issue/SCRUM-1/comment")
            .match_body(Matcher::Json(json!({ "body": adf::paragraph("Plan attached") })))
            .with_status(201)
            .with_body(
                json!({"id": "10010", "body": adf::paragraph("Plan attached")}).to_string(),
            )
            .create_async()
            .await;

        let comment = client_for(&server)
            .add_comment("SCRUM-1", "Plan attached")
            .await
            .unwrap();
        assert_eq!(comment.id, "10010");
        assert_eq!(comment.body, "Plan attached");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_attachments_empty_is_ok() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/api/3/issue/SCRUM-1")
            .match_query(Matcher::UrlEncoded("fields".into(), "attachment".into()))
            .with_status(200)
            .with_body(r#"{"key":"SCRUM-1","fields":{"attachment":[]}}"#)
            .create_async()
            .await;

        let attachments = client_for(&server).list_attachments("SCRUM-1").await.unwrap();
        assert!(attachments.is_empty());
    }

    #[tokio::test]
    async fn test_download_refuses_foreign_host() {
        let server = Server::new_async().await;
        let client = client_for(&server);
        assert!(matches!(
            client
                .download_attachment("https://evil.example.com/secret/content/1")
                .await,
            Err(PlannerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_download_attachment_by_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/api/3/attachment/content/10001")
            .match_header("authorization", basic_auth().as_str())
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("hello")
            .create_async()
            .await;

        let content = client_for(&server).attachment_content("10001").await.unwrap();
        assert_eq!(content.content_type.as_deref(), Some("text/plain"));
        assert_eq!(&content.bytes[..], b"hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_boards_and_backlog() {
        let mut server = Server::new_async().await;
        let _boards = server
            .mock("GET", "/rest/agile/1.0/board")
            .with_status(200)
            .with_body(r#"{"values":[{"id":7,"name":"SCRUM board","type":"scrum"}]}"#)
            .create_async()
            .await;
        let _backlog = server
            .mock("GET", "/rest/agile/1.0/board/7/backlog")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"issues":[{"key":"SCRUM-9","fields":{"summary":"Backlog item"}}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let boards = client.list_boards().await.unwrap();
        assert_eq!(boards[0].board_type.as_deref(), Some("scrum"));
        let backlog = client.board_backlog(7, 10).await.unwrap();
        assert_eq!(backlog[0].key, "SCRUM-9");
    }
}
