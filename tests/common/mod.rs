//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use mockito::{Matcher, Mock, ServerGuard};
use secrecy::SecretString;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ticket_planner::config::{GitHubConfig, JiraConfig};
use ticket_planner::credentials::JiraCredentials;
use ticket_planner::github::GitHubClient;
use ticket_planner::granite::TextGenerator;
use ticket_planner::jira::JiraClient;
use ticket_planner::Result;

pub const PLAN_TEXT: &str = "## Files to modify\n- src/components/LoginButton.tsx: change the background to blue\n\n## Steps\n1. Update the button style\n2. Add a snapshot test\n";

/// Generator that replays scripted outputs and records every prompt
pub struct RecordingGenerator {
    outputs: Mutex<VecDeque<Result<String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn new(outputs: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            outputs: Mutex::new(outputs.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Always answers with the canned plan
    pub fn with_plan() -> Arc<Self> {
        Self::new(vec![Ok(PLAN_TEXT.to_string())])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for RecordingGenerator {
    async fn generate(&self, prompt: &str, _max_tokens: u32, _temperature: f64) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PLAN_TEXT.to_string()))
    }

    fn model_id(&self) -> &str {
        "ibm/granite-test"
    }
}

pub fn jira_client(server: &ServerGuard) -> Arc<JiraClient> {
    let credentials = JiraCredentials {
        base_url: server.url(),
        email: "dev@example.com".to_string(),
        api_token: SecretString::new("jira-token".to_string()),
    };
    Arc::new(JiraClient::new(JiraConfig::default(), credentials).unwrap())
}

pub fn github_config(server: &ServerGuard) -> GitHubConfig {
    GitHubConfig {
        api_url: server.url(),
        cache_enabled: false,
        ..GitHubConfig::default()
    }
}

pub fn github_client(server: &ServerGuard) -> Arc<GitHubClient> {
    Arc::new(GitHubClient::new(&github_config(server), None).unwrap())
}

/// Mocks `SCRUM-1` plus one discussion comment
pub async fn mock_login_issue(server: &mut ServerGuard) -> (Mock, Mock) {
    let issue = server
        .mock("GET", "/rest/api/3/issue/SCRUM-1")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "key": "SCRUM-1",
                "fields": {
                    "summary": "Fix login button color",
                    "description": {
                        "type": "doc",
                        "version": 1,
                        "content": [{
                            "type": "paragraph",
                            "content": [{"type": "text", "text": "Change to blue"}]
                        }]
                    },
                    "status": {"name": "To Do"},
                    "priority": {"name": "Medium"},
                    "issuetype": {"name": "Story"},
                    "labels": ["frontend"]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let comments = server
        .mock("GET", "/rest/api/3/issue/SCRUM-1/comment")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "comments": [{
                    "id": "10001",
                    "author": {"displayName": "Dana"},
                    "body": "Use the brand blue from the palette",
                    "created": "2024-03-01T10:00:00.000+0000"
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    (issue, comments)
}

/// Mocks `acme/web` with a package.json and two components
pub async fn mock_web_repository(server: &mut ServerGuard) -> Vec<Mock> {
    let encode = |text: &str| base64::engine::general_purpose::STANDARD.encode(text);
    let mut mocks = Vec::new();

    mocks.push(
        server
            .mock("GET", "/repos/acme/web")
            .with_status(200)
            .with_body(
                json!({
                    "name": "web",
                    "full_name": "acme/web",
                    "description": "Storefront",
                    "language": "TypeScript",
                    "stargazers_count": 4,
                    "default_branch": "main"
                })
                .to_string(),
            )
            .create_async()
            .await,
    );
    mocks.push(
        server
            .mock("GET", "/repos/acme/web/languages")
            .with_status(200)
            .with_body(json!({"TypeScript": 5400, "CSS": 300}).to_string())
            .create_async()
            .await,
    );
    mocks.push(
        server
            .mock("GET", "/repos/acme/web/git/trees/main")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "truncated": false,
                    "tree": [
                        {"path": "package.json", "type": "blob", "size": 120},
                        {"path": "src", "type": "tree"},
                        {"path": "src/components/LoginButton.tsx", "type": "blob", "size": 240},
                        {"path": "src/pages/Login.tsx", "type": "blob", "size": 480}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await,
    );

    let files = [
        ("package.json", r#"{"dependencies": {"react": "^18.2.0"}}"#),
        (
            "src/components/LoginButton.tsx",
            "export const LoginButton = () => <button className=\"login-button\">Log in</button>;\n",
        ),
        (
            "src/pages/Login.tsx",
            "import { LoginButton } from '../components/LoginButton';\nexport default () => <LoginButton />;\n",
        ),
    ];
    for (path, content) in files {
        mocks.push(
            server
                .mock("GET", format!("/repos/acme/web/contents/{}", path).as_str())
                .match_query(Matcher::Any)
                .with_status(200)
                .with_body(json!({"encoding": "base64", "content": encode(content)}).to_string())
                .create_async()
                .await,
        );
    }
    mocks
}
