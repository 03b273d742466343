//! End-to-end plan generation for one Jira issue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::assembler::PlanAssembler;
use super::sections::{parse_plan_sections, PlanSections};
use crate::analyzer::{RepositoryAnalyzer, RepositoryScanResult};
use crate::error::Result;
use crate::github::parse_repo_url;
use crate::jira::{validate_issue_key, Comment, JiraClient};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub issue_key: String,
    #[serde(default)]
    pub github_repo_url: Option<String>,
}

/// Plan returned to API callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationPlan {
    pub issue_key: String,
    pub plan_text: String,
    pub model_used: String,
    pub generated_at: DateTime<Utc>,
    pub repository_analyzed: bool,
    pub issue_summary: String,
    pub files_analyzed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryScanResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_warning: Option<String>,
    pub sections: PlanSections,
}

pub struct PlanningService {
    jira: Arc<JiraClient>,
    analyzer: Arc<RepositoryAnalyzer>,
    assembler: Arc<PlanAssembler>,
    /// Comments pulled into the prompt; zero disables discussion context
    max_comments: u32,
}

impl PlanningService {
    pub fn new(
        jira: Arc<JiraClient>,
        analyzer: Arc<RepositoryAnalyzer>,
        assembler: Arc<PlanAssembler>,
        max_comments: u32,
    ) -> Self {
        Self {
            jira,
            analyzer,
            assembler,
            max_comments,
        }
    }

    /// Fetch the issue, optionally scan the linked repository, and generate
    /// a plan. The scan and the discussion fetch run concurrently; either one
    /// failing only removes that context from the prompt.
    pub async fn generate_implementation_plan(&self, request: &PlanRequest) -> Result<ImplementationPlan> {
        let key = request.issue_key.trim();
        validate_issue_key(key)?;

        let repo_url = request
            .github_repo_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());
        if let Some(url) = repo_url {
            parse_repo_url(url)?;
        }

        let issue = self.jira.get_issue(key).await?;
        info!("Planning {} ({})", issue.key, issue.summary);

        let scan = async {
            match repo_url {
                Some(url) => Some(self.analyzer.scan(url, &issue.summary, &issue.description).await),
                None => None,
            }
        };
        let discussion = async {
            if self.max_comments == 0 {
                return Vec::new();
            }
            match self.jira.list_comments(&issue.key, self.max_comments).await {
                Ok(comments) => comments,
                Err(e) => {
                    warn!("Skipping discussion for {}: {}", issue.key, e);
                    Vec::new()
                }
            }
        };
        let (scan, discussion): (Option<Result<RepositoryScanResult>>, Vec<Comment>) = tokio::join!(scan, discussion);

        let (scan, repository_warning) = match scan {
            Some(Ok(result)) => (Some(result), None),
            Some(Err(e)) => {
                warn!("Repository scan failed for {}: {}", issue.key, e);
                (None, Some(format!("Repository analysis failed: {}", e)))
            }
            None => (None, None),
        };

        let plan = self
            .assembler
            .generate_plan(&issue, scan.as_ref(), &discussion)
            .await?;

        Ok(ImplementationPlan {
            issue_key: issue.key.clone(),
            sections: parse_plan_sections(&plan.plan_text),
            plan_text: plan.plan_text,
            model_used: plan.model_used,
            generated_at: plan.generated_at,
            repository_analyzed: plan.repository_analyzed,
            issue_summary: issue.summary,
            files_analyzed: scan.as_ref().map_or(0, |s| s.relevant_files.len()),
            repository: scan,
            repository_warning,
        })
    }
}
