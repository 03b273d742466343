//! Advisory pull-request review against a Jira ticket

pub mod parse;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::github::{parse_pull_request_url, GitHubClient, PullRequest};
use crate::granite::TextGenerator;
use crate::jira::Issue;
use crate::metrics::METRICS;

pub use parse::{heuristic_assessment, parse_assessment, Assessment, AssessmentSource, Confidence};

const MAX_DIFF_CHARS: usize = 8000;
const REVIEW_MAX_TOKENS: u32 = 1500;
const REVIEW_TEMPERATURE: f64 = 0.1;
const MAX_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub issue_key: String,
    pub pr_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub author: Option<String>,
    pub mergeable: Option<bool>,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub url: Option<String>,
}

impl From<&PullRequest> for PullRequestSummary {
    fn from(pr: &PullRequest) -> Self {
        Self {
            number: pr.number,
            title: pr.title.clone(),
            state: pr.state.clone(),
            author: pr.user.as_ref().map(|u| u.login.clone()),
            mergeable: pr.mergeable,
            additions: pr.additions,
            deletions: pr.deletions,
            changed_files: pr.changed_files,
            url: pr.html_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestReview {
    pub issue_key: String,
    pub pull_request: PullRequestSummary,
    pub analysis: Assessment,
    pub model_used: Option<String>,
    pub analyzed_at: DateTime<Utc>,
}

pub struct PullRequestReviewer {
    github: Arc<GitHubClient>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl PullRequestReviewer {
    /// `generator` is `None` when Granite is not configured; every review is
    /// then heuristic
    pub fn new(github: Arc<GitHubClient>, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { github, generator }
    }

    /// Review `pr_url` against `issue`.
    ///
    /// GitHub failures propagate. Generation failures and empty output fall
    /// back to the diff-size heuristic.
    pub async fn review(&self, pr_url: &str, issue: &Issue) -> Result<PullRequestReview> {
        let pr_ref = parse_pull_request_url(pr_url)?;
        info!("Reviewing {}/{}#{} for {}", pr_ref.owner, pr_ref.repo, pr_ref.number, issue.key);

        let (pr, diff) = tokio::join!(
            self.github.get_pull_request(&pr_ref.owner, &pr_ref.repo, pr_ref.number),
            self.github.get_pull_request_diff(&pr_ref.owner, &pr_ref.repo, pr_ref.number)
        );
        let pr = pr?;
        let diff = diff?;

        let (analysis, model_used) = match &self.generator {
            Some(generator) => {
                let prompt = review_prompt(issue, &pr, &diff);
                match generator.generate(&prompt, REVIEW_MAX_TOKENS, REVIEW_TEMPERATURE).await {
                    Ok(text) if !text.trim().is_empty() => {
                        (parse_assessment(&text), Some(generator.model_id().to_string()))
                    }
                    Ok(_) => {
                        warn!("Empty review from model for PR #{}", pr.number);
                        (heuristic_assessment(&pr, "model returned no output"), None)
                    }
                    Err(e) => {
                        warn!("Review generation failed for PR #{}: {}", pr.number, e);
                        (heuristic_assessment(&pr, "model unavailable"), None)
                    }
                }
            }
            None => (heuristic_assessment(&pr, "text generation not configured"), None),
        };
        METRICS.record_pr_review(analysis.source.as_str());

        Ok(PullRequestReview {
            issue_key: issue.key.clone(),
            pull_request: PullRequestSummary::from(&pr),
            analysis,
            model_used,
            analyzed_at: Utc::now(),
        })
    }
}

fn review_prompt(issue: &Issue, pr: &PullRequest, diff: &str) -> String {
    let mut prompt = String::from(
        "You are a senior code reviewer checking a pull request against its Jira ticket.\n\n",
    );

    prompt.push_str("TICKET:\n");
    let _ = writeln!(prompt, "- Key: {}", issue.key);
    let _ = writeln!(prompt, "- Summary: {}", issue.summary);
    let _ = writeln!(prompt, "- Description: {}", clip_chars(&issue.description, MAX_DESCRIPTION_CHARS));
    let _ = writeln!(prompt, "- Priority: {}", issue.priority);
    let _ = writeln!(prompt, "- Status: {}", issue.status);
    if !issue.acceptance_criteria.is_empty() {
        prompt.push_str("- Acceptance criteria:\n");
        for criterion in &issue.acceptance_criteria {
            let _ = writeln!(prompt, "  - {}", criterion);
        }
    }

    prompt.push_str("\nPULL REQUEST:\n");
    let _ = writeln!(prompt, "- Title: {}", pr.title);
    let _ = writeln!(prompt, "- Description: {}", pr.body.as_deref().unwrap_or("N/A"));
    let _ = writeln!(prompt, "- Files changed: {}", pr.changed_files);
    let _ = writeln!(prompt, "- Additions: {}", pr.additions);
    let _ = writeln!(prompt, "- Deletions: {}", pr.deletions);
    let _ = writeln!(prompt, "- State: {}", pr.state);

    prompt.push_str("\nDIFF:\n");
    match diff.char_indices().nth(MAX_DIFF_CHARS) {
        Some((idx, _)) => {
            prompt.push_str(&diff[..idx]);
            prompt.push_str("\n\n... (diff truncated)\n");
        }
        None => {
            prompt.push_str(diff);
            prompt.push('\n');
        }
    }

    prompt.push_str(
        "\nAnswer in exactly this format:\n\
         VALIDATION_STATUS: APPROVED | NEEDS_CHANGES | REJECTED\n\
         COMPLETENESS_SCORE: 0-100\n\
         MERGE_RECOMMENDATION: READY_TO_MERGE | NEEDS_IMPROVEMENTS | MAJOR_CHANGES_REQUIRED\n\
         MISSING_REQUIREMENTS:\n- ...\n\
         SUGGESTIONS:\n- ...\n\
         CODE_QUALITY_ISSUES:\n- ...\n\
         MERGE_BLOCKERS:\n- ...\n\
         DETAILED_FEEDBACK:\n...\n",
    );
    prompt
}

fn clip_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
