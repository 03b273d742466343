//! GitHub repository and pull-request URL parsing

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};

static HTTPS_REPO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?github\.com/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?(?:/.*)?$")
        .expect("valid https repo regex")
});

static SSH_REPO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^git@github\.com:([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?/?$")
        .expect("valid ssh repo regex")
});

static PULL_REQUEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?github\.com/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)/pull/(\d+)(?:[/?#].*)?$")
        .expect("valid pull request regex")
});

/// Owner and name of a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A pull request reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

/// Parse `https://github.com/{owner}/{repo}[.git][/...]` or
/// `git@github.com:{owner}/{repo}[.git]`
pub fn parse_repo_url(url: &str) -> Result<RepoRef> {
    let url = url.trim();
    let captures = HTTPS_REPO
        .captures(url)
        .or_else(|| SSH_REPO.captures(url))
        .ok_or_else(|| PlannerError::InvalidUrl(format!("not a GitHub repository URL: '{}'", url)))?;

    let owner = captures[1].to_string();
    let repo = captures[2].to_string();
    if repo.is_empty() || repo == "." || repo == ".." || owner == "." || owner == ".." {
        return Err(PlannerError::InvalidUrl(format!(
            "not a GitHub repository URL: '{}'",
            url
        )));
    }
    Ok(RepoRef { owner, repo })
}

/// Parse `https://github.com/{owner}/{repo}/pull/{n}[/...]`
pub fn parse_pull_request_url(url: &str) -> Result<PullRequestRef> {
    let url = url.trim();
    let captures = PULL_REQUEST
        .captures(url)
        .ok_or_else(|| PlannerError::InvalidUrl(format!("not a GitHub pull request URL: '{}'", url)))?;

    let number = captures[3]
        .parse()
        .map_err(|_| PlannerError::InvalidUrl(format!("bad pull request number in '{}'", url)))?;

    Ok(PullRequestRef {
        owner: captures[1].to_string(),
        repo: captures[2].to_string(),
        number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme_widgets() -> RepoRef {
        RepoRef {
            owner: "acme".into(),
            repo: "widgets".into(),
        }
    }

    #[test]
    fn test_parse_https_urls() {
        assert_eq!(parse_repo_url("https://github.com/acme/widgets").unwrap(), acme_widgets());
        assert_eq!(parse_repo_url("https://github.com/acme/widgets.git").unwrap(), acme_widgets());
        assert_eq!(parse_repo_url("https://github.com/acme/widgets/").unwrap(), acme_widgets());
        assert_eq!(
            parse_repo_url("https://github.com/acme/widgets/tree/main/src").unwrap(),
            acme_widgets()
        );
        assert_eq!(parse_repo_url("github.com/acme/widgets").unwrap(), acme_widgets());
    }

    #[test]
    fn test_parse_ssh_url() {
        assert_eq!(parse_repo_url("git@github.com:acme/widgets.git").unwrap(), acme_widgets());
        assert_eq!(parse_repo_url("git@github.com:acme/widgets").unwrap(), acme_widgets());
    }

    #[test]
    fn test_dotted_repo_names() {
        let parsed = parse_repo_url("https://github.com/acme/widgets.js").unwrap();
        assert_eq!(parsed.repo, "widgets.js");
    }

    #[test]
    fn test_rejects_non_github() {
        assert!(matches!(
            parse_repo_url("not a url"),
            Err(PlannerError::InvalidUrl(_))
        ));
        assert!(parse_repo_url("https://gitlab.com/acme/widgets").is_err());
        assert!(parse_repo_url("https://github.com/acme").is_err());
    }

    #[test]
    fn test_parse_pull_request_url() {
        let pr = parse_pull_request_url("https://github.com/acme/widgets/pull/42/files").unwrap();
        assert_eq!(pr.owner, "acme");
        assert_eq!(pr.repo, "widgets");
        assert_eq!(pr.number, 42);

        assert!(parse_pull_request_url("https://github.com/acme/widgets").is_err());
        assert!(parse_pull_request_url("https://github.com/acme/widgets/pull/abc").is_err());
    }
}
