//! GitHub repository access

pub mod cache;
pub mod client;
pub mod models;
pub mod url;

pub use client::{GitHubClient, RepoTree};
pub use models::{PullRequest, RepoInfo, TreeEntry};
pub use self::url::{parse_pull_request_url, parse_repo_url, PullRequestRef, RepoRef};
