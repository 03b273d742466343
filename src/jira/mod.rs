//! Jira Cloud integration

pub mod adf;
pub mod client;
pub mod models;

pub use client::{build_jql, validate_issue_key, validate_project_key, JiraClient};
pub use models::{Attachment, AttachmentContent, Board, Comment, Issue, Project};
