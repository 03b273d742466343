//! Upstream credentials loaded once at startup
//!
//! Every field is optional. A service whose required subset is missing stays
//! disabled and reports `NotConfigured` when used instead of crashing the
//! process.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::error::{PlannerError, Result};

pub const JIRA_URL: &str = "JIRA_URL";
pub const JIRA_EMAIL: &str = "JIRA_EMAIL";
pub const JIRA_API_TOKEN: &str = "JIRA_API_TOKEN";
pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const IBM_GRANITE_API_KEY: &str = "IBM_GRANITE_API_KEY";
pub const IBM_PROJECT_ID: &str = "IBM_PROJECT_ID";

/// Raw credential set
#[derive(Default)]
pub struct Credentials {
    pub jira_base_url: Option<String>,
    pub jira_email: Option<String>,
    pub jira_api_token: Option<SecretString>,
    pub github_token: Option<SecretString>,
    pub ibm_api_key: Option<SecretString>,
    pub ibm_project_id: Option<String>,
}

/// Everything the Jira client needs
pub struct JiraCredentials {
    pub base_url: String,
    pub email: String,
    pub api_token: SecretString,
}

/// Everything the Granite client needs
pub struct GraniteCredentials {
    pub api_key: SecretString,
    pub project_id: String,
}

/// Which services have their credentials in place
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CredentialSummary {
    pub jira: bool,
    pub github: bool,
    pub granite: bool,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("jira_base_url", &self.jira_base_url)
            .field("jira_email", &self.jira_email)
            .field("jira_api_token", &self.jira_api_token.as_ref().map(|_| "[REDACTED]"))
            .field("github_token", &self.github_token.as_ref().map(|_| "[REDACTED]"))
            .field("ibm_api_key", &self.ibm_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("ibm_project_id", &self.ibm_project_id)
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through an arbitrary lookup; blank values count as absent
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            jira_base_url: read(JIRA_URL).map(|u| u.trim_end_matches('/').to_string()),
            jira_email: read(JIRA_EMAIL),
            jira_api_token: read(JIRA_API_TOKEN).map(SecretString::new),
            github_token: read(GITHUB_TOKEN).map(SecretString::new),
            ibm_api_key: read(IBM_GRANITE_API_KEY).map(SecretString::new),
            ibm_project_id: read(IBM_PROJECT_ID),
        }
    }

    /// Jira credentials, or `NotConfigured` naming every missing variable
    pub fn jira(&self) -> Result<JiraCredentials> {
        let mut missing = Vec::new();
        if self.jira_base_url.is_none() {
            missing.push(JIRA_URL);
        }
        if self.jira_email.is_none() {
            missing.push(JIRA_EMAIL);
        }
        if self.jira_api_token.is_none() {
            missing.push(JIRA_API_TOKEN);
        }

        match (&self.jira_base_url, &self.jira_email, &self.jira_api_token) {
            (Some(base_url), Some(email), Some(token)) => Ok(JiraCredentials {
                base_url: base_url.clone(),
                email: email.clone(),
                api_token: SecretString::new(token.expose_secret().clone()),
            }),
            _ => Err(PlannerError::NotConfigured {
                service: "Jira",
                missing,
            }),
        }
    }

    /// Granite credentials; both the API key and the project id are required
    pub fn granite(&self) -> Result<GraniteCredentials> {
        match (&self.ibm_api_key, &self.ibm_project_id) {
            (Some(key), Some(project_id)) => Ok(GraniteCredentials {
                api_key: SecretString::new(key.expose_secret().clone()),
                project_id: project_id.clone(),
            }),
            (key, project_id) => {
                let mut missing = Vec::new();
                if key.is_none() {
                    missing.push(IBM_GRANITE_API_KEY);
                }
                if project_id.is_none() {
                    missing.push(IBM_PROJECT_ID);
                }
                Err(PlannerError::NotConfigured {
                    service: "IBM Granite",
                    missing,
                })
            }
        }
    }

    /// Optional GitHub token, copied out for the client
    pub fn github_token(&self) -> Option<SecretString> {
        self.github_token
            .as_ref()
            .map(|t| SecretString::new(t.expose_secret().clone()))
    }

    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            jira: self.jira().is_ok(),
            github: self.github_token.is_some(),
            granite: self.granite().is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_empty_environment_disables_everything() {
        let creds = Credentials::from_lookup(|_| None);
        let summary = creds.summary();
        assert!(!summary.jira);
        assert!(!summary.github);
        assert!(!summary.granite);

        match creds.jira() {
            Err(PlannerError::NotConfigured { missing, .. }) => {
                assert_eq!(missing, vec![JIRA_URL, JIRA_EMAIL, JIRA_API_TOKEN]);
            }
            _ => panic!("expected NotConfigured"),
        }
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let creds = Credentials::from_lookup(lookup(&[
            (IBM_GRANITE_API_KEY, "   "),
            (IBM_PROJECT_ID, "proj"),
        ]));
        match creds.granite() {
            Err(PlannerError::NotConfigured { missing, .. }) => {
                assert_eq!(missing, vec![IBM_GRANITE_API_KEY]);
            }
            _ => panic!("expected NotConfigured"),
        }
    }

    #[test]
    fn test_full_jira_credentials() {
        let creds = Credentials::from_lookup(lookup(&[
            (JIRA_URL, "https://acme.atlassian.net/"),
            (JIRA_EMAIL, "dev@acme.io"),
            (JIRA_API_TOKEN, "secret"),
        ]));
        let jira = creds.jira().unwrap();
        assert_eq!(jira.base_url, "https://acme.atlassian.net");
        assert_eq!(jira.api_token.expose_secret(), "secret");
        assert!(creds.summary().jira);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::from_lookup(lookup(&[(GITHUB_TOKEN, "ghp_supersecret")]));
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("ghp_supersecret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
