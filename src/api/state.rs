//! Shared handler state, built once at startup

use std::sync::Arc;
use tracing::{info, warn};

use crate::analyzer::RepositoryAnalyzer;
use crate::config::Config;
use crate::credentials::{self, Credentials};
use crate::error::{PlannerError, Result};
use crate::github::GitHubClient;
use crate::granite::{GraniteClient, TextGenerator};
use crate::jira::JiraClient;
use crate::planner::{PlanAssembler, PlanningService};
use crate::review::PullRequestReviewer;

/// Upstream clients handed to the router. Jira and Granite are optional;
/// GitHub works anonymously.
pub struct Services {
    pub jira: Option<Arc<JiraClient>>,
    pub github: Arc<GitHubClient>,
    /// Concrete Granite client, used for the connectivity probe
    pub granite: Option<Arc<GraniteClient>>,
    /// Generation backend for plans and reviews
    pub generator: Option<Arc<dyn TextGenerator>>,
}

#[derive(Clone)]
pub struct AppState {
    pub jira: Option<Arc<JiraClient>>,
    pub github: Arc<GitHubClient>,
    pub granite: Option<Arc<GraniteClient>>,
    pub analyzer: Arc<RepositoryAnalyzer>,
    pub planner: Option<Arc<PlanningService>>,
    pub reviewer: Arc<PullRequestReviewer>,
    pub config: Arc<Config>,
    jira_missing: Vec<&'static str>,
    granite_missing: Vec<&'static str>,
}

impl AppState {
    /// Build every client the credentials allow; missing credentials only
    /// disable the affected routes
    pub fn from_config(config: Config, credentials: &Credentials) -> Result<Self> {
        let mut jira_missing = Vec::new();
        let jira = match credentials.jira() {
            Ok(creds) => Some(Arc::new(JiraClient::new(config.jira.clone(), creds)?)),
            Err(PlannerError::NotConfigured { missing, .. }) => {
                warn!("Jira disabled: missing {}", missing.join(", "));
                jira_missing = missing;
                None
            }
            Err(e) => return Err(e),
        };

        let github = Arc::new(GitHubClient::new(&config.github, credentials.github_token())?);

        let mut granite_missing = Vec::new();
        let granite = match credentials.granite() {
            Ok(creds) => Some(Arc::new(GraniteClient::new(config.granite.clone(), creds)?)),
            Err(PlannerError::NotConfigured { missing, .. }) => {
                warn!("IBM Granite disabled: missing {}", missing.join(", "));
                granite_missing = missing;
                None
            }
            Err(e) => return Err(e),
        };
        let generator = granite.clone().map(|g| g as Arc<dyn TextGenerator>);

        let mut state = Self::with_services(
            config,
            Services {
                jira,
                github,
                granite,
                generator,
            },
        );
        state.jira_missing = jira_missing;
        state.granite_missing = granite_missing;

        info!("Services configured: {:?}", credentials.summary());
        Ok(state)
    }

    /// Wire handler state from prebuilt clients
    pub fn with_services(config: Config, services: Services) -> Self {
        let analyzer = Arc::new(RepositoryAnalyzer::new(
            services.github.clone(),
            config.analyzer.clone(),
        ));

        let planner = match (&services.jira, &services.generator) {
            (Some(jira), Some(generator)) => {
                let assembler = Arc::new(PlanAssembler::new(generator.clone(), config.planner.clone()));
                let max_comments = if config.planner.include_discussion {
                    config.jira.max_comments
                } else {
                    0
                };
                Some(Arc::new(PlanningService::new(
                    jira.clone(),
                    analyzer.clone(),
                    assembler,
                    max_comments,
                )))
            }
            _ => None,
        };

        let reviewer = Arc::new(PullRequestReviewer::new(
            services.github.clone(),
            services.generator.clone(),
        ));

        Self {
            jira_missing: if services.jira.is_some() {
                Vec::new()
            } else {
                vec![credentials::JIRA_URL, credentials::JIRA_EMAIL, credentials::JIRA_API_TOKEN]
            },
            granite_missing: if services.generator.is_some() {
                Vec::new()
            } else {
                vec![credentials::IBM_GRANITE_API_KEY, credentials::IBM_PROJECT_ID]
            },
            jira: services.jira,
            github: services.github,
            granite: services.granite,
            analyzer,
            planner,
            reviewer,
            config: Arc::new(config),
        }
    }

    pub fn jira(&self) -> Result<&Arc<JiraClient>> {
        self.jira.as_ref().ok_or_else(|| self.jira_not_configured())
    }

    /// Planning needs both Jira and a generation backend
    pub fn planner(&self) -> Result<&Arc<PlanningService>> {
        self.jira()?;
        self.planner.as_ref().ok_or_else(|| self.granite_not_configured())
    }

    pub fn jira_not_configured(&self) -> PlannerError {
        PlannerError::NotConfigured {
            service: "Jira",
            missing: self.jira_missing.clone(),
        }
    }

    pub fn granite_not_configured(&self) -> PlannerError {
        PlannerError::NotConfigured {
            service: "IBM Granite",
            missing: self.granite_missing.clone(),
        }
    }
}
