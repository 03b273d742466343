//! Prompt → generation → plan, with one simplified retry on empty output

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::prompt::{PromptBuilder, PromptContext};
use crate::analyzer::RepositoryScanResult;
use crate::config::PlannerConfig;
use crate::error::{PlannerError, Result};
use crate::granite::TextGenerator;
use crate::jira::{Comment, Issue};
use crate::metrics::METRICS;

/// Raw plan text as produced by the model
#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    pub plan_text: String,
    pub model_used: String,
    pub generated_at: DateTime<Utc>,
    pub repository_analyzed: bool,
    /// The simplified prompt produced the text
    pub simplified: bool,
}

pub struct PlanAssembler {
    generator: Arc<dyn TextGenerator>,
    prompts: PromptBuilder,
    config: PlannerConfig,
}

impl PlanAssembler {
    pub fn new(generator: Arc<dyn TextGenerator>, config: PlannerConfig) -> Self {
        Self {
            generator,
            prompts: PromptBuilder::new(&config),
            config,
        }
    }

    pub fn model_id(&self) -> &str {
        self.generator.model_id()
    }

    /// Generate a plan for `issue`.
    ///
    /// Generation errors propagate as-is. Only an empty result triggers the
    /// retry, which drops repository context and discussion; a second empty
    /// result fails with `PlanGeneration`.
    pub async fn generate_plan(
        &self,
        issue: &Issue,
        scan: Option<&RepositoryScanResult>,
        discussion: &[Comment],
    ) -> Result<GeneratedPlan> {
        let prompt = self.prompts.build(&PromptContext {
            issue,
            scan,
            discussion,
        });
        info!(
            "Generating plan for {} ({} prompt chars, repository context: {})",
            issue.key,
            prompt.len(),
            scan.is_some()
        );

        let text = self
            .generator
            .generate(&prompt, self.config.max_tokens, self.config.temperature)
            .await
            .map_err(|e| {
                METRICS.record_plan("error");
                e
            })?;

        let (text, simplified) = if text.trim().is_empty() {
            warn!("Empty plan for {}, retrying with a simplified prompt", issue.key);
            METRICS.record_plan_retry();

            let simple = self.prompts.build_simple(issue);
            let retry = self
                .generator
                .generate(&simple, self.config.retry_max_tokens, self.config.retry_temperature)
                .await
                .map_err(|e| {
                    METRICS.record_plan("error");
                    e
                })?;
            if retry.trim().is_empty() {
                METRICS.record_plan("empty");
                return Err(PlannerError::PlanGeneration(format!(
                    "model returned an empty plan for {} twice, including the simplified retry",
                    issue.key
                )));
            }
            (retry, true)
        } else {
            (text, false)
        };

        METRICS.record_plan(if simplified { "retried" } else { "success" });
        Ok(GeneratedPlan {
            plan_text: text.trim().to_string(),
            model_used: self.generator.model_id().to_string(),
            generated_at: Utc::now(),
            repository_analyzed: scan.is_some(),
            simplified,
        })
    }
}
