//! Service configuration
//!
//! Values come from an optional TOML file (`TICKET_PLANNER_CONFIG`, default
//! `config.toml`), then each section applies its environment overrides.
//! Credentials are not part of this tree; see [`crate::credentials`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_into<T: std::str::FromStr>(lookup: Lookup<'_>, name: &str, target: &mut T) {
    if let Some(val) = lookup(name) {
        if let Ok(parsed) = val.trim().parse() {
            *target = parsed;
        }
    }
}

fn string_into(lookup: Lookup<'_>, name: &str, target: &mut String) {
    if let Some(val) = lookup(name) {
        let val = val.trim();
        if !val.is_empty() {
            *target = val.to_string();
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub jira: JiraConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub granite: GraniteConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
}

impl Config {
    /// Load the config file (if present) and apply environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var("TICKET_PLANNER_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let loaded: Config = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .build()?
            .try_deserialize()?;
        Ok(loaded.from_env())
    }

    /// Apply environment overrides to every section
    pub fn from_env(self) -> Self {
        self.from_lookup(&env_lookup)
    }

    pub fn from_lookup(self, lookup: Lookup<'_>) -> Self {
        Self {
            server: self.server.from_lookup(lookup),
            logging: self.logging.from_lookup(lookup),
            jira: self.jira,
            github: self.github.from_lookup(lookup),
            granite: self.granite.from_lookup(lookup),
            analyzer: self.analyzer.from_lookup(lookup),
            planner: self.planner.from_lookup(lookup),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request body limit in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Allowed CORS origins; empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_max_body_bytes() -> usize { 1024 * 1024 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    fn from_lookup(mut self, lookup: Lookup<'_>) -> Self {
        string_into(lookup, "HOST", &mut self.host);
        parse_into(lookup, "PORT", &mut self.port);
        self
    }

    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    fn from_lookup(mut self, lookup: Lookup<'_>) -> Self {
        string_into(lookup, "LOG_LEVEL", &mut self.level);
        string_into(lookup, "LOG_FORMAT", &mut self.format);
        self
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Jira client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    #[serde(default = "default_metadata_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound on `maxResults` for searches
    #[serde(default = "default_max_search_results")]
    pub max_search_results: u32,

    /// Comments condensed into plan prompts
    #[serde(default = "default_max_comments")]
    pub max_comments: u32,
}

fn default_metadata_timeout() -> u64 { 10 }
fn default_max_search_results() -> u32 { 100 }
fn default_max_comments() -> u32 { 10 }

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_metadata_timeout(),
            max_search_results: default_max_search_results(),
            max_comments: default_max_comments(),
        }
    }
}

impl JiraConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// GitHub client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    #[serde(default = "default_metadata_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_github_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_github_cache_entries")]
    pub cache_max_entries: u64,
}

fn default_github_api_url() -> String { "https://api.github.com".to_string() }
fn default_true() -> bool { true }
fn default_github_cache_ttl() -> u64 { 300 }
fn default_github_cache_entries() -> u64 { 1000 }

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            request_timeout_secs: default_metadata_timeout(),
            cache_enabled: default_true(),
            cache_ttl_secs: default_github_cache_ttl(),
            cache_max_entries: default_github_cache_entries(),
        }
    }
}

impl GitHubConfig {
    fn from_lookup(mut self, lookup: Lookup<'_>) -> Self {
        string_into(lookup, "GITHUB_API_URL", &mut self.api_url);
        parse_into(lookup, "GITHUB_CACHE_TTL_SECS", &mut self.cache_ttl_secs);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// IBM IAM and Granite generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraniteConfig {
    /// watsonx.ai regional endpoint
    #[serde(default = "default_granite_base_url")]
    pub base_url: String,

    #[serde(default = "default_iam_url")]
    pub iam_url: String,

    #[serde(default = "default_model_id")]
    pub model_id: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Timeout for the IAM token exchange
    #[serde(default = "default_metadata_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for a generation call
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f64,

    /// Tokens are treated as expired this many seconds early
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,
}

fn default_granite_base_url() -> String { "https://eu-de.ml.cloud.ibm.com".to_string() }
fn default_iam_url() -> String { "https://iam.cloud.ibm.com/identity/token".to_string() }
fn default_model_id() -> String { "ibm/granite-3-8b-instruct".to_string() }
fn default_api_version() -> String { "2023-05-29".to_string() }
fn default_generation_timeout() -> u64 { 120 }
fn default_repetition_penalty() -> f64 { 1.1 }
fn default_refresh_margin() -> u64 { 300 }

impl Default for GraniteConfig {
    fn default() -> Self {
        Self {
            base_url: default_granite_base_url(),
            iam_url: default_iam_url(),
            model_id: default_model_id(),
            api_version: default_api_version(),
            request_timeout_secs: default_metadata_timeout(),
            generation_timeout_secs: default_generation_timeout(),
            repetition_penalty: default_repetition_penalty(),
            refresh_margin_secs: default_refresh_margin(),
        }
    }
}

impl GraniteConfig {
    pub fn from_env(self) -> Self {
        self.from_lookup(&env_lookup)
    }

    fn from_lookup(mut self, lookup: Lookup<'_>) -> Self {
        string_into(lookup, "IBM_GRANITE_ENDPOINT", &mut self.base_url);
        string_into(lookup, "IBM_IAM_URL", &mut self.iam_url);
        parse_into(lookup, "GRANITE_TIMEOUT_SECS", &mut self.generation_timeout_secs);
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    /// Full generation endpoint including the API version query
    pub fn generation_url(&self) -> String {
        format!(
            "{}/ml/v1/text/generation?version={}",
            self.base_url.trim_end_matches('/'),
            self.api_version
        )
    }
}

/// Repository scan limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Candidate files whose content is fetched for re-scoring
    #[serde(default = "default_max_files_to_fetch")]
    pub max_files_to_fetch: usize,

    /// Larger blobs are scored by path only
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,

    #[serde(default = "default_max_relevant_files")]
    pub max_relevant_files: usize,

    /// Path-scored candidates kept before content fetch
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

fn default_max_files_to_fetch() -> usize { 8 }
fn default_max_file_size_bytes() -> u64 { 50_000 }
fn default_max_relevant_files() -> usize { 10 }
fn default_max_candidates() -> usize { 50 }
fn default_fetch_concurrency() -> usize { 4 }

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_files_to_fetch: default_max_files_to_fetch(),
            max_file_size_bytes: default_max_file_size_bytes(),
            max_relevant_files: default_max_relevant_files(),
            max_candidates: default_max_candidates(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

impl AnalyzerConfig {
    fn from_lookup(mut self, lookup: Lookup<'_>) -> Self {
        parse_into(lookup, "ANALYZER_MAX_FILES", &mut self.max_files_to_fetch);
        parse_into(lookup, "ANALYZER_MAX_FILE_SIZE", &mut self.max_file_size_bytes);
        self
    }
}

/// Prompt and generation budgets for plan assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Hard ceiling on prompt length in characters
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_retry_max_tokens")]
    pub retry_max_tokens: u32,

    #[serde(default = "default_retry_temperature")]
    pub retry_temperature: f64,

    #[serde(default = "default_max_prompt_files")]
    pub max_prompt_files: usize,

    #[serde(default = "default_max_prompt_keyword_categories")]
    pub max_prompt_keyword_categories: usize,

    /// Condense recent Jira comments into the prompt
    #[serde(default = "default_true")]
    pub include_discussion: bool,
}

fn default_max_prompt_chars() -> usize { 8000 }
fn default_max_tokens() -> u32 { 1200 }
fn default_temperature() -> f64 { 0.1 }
fn default_retry_max_tokens() -> u32 { 800 }
fn default_retry_temperature() -> f64 { 0.2 }
fn default_max_prompt_files() -> usize { 5 }
fn default_max_prompt_keyword_categories() -> usize { 3 }

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: default_max_prompt_chars(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry_max_tokens: default_retry_max_tokens(),
            retry_temperature: default_retry_temperature(),
            max_prompt_files: default_max_prompt_files(),
            max_prompt_keyword_categories: default_max_prompt_keyword_categories(),
            include_discussion: default_true(),
        }
    }
}

impl PlannerConfig {
    fn from_lookup(mut self, lookup: Lookup<'_>) -> Self {
        parse_into(lookup, "PLANNER_MAX_PROMPT_CHARS", &mut self.max_prompt_chars);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.granite.model_id, "ibm/granite-3-8b-instruct");
        assert_eq!(config.granite.refresh_margin(), Duration::from_secs(300));
        assert_eq!(config.github.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.analyzer.max_files_to_fetch, 8);
        assert_eq!(config.analyzer.max_file_size_bytes, 50_000);
        assert_eq!(config.planner.max_prompt_chars, 8000);
        assert_eq!(config.planner.max_tokens, 1200);
    }

    #[test]
    fn test_generation_url() {
        let config = GraniteConfig::default();
        assert_eq!(
            config.generation_url(),
            "https://eu-de.ml.cloud.ibm.com/ml/v1/text/generation?version=2023-05-29"
        );
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "9100"),
            ("LOG_FORMAT", "json"),
            ("IBM_GRANITE_ENDPOINT", "http://localhost:1234/"),
            ("ANALYZER_MAX_FILES", "3"),
            ("PLANNER_MAX_PROMPT_CHARS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let lookup = |name: &str| vars.get(name).map(|v| v.to_string());

        let config = Config::default().from_lookup(&lookup);
        assert_eq!(config.server.port, 9100);
        assert!(config.logging.is_json());
        assert_eq!(config.granite.base_url, "http://localhost:1234");
        assert_eq!(config.analyzer.max_files_to_fetch, 3);
        // unparsable values keep the default
        assert_eq!(config.planner.max_prompt_chars, 8000);
    }

    #[test]
    fn test_partial_toml_section() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                "[analyzer]\nmax_files_to_fetch = 12\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.analyzer.max_files_to_fetch, 12);
        assert_eq!(config.analyzer.max_file_size_bytes, 50_000);
        assert_eq!(config.server.port, 8000);
    }
}
