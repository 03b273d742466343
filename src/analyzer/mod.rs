//! Repository analysis: which files a ticket most likely touches
//!
//! The analyzer walks one GitHub repository per request. Nothing is kept
//! between scans apart from whatever the GitHub response cache holds.

pub mod framework;
pub mod keywords;
pub mod scoring;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::github::models::Languages;
use crate::github::{parse_repo_url, GitHubClient, RepoInfo, RepoRef, TreeEntry};

pub use framework::{detect_framework, Framework};
pub use keywords::{extract_keywords, KeywordCategories};
pub use scoring::{classify_file_type, FileCandidate, KeywordScorer, Priority, RelevanceScorer};

/// Repository metadata carried in a scan result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositorySummary {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stars: u64,
    pub default_branch: String,
    pub url: String,
}

impl RepositorySummary {
    fn from_info(info: RepoInfo, repo_ref: &RepoRef) -> Self {
        let full_name = info.full_name.unwrap_or_else(|| repo_ref.to_string());
        let url = info
            .html_url
            .unwrap_or_else(|| format!("https://github.com/{}", full_name));
        Self {
            name: info.name,
            full_name,
            description: info.description,
            language: info.language,
            stars: info.stars,
            default_branch: info.default_branch,
            url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelevantFile {
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub priority: Priority,
    pub score: f64,
    pub size: Option<u64>,
}

/// Ephemeral result of one repository scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryScanResult {
    pub repository: RepositorySummary,
    pub framework: Framework,
    pub languages: Languages,
    pub relevant_files: Vec<RelevantFile>,
    pub keyword_categories: KeywordCategories,
    /// Number of files whose content was fetched and re-scored
    pub files_scanned: usize,
    pub tree_truncated: bool,
}

/// Scans a GitHub repository against a ticket's text
pub struct RepositoryAnalyzer {
    github: Arc<GitHubClient>,
    scorer: Arc<dyn RelevanceScorer>,
    config: AnalyzerConfig,
}

impl RepositoryAnalyzer {
    pub fn new(github: Arc<GitHubClient>, config: AnalyzerConfig) -> Self {
        Self::with_scorer(github, Arc::new(KeywordScorer::default()), config)
    }

    pub fn with_scorer(
        github: Arc<GitHubClient>,
        scorer: Arc<dyn RelevanceScorer>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            github,
            scorer,
            config,
        }
    }

    /// Scan `repo_url` for files relevant to the given ticket text
    pub async fn scan(&self, repo_url: &str, summary: &str, description: &str) -> Result<RepositoryScanResult> {
        let repo_ref = parse_repo_url(repo_url)?;
        let (owner, repo) = (repo_ref.owner.as_str(), repo_ref.repo.as_str());
        info!("Scanning repository {}", repo_ref);

        let info = self.github.get_repository(owner, repo).await?;
        let keywords = extract_keywords(summary, description);
        debug!("Extracted {} keyword categories", keywords.len());

        let (tree, languages) = tokio::join!(
            self.github.get_tree(owner, repo, &info.default_branch),
            self.github.get_languages(owner, repo)
        );
        let tree = tree?;
        let languages = languages.unwrap_or_else(|e| {
            warn!("Language breakdown unavailable for {}: {}", repo_ref, e);
            Languages::new()
        });
        if tree.truncated {
            warn!("Tree listing for {} was truncated by GitHub", repo_ref);
        }

        let framework = self.detect_framework(owner, repo, &tree.entries).await;

        let mut candidates = self.rank_by_path(&tree.entries, &keywords);
        let files_scanned = self.fetch_contents(owner, repo, &mut candidates).await;

        let mut scored: Vec<(FileCandidate, f64)> = candidates
            .into_iter()
            .map(|file| {
                let score = self.scorer.score(&file, &keywords);
                (file, score)
            })
            .collect();
        sort_by_score(&mut scored);

        let relevant_files = scored
            .into_iter()
            .take(self.config.max_relevant_files)
            .map(|(file, score)| RelevantFile {
                file_type: classify_file_type(&file.path).to_string(),
                priority: Priority::from_score(score),
                score: (score * 100.0).round() / 100.0,
                size: file.size,
                path: file.path,
            })
            .collect::<Vec<_>>();

        info!(
            "Scan of {} complete: framework={}, {} relevant files, {} fetched",
            repo_ref,
            framework,
            relevant_files.len(),
            files_scanned
        );

        Ok(RepositoryScanResult {
            repository: RepositorySummary::from_info(info, &repo_ref),
            framework,
            languages,
            relevant_files,
            keyword_categories: keywords,
            files_scanned,
            tree_truncated: tree.truncated,
        })
    }

    async fn detect_framework(&self, owner: &str, repo: &str, entries: &[TreeEntry]) -> Framework {
        let mut detected = detect_framework(entries);
        let has_root = |name: &str| entries.iter().any(|e| e.is_blob() && e.path == name);

        if has_root(framework::PACKAGE_JSON) {
            match self.github.get_file_content(owner, repo, framework::PACKAGE_JSON).await {
                Ok(Some(manifest)) => detected = framework::refine_with_package_json(detected, &manifest),
                Ok(None) => {}
                Err(e) => debug!("Could not read package.json: {}", e),
            }
        }
        if has_root(framework::REQUIREMENTS_TXT) && matches!(detected, Framework::Python | Framework::Unknown | Framework::Flask) {
            match self.github.get_file_content(owner, repo, framework::REQUIREMENTS_TXT).await {
                Ok(Some(reqs)) => detected = framework::refine_with_requirements(detected, &reqs),
                Ok(None) => {}
                Err(e) => debug!("Could not read requirements.txt: {}", e),
            }
        }
        detected
    }

    /// Score every eligible blob by path and keep the best `max_candidates`
    fn rank_by_path(&self, entries: &[TreeEntry], keywords: &KeywordCategories) -> Vec<FileCandidate> {
        let mut scored: Vec<(FileCandidate, f64)> = entries
            .iter()
            .filter(|e| e.is_blob() && !scoring::should_skip(&e.path))
            .map(|e| {
                let file = FileCandidate::new(e.path.clone(), e.size);
                let score = self.scorer.score(&file, keywords);
                (file, score)
            })
            .collect();
        sort_by_score(&mut scored);
        scored
            .into_iter()
            .take(self.config.max_candidates)
            .map(|(file, _)| file)
            .collect()
    }

    /// Fetch content for the top candidates that fit the size limit.
    /// Individual fetch failures only mean that file is scored by path.
    async fn fetch_contents(&self, owner: &str, repo: &str, candidates: &mut [FileCandidate]) -> usize {
        let max_size = self.config.max_file_size_bytes;
        let selected: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, f)| f.size.map_or(true, |s| s <= max_size))
            .map(|(idx, _)| idx)
            .take(self.config.max_files_to_fetch)
            .collect();

        let fetched: Vec<(usize, Option<String>)> = stream::iter(selected)
            .map(|idx| {
                let path = candidates[idx].path.clone();
                async move {
                    match self.github.get_file_content(owner, repo, &path).await {
                        Ok(content) => (idx, content),
                        Err(e) => {
                            debug!("Skipping content of {}: {}", path, e);
                            (idx, None)
                        }
                    }
                }
            })
            .buffered(self.config.fetch_concurrency.max(1))
            .collect()
            .await;

        let mut count = 0;
        for (idx, content) in fetched {
            if let Some(content) = content {
                candidates[idx].content = Some(content);
                count += 1;
            }
        }
        count
    }
}

/// Highest score first; ties broken by path for a stable order
fn sort_by_score(scored: &mut [(FileCandidate, f64)]) {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.path.cmp(&b.0.path))
    });
}
