//! File relevance scoring and classification

use serde::{Deserialize, Serialize};

use super::keywords::{all_keywords, KeywordCategories};

/// A repository file under consideration
#[derive(Debug, Clone, Default)]
pub struct FileCandidate {
    pub path: String,
    pub size: Option<u64>,
    /// Decoded content, once fetched
    pub content: Option<String>,
}

impl FileCandidate {
    pub fn new(path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            size,
            content: None,
        }
    }
}

/// Strategy for ranking files against ticket keywords.
///
/// Scores are heuristic and must be finite and non-negative.
pub trait RelevanceScorer: Send + Sync {
    fn score(&self, file: &FileCandidate, keywords: &KeywordCategories) -> f64;
}

/// How urgently a file likely needs changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            Priority::Critical
        } else if score >= 5.0 {
            Priority::High
        } else if score >= 2.0 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

/// Default scorer: extension weight, keyword hits in the path and content,
/// and a small bonus for conventional source locations
#[derive(Debug, Clone)]
pub struct KeywordScorer {
    pub path_hit: f64,
    pub content_hit: f64,
    pub content_cap: f64,
    pub location_bonus: f64,
}

impl Default for KeywordScorer {
    fn default() -> Self {
        Self {
            path_hit: 2.0,
            content_hit: 0.5,
            content_cap: 2.0,
            location_bonus: 0.5,
        }
    }
}

const SOURCE_LOCATIONS: &[&str] = &[
    "src/", "app/", "pages/", "components/", "lib/", "views/", "services/", "api/",
];

impl RelevanceScorer for KeywordScorer {
    fn score(&self, file: &FileCandidate, keywords: &KeywordCategories) -> f64 {
        let path = file.path.to_lowercase();
        let mut score = extension_weight(&path);

        if SOURCE_LOCATIONS.iter().any(|loc| path.starts_with(loc) || path.contains(&format!("/{}", loc))) {
            score += self.location_bonus;
        }

        let content = file.content.as_ref().map(|c| c.to_lowercase());
        for keyword in all_keywords(keywords) {
            if keyword.len() < 2 {
                continue;
            }
            if path.contains(keyword) {
                score += self.path_hit;
            }
            if let Some(content) = &content {
                let hits = content.matches(keyword).count() as f64;
                score += (hits * self.content_hit).min(self.content_cap);
            }
        }

        if score.is_finite() {
            score.max(0.0)
        } else {
            0.0
        }
    }
}

fn extension_weight(path: &str) -> f64 {
    match extension(path) {
        "tsx" | "jsx" | "vue" | "svelte" => 3.0,
        "ts" | "js" | "py" | "rs" | "go" | "java" | "kt" | "rb" | "php" | "cs" => 2.5,
        "css" | "scss" | "sass" | "less" => 2.0,
        "html" | "hbs" | "ejs" => 1.5,
        "json" | "yaml" | "yml" | "toml" => 1.0,
        _ => 0.5,
    }
}

fn extension(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[idx + 1..],
        _ => "",
    }
}

/// Directories never worth scanning
const SKIPPED_DIRS: &[&str] = &[
    "node_modules/",
    ".git/",
    "dist/",
    "build/",
    ".next/",
    "coverage/",
    "__pycache__/",
    ".cache/",
    "vendor/",
    "target/",
    ".venv/",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "bmp", "pdf", "zip", "gz", "tar", "jar",
    "woff", "woff2", "ttf", "eot", "otf", "mp3", "mp4", "mov", "webm", "wasm", "so", "dll",
    "exe", "bin", "lock",
];

/// Vendored, generated and binary files are never candidates
pub fn should_skip(path: &str) -> bool {
    let lower = path.to_lowercase();
    if SKIPPED_DIRS
        .iter()
        .any(|dir| lower.starts_with(dir) || lower.contains(&format!("/{}", dir)))
    {
        return true;
    }
    if lower.ends_with(".min.js") || lower.ends_with(".map") {
        return true;
    }
    BINARY_EXTENSIONS.contains(&extension(&lower))
}

const CONFIG_FILES: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "webpack.config.js",
    "next.config.js",
    "next.config.mjs",
    "tailwind.config.js",
    "babel.config.js",
    "vite.config.ts",
    "vite.config.js",
    "angular.json",
    "requirements.txt",
    "pyproject.toml",
    "setup.py",
    "cargo.toml",
    "go.mod",
    ".env",
];

/// Coarse file category used in scan results and prompts
pub fn classify_file_type(path: &str) -> &'static str {
    let lower = path.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or(&lower);
    let ext = extension(&lower);

    if CONFIG_FILES.contains(&name) {
        return "config";
    }
    if is_test_path(&lower) {
        return "test";
    }
    if ["component", "widget", "element"].iter().any(|t| lower.contains(t)) {
        return "component";
    }
    if ["page", "view", "screen"].iter().any(|t| lower.contains(t)) {
        return "page";
    }
    if ["css", "scss", "sass", "less", "styl"].contains(&ext) {
        return "style";
    }
    if ["api", "service", "endpoint", "controller", "route"].iter().any(|t| lower.contains(t)) {
        return "api";
    }
    if ["util", "helper", "lib/", "common"].iter().any(|t| lower.contains(t)) {
        return "utility";
    }

    match ext {
        "tsx" | "jsx" => "react_component",
        "vue" => "vue_component",
        "ts" => "typescript",
        "js" => "javascript",
        "py" => "python",
        "rs" => "rust",
        "go" => "go",
        "html" => "template",
        "json" => "data",
        "md" => "documentation",
        _ => "unknown",
    }
}

/// Test directories, or a file name with a `test` / `spec` word in it
fn is_test_path(lower: &str) -> bool {
    let mut segments: Vec<&str> = lower.split('/').collect();
    let name = segments.pop().unwrap_or_default();
    if segments
        .iter()
        .any(|dir| matches!(*dir, "test" | "tests" | "__tests__" | "spec" | "specs"))
    {
        return true;
    }
    name.split(['.', '_', '-'])
        .any(|word| matches!(word, "test" | "tests" | "spec"))
}
