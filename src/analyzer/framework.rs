//! Framework detection from a repository tree and its manifests

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::github::TreeEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Framework {
    #[serde(rename = "next.js")]
    NextJs,
    #[serde(rename = "react")]
    React,
    #[serde(rename = "vue")]
    Vue,
    #[serde(rename = "angular")]
    Angular,
    #[serde(rename = "express")]
    Express,
    #[serde(rename = "django")]
    Django,
    #[serde(rename = "flask")]
    Flask,
    #[serde(rename = "fastapi")]
    FastApi,
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "node")]
    Node,
    #[serde(rename = "rust")]
    Rust,
    #[serde(rename = "go")]
    Go,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::NextJs => "next.js",
            Framework::React => "react",
            Framework::Vue => "vue",
            Framework::Angular => "angular",
            Framework::Express => "express",
            Framework::Django => "django",
            Framework::Flask => "flask",
            Framework::FastApi => "fastapi",
            Framework::Python => "python",
            Framework::Node => "node",
            Framework::Rust => "rust",
            Framework::Go => "go",
            Framework::Unknown => "unknown",
        }
    }

    /// Generic guesses that a manifest may sharpen
    fn is_generic(&self) -> bool {
        matches!(self, Framework::Python | Framework::Node | Framework::Unknown)
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manifest files worth fetching to refine a tree-based guess
pub const PACKAGE_JSON: &str = "package.json";
pub const REQUIREMENTS_TXT: &str = "requirements.txt";

/// Guess the framework from file names alone
pub fn detect_framework(entries: &[TreeEntry]) -> Framework {
    let blobs: Vec<&TreeEntry> = entries.iter().filter(|e| e.is_blob()).collect();
    let has_file = |name: &str| blobs.iter().any(|e| e.file_name() == name);
    let has_root_file = |name: &str| blobs.iter().any(|e| e.path == name);
    let has_prefix = |prefix: &str| blobs.iter().any(|e| e.file_name().starts_with(prefix));
    let has_ext = |ext: &str| blobs.iter().any(|e| e.path.ends_with(ext));
    let has_dir = |dir: &str| {
        entries
            .iter()
            .any(|e| e.path == dir || e.path.starts_with(&format!("{}/", dir)) || e.path.contains(&format!("/{}/", dir)))
    };

    if has_root_file("Cargo.toml") {
        return Framework::Rust;
    }
    if has_root_file("go.mod") {
        return Framework::Go;
    }
    if has_file("angular.json") {
        return Framework::Angular;
    }
    if has_prefix("next.config.") {
        return Framework::NextJs;
    }
    if has_ext(".vue") {
        return Framework::Vue;
    }
    if has_ext(".tsx") || has_ext(".jsx") {
        return Framework::React;
    }
    if has_file("manage.py") || has_file("settings.py") {
        return Framework::Django;
    }
    if has_file("app.py") || has_file("routes.py") {
        return Framework::Flask;
    }
    if has_ext(".py") {
        return Framework::Python;
    }
    if has_root_file(PACKAGE_JSON) || has_dir("node_modules") {
        return Framework::Node;
    }
    Framework::Unknown
}

/// Sharpen a guess using `package.json` dependencies
pub fn refine_with_package_json(current: Framework, manifest: &str) -> Framework {
    let Ok(value) = serde_json::from_str::<Value>(manifest) else {
        return current;
    };
    let has_dep = |name: &str| {
        ["dependencies", "devDependencies", "peerDependencies"]
            .iter()
            .any(|section| value.get(section).and_then(|deps| deps.get(name)).is_some())
    };

    if has_dep("next") {
        Framework::NextJs
    } else if has_dep("@angular/core") {
        Framework::Angular
    } else if has_dep("vue") || has_dep("nuxt") {
        Framework::Vue
    } else if has_dep("react") {
        Framework::React
    } else if has_dep("express") && current.is_generic() {
        Framework::Express
    } else if current == Framework::Unknown {
        Framework::Node
    } else {
        current
    }
}

/// Sharpen a Python guess using `requirements.txt`
pub fn refine_with_requirements(current: Framework, requirements: &str) -> Framework {
    let packages: Vec<String> = requirements
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty() && !line.starts_with('-'))
        .map(|line| {
            line.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
                .next()
                .unwrap_or("")
                .to_lowercase()
        })
        .collect();
    let has = |name: &str| packages.iter().any(|p| p == name);

    if has("django") {
        Framework::Django
    } else if has("fastapi") {
        Framework::FastApi
    } else if has("flask") {
        Framework::Flask
    } else if current == Framework::Unknown && !packages.is_empty() {
        Framework::Python
    } else {
        current
    }
}
