//! Keyword extraction from ticket text
//!
//! A fixed table of categories, each with plain words and short regex
//! patterns, plus a free-form `terms` bucket for the remaining significant
//! words. Matching is deliberately loose; the output only steers file
//! scoring and prompt context.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Category name to keywords, in table order
pub type KeywordCategories = IndexMap<String, Vec<String>>;

pub const TERMS_CATEGORY: &str = "terms";

const MAX_TERMS: usize = 15;
const MIN_TERM_LEN: usize = 4;

struct Category {
    name: &'static str,
    words: &'static [&'static str],
    /// (pattern, keyword recorded on match)
    patterns: &'static [(&'static str, &'static str)],
}

const CATEGORIES: &[Category] = &[
    Category {
        name: "ui_components",
        words: &[
            "button", "form", "input", "modal", "dialog", "component", "widget", "card", "table",
            "list", "dropdown", "checkbox", "tooltip", "icon",
        ],
        patterns: &[
            (r"\b(?:create|add|build)\W+(?:\w+\W+){0,3}components?\b", "component"),
            (r"\bnew\W+(?:\w+\W+){0,2}forms?\b", "form"),
            (r"\bbuild\W+(?:\w+\W+){0,2}ui\b", "ui"),
        ],
    },
    Category {
        name: "functionality",
        words: &["function", "feature", "behavior", "behaviour", "action", "operation"],
        patterns: &[
            (r"\bimplement\W+(?:\w+\W+){0,3}features?\b", "feature"),
            (r"\badd\W+(?:\w+\W+){0,3}functionality\b", "functionality"),
        ],
    },
    Category {
        name: "data_flow",
        words: &["data", "fetch", "load", "save", "store", "database", "model", "cache", "state"],
        patterns: &[
            (r"\bfetch\W+(?:\w+\W+){0,2}data\b", "fetch"),
            (r"\bsave\W+(?:\w+\W+){0,3}to\b", "save"),
            (r"\bload\W+(?:\w+\W+){0,3}from\b", "load"),
        ],
    },
    Category {
        name: "navigation",
        words: &[
            "navigate", "navigation", "route", "page", "redirect", "link", "menu", "header",
            "sidebar", "footer", "login", "logout", "signup",
        ],
        patterns: &[
            (r"\bnavigate\W+to\b", "navigate"),
            (r"\badd\W+(?:\w+\W+){0,2}pages?\b", "page"),
            (r"\bcreate\W+(?:\w+\W+){0,2}routes?\b", "route"),
        ],
    },
    Category {
        name: "styling",
        words: &[
            "style", "css", "theme", "color", "colour", "layout", "design", "appearance", "font",
            "blue", "red", "green", "dark", "responsive",
        ],
        patterns: &[
            (r"\bchange\W+(?:\w+\W+){0,3}colou?rs?\b", "color"),
            (r"\bupdate\W+(?:\w+\W+){0,2}themes?\b", "theme"),
            (r"\bstyle\W+(?:\w+\W+){0,2}components?\b", "style"),
        ],
    },
    Category {
        name: "business_logic",
        words: &["logic", "rule", "validation", "validate", "calculate", "process", "workflow"],
        patterns: &[
            (r"\bbusiness\W+logic\b", "logic"),
            (r"\badd\W+(?:\w+\W+){0,2}validation\b", "validation"),
        ],
    },
    Category {
        name: "api_integration",
        words: &["api", "endpoint", "service", "integration", "external", "webhook", "client"],
        patterns: &[
            (r"\bintegrate\W+(?:\w+\W+){0,3}api\b", "api"),
            (r"\bcall\W+(?:\w+\W+){0,2}service\b", "service"),
        ],
    },
    Category {
        name: "testing",
        words: &["test", "testing", "spec", "unit", "e2e", "coverage"],
        patterns: &[
            (r"\badd\W+(?:\w+\W+){0,2}tests?\b", "test"),
            (r"\bwrite\W+(?:\w+\W+){0,2}specs?\b", "spec"),
        ],
    },
];

static COMPILED: Lazy<Vec<Vec<(Regex, &'static str)>>> = Lazy::new(|| {
    CATEGORIES
        .iter()
        .map(|category| {
            category
                .patterns
                .iter()
                .map(|(pattern, keyword)| (Regex::new(pattern).expect("valid keyword regex"), *keyword))
                .collect()
        })
        .collect()
});

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z][a-z0-9_]*").expect("valid word regex"));

const STOP_WORDS: &[&str] = &[
    "this", "that", "with", "from", "have", "should", "would", "could", "when", "then", "than",
    "there", "their", "they", "them", "these", "those", "what", "which", "while", "will", "into",
    "also", "been", "being", "some", "such", "only", "more", "most", "make", "need", "needs",
    "user", "users", "want", "wants", "able", "like", "just", "each", "other", "over", "under",
    "after", "before", "about", "please", "given", "does", "done", "must", "where", "your",
];

/// Extract keyword categories from an issue summary and description.
///
/// Empty categories are dropped; `terms` comes last.
pub fn extract_keywords(summary: &str, description: &str) -> KeywordCategories {
    let text = format!("{} {}", summary, description).to_lowercase();
    let tokens: Vec<&str> = WORD.find_iter(&text).map(|m| m.as_str()).collect();

    let mut categories = KeywordCategories::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (category, patterns) in CATEGORIES.iter().zip(COMPILED.iter()) {
        let mut found: Vec<String> = Vec::new();

        for word in category.words {
            if tokens.iter().any(|t| t.starts_with(word)) && !found.iter().any(|f| f == word) {
                found.push(word.to_string());
            }
        }
        for (re, keyword) in patterns {
            if re.is_match(&text) && !found.iter().any(|f| f == keyword) {
                found.push(keyword.to_string());
            }
        }

        if !found.is_empty() {
            seen.extend(found.iter().cloned());
            categories.insert(category.name.to_string(), found);
        }
    }

    let mut terms: Vec<String> = Vec::new();
    for token in tokens {
        if terms.len() >= MAX_TERMS {
            break;
        }
        if token.len() < MIN_TERM_LEN
            || STOP_WORDS.contains(&token)
            || token.chars().all(|c| c.is_ascii_digit())
            || seen.iter().any(|s| token.starts_with(s.as_str()))
            || terms.iter().any(|t| t == token)
        {
            continue;
        }
        terms.push(token.to_string());
    }
    if !terms.is_empty() {
        categories.insert(TERMS_CATEGORY.to_string(), terms);
    }

    categories
}

/// Every keyword across categories, deduplicated, in category order
pub fn all_keywords(categories: &KeywordCategories) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for keyword in categories.values().flatten() {
        if !out.contains(&keyword.as_str()) {
            out.push(keyword.as_str());
        }
    }
    out
}
