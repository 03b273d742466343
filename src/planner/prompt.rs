//! Prompt construction for plan generation

use std::fmt::Write as _;

use crate::analyzer::RepositoryScanResult;
use crate::config::PlannerConfig;
use crate::jira::{Comment, Issue};

const TRUNCATION_MARKER: &str = "\n[...truncated...]\n";
const MAX_NOTE_CHARS: usize = 300;
const SIMPLE_DESCRIPTION_CHARS: usize = 500;
const MIN_DESCRIPTION_CHARS: usize = 200;
const DESCRIPTION_LABEL: &str = "\nDESCRIPTION:\n";

const INSTRUCTIONS: &str = "\
Write the implementation plan with these sections:
1. FILES TO MODIFY: one line per file, formatted as `path: what changes`.
2. IMPLEMENTATION STEPS: numbered, concrete steps in order.
3. CODE CHANGES: fenced code blocks for the key edits.
4. TESTING: how to verify the change, including edge cases.
Only reference files that exist in the repository context when one is given.
";

const SIMPLE_INSTRUCTIONS: &str = "\
List the files to change and numbered implementation steps.
";

/// Everything known about a ticket when the prompt is built
pub struct PromptContext<'a> {
    pub issue: &'a Issue,
    pub scan: Option<&'a RepositoryScanResult>,
    pub discussion: &'a [Comment],
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_chars: usize,
    max_files: usize,
    max_keyword_categories: usize,
}

impl PromptBuilder {
    pub fn new(config: &PlannerConfig) -> Self {
        Self {
            max_chars: config.max_prompt_chars,
            max_files: config.max_prompt_files,
            max_keyword_categories: config.max_prompt_keyword_categories,
        }
    }

    /// Full prompt: issue fields, acceptance criteria, team notes and the
    /// condensed repository context, capped at the character budget.
    ///
    /// When over budget the description is clipped first so the sections
    /// after it survive a long ticket.
    pub fn build(&self, ctx: &PromptContext<'_>) -> String {
        let issue = ctx.issue;
        let mut header = String::from(
            "You are a senior software engineer. Write a concrete implementation plan for the Jira ticket below.\n\n",
        );
        push_issue_header(&mut header, issue);

        let mut tail = String::new();
        if !issue.acceptance_criteria.is_empty() {
            tail.push_str("\nACCEPTANCE CRITERIA:\n");
            for criterion in &issue.acceptance_criteria {
                let _ = writeln!(tail, "- {}", criterion);
            }
        }

        let notes: Vec<&Comment> = ctx
            .discussion
            .iter()
            .filter(|c| !c.body.trim().is_empty())
            .collect();
        if !notes.is_empty() {
            tail.push_str("\nTEAM NOTES:\n");
            for note in notes {
                let author = note.author.as_deref().unwrap_or("unknown");
                let text = shorten(&note.body.split_whitespace().collect::<Vec<_>>().join(" "), MAX_NOTE_CHARS);
                let _ = writeln!(tail, "- {}: {}", author, text);
            }
        }

        if let Some(scan) = ctx.scan {
            self.push_repository_context(&mut tail, scan);
        }

        let footer = format!("\n{}", INSTRUCTIONS);
        let description = issue.description.trim();
        if description.is_empty() {
            return fit_to_budget(&format!("{}{}", header, tail), &footer, self.max_chars);
        }

        let full_section = format!("{}{}\n", DESCRIPTION_LABEL, description);
        let fixed = header.len() + tail.len() + footer.len();
        if fixed + full_section.len() <= self.max_chars {
            return format!("{}{}{}{}", header, full_section, tail, footer);
        }

        let overhead = fixed + DESCRIPTION_LABEL.len() + TRUNCATION_MARKER.len();
        let room = self.max_chars.saturating_sub(overhead);
        if room >= MIN_DESCRIPTION_CHARS {
            let clipped = clip_at_boundary(description, room);
            // the marker closes the description section
            let body = format!("{}{}{}{}{}", header, DESCRIPTION_LABEL, clipped, TRUNCATION_MARKER, tail);
            return fit_to_budget(&body, &footer, self.max_chars);
        }

        fit_to_budget(&format!("{}{}{}", header, full_section, tail), &footer, self.max_chars)
    }

    /// Short prompt used for the single retry: issue fields only
    pub fn build_simple(&self, issue: &Issue) -> String {
        let mut body = String::from("Write a short implementation plan for this Jira ticket.\n\n");
        let _ = writeln!(body, "TICKET: {}", issue.key);
        let _ = writeln!(body, "SUMMARY: {}", issue.summary.trim());
        let _ = writeln!(body, "TYPE: {}", issue.issue_type);
        if !issue.description.trim().is_empty() {
            let _ = writeln!(
                body,
                "DESCRIPTION: {}",
                shorten(issue.description.trim(), SIMPLE_DESCRIPTION_CHARS)
            );
        }
        fit_to_budget(&body, &format!("\n{}", SIMPLE_INSTRUCTIONS), self.max_chars)
    }

    fn push_repository_context(&self, body: &mut String, scan: &RepositoryScanResult) {
        let repo = &scan.repository;
        body.push_str("\nREPOSITORY CONTEXT:\n");
        let _ = writeln!(
            body,
            "Repository: {} ({})",
            repo.full_name,
            repo.language.as_deref().unwrap_or("unknown language")
        );
        let _ = writeln!(body, "Framework: {}", scan.framework);

        if !scan.relevant_files.is_empty() {
            body.push_str("Relevant files:\n");
            for file in scan.relevant_files.iter().take(self.max_files) {
                let _ = writeln!(body, "- {} ({}, {} priority)", file.path, file.file_type, file.priority.as_str());
            }
        }

        let categories: Vec<_> = scan
            .keyword_categories
            .iter()
            .take(self.max_keyword_categories)
            .collect();
        if !categories.is_empty() {
            body.push_str("Keywords:\n");
            for (category, words) in categories {
                let _ = writeln!(body, "- {}: {}", category, words.join(", "));
            }
        }
    }
}

fn push_issue_header(body: &mut String, issue: &Issue) {
    let _ = writeln!(body, "TICKET: {}", issue.key);
    let _ = writeln!(body, "SUMMARY: {}", issue.summary.trim());
    let _ = writeln!(
        body,
        "TYPE: {} | PRIORITY: {} | STATUS: {}",
        issue.issue_type, issue.priority, issue.status
    );
    if !issue.labels.is_empty() {
        let _ = writeln!(body, "LABELS: {}", issue.labels.join(", "));
    }
    if !issue.components.is_empty() {
        let _ = writeln!(body, "COMPONENTS: {}", issue.components.join(", "));
    }
}

/// Join `body` and `footer` so the result never exceeds `max_chars` bytes.
///
/// The footer is always kept whole. The body is cut at the boundary nearest
/// the budget, see [`clip_at_boundary`].
pub fn fit_to_budget(body: &str, footer: &str, max_chars: usize) -> String {
    if body.len() + footer.len() <= max_chars {
        return format!("{}{}", body, footer);
    }

    let reserved = footer.len() + TRUNCATION_MARKER.len();
    if reserved >= max_chars {
        return shorten_bytes(footer, max_chars).to_string();
    }

    let head = clip_at_boundary(body, max_chars - reserved);
    format!("{}{}{}", head, TRUNCATION_MARKER, footer)
}

/// Prefix of `text` of at most `max` bytes, cut at a boundary near the limit.
///
/// A paragraph break counts only within the last fifth of the prefix, then a
/// line break in that window, then the last whitespace, then any line break.
/// Text with no break at all is cut mid-word.
fn clip_at_boundary(text: &str, max: usize) -> &str {
    let head = shorten_bytes(text, max);
    if head.len() == text.len() {
        return head;
    }
    let window = head.len() - head.len() / 5;
    let cut = head
        .rfind("\n\n")
        .filter(|&idx| idx >= window)
        .or_else(|| head.rfind('\n').filter(|&idx| idx >= window))
        .or_else(|| head.rfind(char::is_whitespace))
        .filter(|&idx| idx > 0)
        .unwrap_or(head.len());
    head[..cut].trim_end()
}

/// Longest prefix of at most `max` bytes ending on a char boundary
fn shorten_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Clip to `max` characters, marking the cut
fn shorten(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analyzer::{Framework, Priority, RelevantFile, RepositorySummary};

    pub(crate) fn issue(summary: &str, description: &str) -> Issue {
        Issue {
            key: "SCRUM-1".to_string(),
            url: "https://acme.atlassian.net/browse/SCRUM-1".to_string(),
            summary: summary.to_string(),
            description: description.to_string(),
            acceptance_criteria: Vec::new(),
            status: "To Do".to_string(),
            priority: "Medium".to_string(),
            issue_type: "Story".to_string(),
            assignee: None,
            labels: Vec::new(),
            components: Vec::new(),
            created: None,
            updated: None,
        }
    }

    #[test]
    fn test_full_prompt_sections() {
        let mut issue = issue("Fix login button color", "Change to blue");
        issue.acceptance_criteria = vec!["Button is blue on all pages".to_string()];
        let notes = vec![Comment {
            id: "1".to_string(),
            author: Some("Dana".to_string()),
            body: "Use the   brand\npalette".to_string(),
            created: None,
        }];
        let builder = PromptBuilder::new(&PlannerConfig::default());
        let prompt = builder.build(&PromptContext {
            issue: &issue,
            scan: None,
            discussion: &notes,
        });

        assert!(prompt.contains("TICKET: SCRUM-1"));
        assert!(prompt.contains("SUMMARY: Fix login button color"));
        assert!(prompt.contains("DESCRIPTION:\nChange to blue"));
        assert!(prompt.contains("ACCEPTANCE CRITERIA:\n- Button is blue on all pages"));
        assert!(prompt.contains("TEAM NOTES:\n- Dana: Use the brand palette"));
        assert!(!prompt.contains("REPOSITORY CONTEXT"));
        assert!(prompt.ends_with(INSTRUCTIONS));
    }

    #[test]
    fn test_simple_prompt_is_shorter() {
        let issue = issue("Fix login button color", &"Change to blue. ".repeat(100));
        let builder = PromptBuilder::new(&PlannerConfig::default());
        let full = builder.build(&PromptContext {
            issue: &issue,
            scan: None,
            discussion: &[],
        });
        let simple = builder.build_simple(&issue);

        assert!(simple.len() < full.len());
        assert!(simple.contains("SUMMARY: Fix login button color"));
        assert!(simple.ends_with(SIMPLE_INSTRUCTIONS));
    }

    #[test]
    fn test_budget_cuts_at_paragraph() {
        let body = format!("{}\n\n{}", "a".repeat(40), "b".repeat(40));
        let result = fit_to_budget(&body, "\nEND", 70);

        assert!(result.len() <= 70);
        assert!(result.starts_with(&"a".repeat(40)));
        assert!(!result.contains('b'));
        assert!(result.ends_with("\nEND"));
    }

    #[test]
    fn test_budget_ignores_distant_paragraph_break() {
        let lines: Vec<String> = (0..40).map(|i| format!("line {:02} of the notes", i)).collect();
        let body = format!("intro\n\n{}", lines.join("\n"));
        let result = fit_to_budget(&body, "\nEND", 500);

        assert!(result.len() <= 500);
        assert!(result.len() > 400);
        assert!(result.contains("line 00 of the notes"));
        assert!(result.contains("[...truncated...]"));
        assert!(result.ends_with("\nEND"));
        assert!(!result.contains("line 39"));
    }

    #[test]
    fn test_long_description_keeps_prefix_and_repository_context() {
        let lines: Vec<String> = (0..200)
            .map(|i| format!("line {:03}: restyle the login button for the new theme", i))
            .collect();
        let issue = issue("Fix login button color", &lines.join("\n"));
        let scan = RepositoryScanResult {
            repository: RepositorySummary {
                name: "web".to_string(),
                full_name: "acme/web".to_string(),
                description: None,
                language: Some("TypeScript".to_string()),
                stars: 0,
                default_branch: "main".to_string(),
                url: "https://github.com/acme/web".to_string(),
            },
            framework: Framework::React,
            languages: Default::default(),
            relevant_files: vec![RelevantFile {
                path: "src/components/LoginButton.tsx".to_string(),
                file_type: "component".to_string(),
                priority: Priority::High,
                score: 6.0,
                size: Some(240),
            }],
            keyword_categories: Default::default(),
            files_scanned: 1,
            tree_truncated: false,
        };
        let config = PlannerConfig::default();
        let prompt = PromptBuilder::new(&config).build(&PromptContext {
            issue: &issue,
            scan: Some(&scan),
            discussion: &[],
        });

        assert!(prompt.len() <= config.max_prompt_chars);
        assert!(prompt.contains("DESCRIPTION:\nline 000"));
        assert!(prompt.contains("line 050"));
        assert!(!prompt.contains("line 199"));
        assert!(prompt.contains("[...truncated...]"));
        assert!(prompt.contains("REPOSITORY CONTEXT:"));
        assert!(prompt.contains("src/components/LoginButton.tsx"));
        assert!(prompt.ends_with(INSTRUCTIONS));
    }

    #[test]
    fn test_budget_falls_back_to_whitespace() {
        let body = "word ".repeat(50);
        let result = fit_to_budget(&body, "!", 60);
        assert!(result.len() <= 60);
        assert!(result.contains("word\n[...truncated...]"));
    }

    #[test]
    fn test_budget_respects_char_boundaries() {
        let body = "é".repeat(100);
        let result = fit_to_budget(&body, "", 51);
        assert!(result.len() <= 51);
    }

    #[test]
    fn test_fits_untouched() {
        assert_eq!(fit_to_budget("short", "\nend", 100), "short\nend");
    }
}
