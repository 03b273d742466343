//! Light parsing of generated plan text

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanSections {
    pub file_changes: Vec<FileChange>,
    pub steps: Vec<String>,
    pub code_blocks: Vec<CodeBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileChange {
    pub path: String,
    pub changes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Files,
    Steps,
    Code,
    Other,
}

static FILE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-*•]|\d+[.)])?\s*(?:\*\*)?`?([\w@][\w@./\-\[\]]*\.[A-Za-z0-9]+)`?(?:\*\*)?\s*(?:[:\-–]\s*(.*))?$")
        .expect("valid file line regex")
});
static STEP_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:\d+[.)]|[-*•]|step\s+\d+:?)\s+(.+)$").expect("valid step line regex"));

/// Split generated plan text into file changes, steps and fenced code.
///
/// The model does not always follow the requested layout, so anything that
/// cannot be attributed to a section is ignored rather than rejected.
pub fn parse_plan_sections(text: &str) -> PlanSections {
    let mut sections = PlanSections::default();
    let mut current = Section::Preamble;
    let mut fence: Option<(Option<String>, Vec<&str>)> = None;

    for raw in text.lines() {
        let line = raw.trim();

        if let Some(rest) = line.strip_prefix("```") {
            match fence.take() {
                Some((language, lines)) => sections.code_blocks.push(CodeBlock {
                    language,
                    code: lines.join("\n"),
                }),
                None => {
                    let language = rest.trim();
                    fence = Some(((!language.is_empty()).then(|| language.to_string()), Vec::new()));
                }
            }
            continue;
        }
        if let Some((_, lines)) = fence.as_mut() {
            lines.push(raw);
            continue;
        }

        if let Some(section) = heading(line) {
            current = section;
            continue;
        }
        if line.is_empty() {
            continue;
        }

        match current {
            Section::Files => {
                if let Some(caps) = FILE_LINE.captures(line) {
                    sections.file_changes.push(FileChange {
                        path: caps[1].to_string(),
                        changes: caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
                    });
                }
            }
            Section::Steps => {
                if let Some(caps) = STEP_LINE.captures(line) {
                    sections.steps.push(caps[1].trim().to_string());
                }
            }
            _ => {}
        }
    }

    // unterminated fence
    if let Some((language, lines)) = fence {
        if !lines.is_empty() {
            sections.code_blocks.push(CodeBlock {
                language,
                code: lines.join("\n"),
            });
        }
    }

    sections
}

fn heading(line: &str) -> Option<Section> {
    let stripped = line
        .trim_start_matches(|c: char| c == '#' || c == '*' || c == '.' || c == ')' || c.is_ascii_digit() || c.is_whitespace())
        .trim()
        .trim_end_matches(|c: char| c == '*' || c == ':')
        .trim()
        .to_uppercase();
    if stripped.is_empty() || stripped.len() > 40 {
        return None;
    }

    const FILES: &[&str] = &["FILES TO MODIFY", "FILES TO CHANGE", "FILE CHANGES", "FILES"];
    const STEPS: &[&str] = &["IMPLEMENTATION STEPS", "STEPS", "IMPLEMENTATION PLAN"];
    const CODE: &[&str] = &["CODE CHANGES", "CODE EXAMPLES", "CODE"];
    const OTHER: &[&str] = &["TESTING", "TEST PLAN", "RISKS", "NOTES", "SUMMARY", "OVERVIEW"];

    if FILES.contains(&stripped.as_str()) {
        Some(Section::Files)
    } else if STEPS.contains(&stripped.as_str()) {
        Some(Section::Steps)
    } else if CODE.contains(&stripped.as_str()) {
        Some(Section::Code)
    } else if OTHER.contains(&stripped.as_str()) {
        Some(Section::Other)
    } else {
        None
    }
}
