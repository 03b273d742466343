//! Atlassian Document Format helpers
//!
//! Jira returns rich-text fields (descriptions, comment bodies) as ADF trees.
//! [`flatten`] turns one into plain text: text leaves in document order, one
//! line per block node, `hardBreak` as a newline. [`paragraph`] builds the
//! minimal document Jira accepts when writing a rich-text field.

use serde_json::{json, Value};

/// Node types that start a new line
const BLOCK_NODES: &[&str] = &[
    "paragraph",
    "heading",
    "blockquote",
    "codeBlock",
    "listItem",
    "bulletList",
    "orderedList",
    "panel",
    "rule",
    "table",
    "tableRow",
    "mediaSingle",
    "mediaGroup",
    "taskItem",
    "decisionItem",
];

/// Flatten an ADF document (or a plain string) into text
pub fn flatten(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => {
            let mut out = String::new();
            walk(other, &mut out, None);
            tidy(&out)
        }
    }
}

/// Wrap plain text into a single-paragraph ADF document
pub fn paragraph(text: &str) -> Value {
    json!({
        "type": "doc",
        "version": 1,
        "content": [{
            "type": "paragraph",
            "content": [{ "type": "text", "text": text }]
        }]
    })
}

fn line_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn walk(node: &Value, out: &mut String, list_marker: Option<String>) {
    match node {
        Value::Array(items) => {
            for item in items {
                walk(item, out, None);
            }
        }
        Value::Object(map) => {
            let node_type = map.get("type").and_then(Value::as_str).unwrap_or("");
            let is_block = BLOCK_NODES.contains(&node_type);
            if is_block {
                line_break(out);
            }
            if let Some(marker) = list_marker {
                out.push_str(&marker);
            }

            match node_type {
                "text" => {
                    if let Some(text) = map.get("text").and_then(Value::as_str) {
                        out.push_str(text);
                    }
                }
                "hardBreak" => out.push('\n'),
                "mention" | "emoji" | "status" => {
                    if let Some(text) = node.pointer("/attrs/text").and_then(Value::as_str) {
                        out.push_str(text);
                    }
                }
                "inlineCard" | "blockCard" => {
                    if let Some(url) = node.pointer("/attrs/url").and_then(Value::as_str) {
                        out.push_str(url);
                    }
                }
                "bulletList" | "orderedList" => {
                    let ordered = node_type == "orderedList";
                    let start = node
                        .pointer("/attrs/order")
                        .and_then(Value::as_u64)
                        .unwrap_or(1);
                    if let Some(Value::Array(items)) = map.get("content") {
                        for (i, item) in items.iter().enumerate() {
                            let marker = if ordered {
                                format!("{}. ", start + i as u64)
                            } else {
                                "- ".to_string()
                            };
                            walk(item, out, Some(marker));
                        }
                    }
                }
                "listItem" => {
                    // the first child paragraph shares the marker's line
                    if let Some(Value::Array(children)) = map.get("content") {
                        for (i, child) in children.iter().enumerate() {
                            if i == 0 && child.get("type").and_then(Value::as_str) == Some("paragraph") {
                                if let Some(content) = child.get("content") {
                                    walk(content, out, None);
                                }
                            } else {
                                walk(child, out, None);
                            }
                        }
                    }
                }
                _ => {
                    if let Some(content) = map.get("content") {
                        walk(content, out, None);
                    } else if let Some(text) = map.get("text").and_then(Value::as_str) {
                        out.push_str(text);
                    }
                }
            }

            if is_block {
                line_break(out);
            }
        }
        Value::String(s) => out.push_str(s),
        _ => {}
    }
}

/// Trim every line and drop runs of blank lines
fn tidy(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() && lines.last().map_or(true, |l| l.trim().is_empty()) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

/// Headings that open an acceptance-criteria section
const CRITERIA_HEADINGS: &[&str] = &[
    "acceptance criteria",
    "acceptance criterion",
    "definition of done",
];

/// Headings that close one
const SECTION_HEADINGS: &[&str] = &[
    "description",
    "notes",
    "background",
    "attachments",
    "technical notes",
    "out of scope",
    "context",
];

/// Best-effort extraction of acceptance criteria from description text.
///
/// Collects lines after an "acceptance criteria", "definition of done" or
/// "AC:" heading until the next heading-like line. Bullets and numbering are
/// stripped and very short lines ignored. Free-form descriptions will often
/// yield nothing; treat the result as a hint.
pub fn acceptance_criteria(description: &str) -> Vec<String> {
    let mut criteria = Vec::new();
    let mut in_section = false;

    for raw in description.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        let heading_text = lower.trim_start_matches('#').trim();

        if CRITERIA_HEADINGS.iter().any(|h| heading_text.contains(h)) || heading_text.starts_with("ac:") {
            in_section = true;
            continue;
        }
        if !in_section {
            continue;
        }
        if is_heading_like(line, heading_text) {
            break;
        }

        let cleaned = strip_list_marker(line);
        if cleaned.chars().count() > 5 {
            criteria.push(cleaned.to_string());
        }
    }

    criteria
}

fn is_heading_like(line: &str, lower: &str) -> bool {
    if line.starts_with('#') {
        return true;
    }
    if SECTION_HEADINGS
        .iter()
        .any(|h| lower == *h || lower.starts_with(&format!("{}:", h)))
    {
        return true;
    }
    let bulleted = strip_list_marker(line).len() != line.len();
    !bulleted && line.ends_with(':') && line.chars().count() <= 40
}

fn strip_list_marker(line: &str) -> &str {
    let trimmed = line.trim_start();
    for bullet in ["- [ ]", "- [x]", "* ", "- ", "• ", "+ "] {
        if let Some(rest) = trimmed.strip_prefix(bullet) {
            return rest.trim();
        }
    }
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_paragraph_is_idempotent() {
        let text = "Change the login button to blue";
        let once = flatten(&paragraph(text));
        assert_eq!(once, text);
        assert_eq!(flatten(&paragraph(&once)), text);
    }

    #[test]
    fn test_plain_string_and_null() {
        assert_eq!(flatten(&Value::String("  hello ".into())), "hello");
        assert_eq!(flatten(&Value::Null), "");
    }

    #[test]
    fn test_blocks_become_lines() {
        let doc = json!({
            "type": "doc",
            "version": 1,
            "content": [
                {"type": "heading", "attrs": {"level": 2}, "content": [{"type": "text", "text": "Acceptance Criteria"}]},
                {"type": "bulletList", "content": [
                    {"type": "listItem", "content": [{"type": "paragraph", "content": [{"type": "text", "text": "Button is blue"}]}]},
                    {"type": "listItem", "content": [{"type": "paragraph", "content": [
                        {"type": "text", "text": "Hover "},
                        {"type": "text", "text": "is darker", "marks": [{"type": "strong"}]}
                    ]}]}
                ]},
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "line one"},
                    {"type": "hardBreak"},
                    {"type": "text", "text": "line two"}
                ]}
            ]
        });

        assert_eq!(
            flatten(&doc),
            "Acceptance Criteria\n- Button is blue\n- Hover is darker\nline one\nline two"
        );
    }

    #[test]
    fn test_ordered_list_and_mentions() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "orderedList", "content": [
                    {"type": "listItem", "content": [{"type": "paragraph", "content": [
                        {"type": "text", "text": "Ping "},
                        {"type": "mention", "attrs": {"id": "1", "text": "@Dana"}}
                    ]}]},
                    {"type": "listItem", "content": [{"type": "paragraph", "content": [{"type": "text", "text": "Ship"}]}]}
                ]}
            ]
        });
        assert_eq!(flatten(&doc), "1. Ping @Dana\n2. Ship");
    }

    #[test]
    fn test_ordered_list_start_and_cards() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "orderedList", "attrs": {"order": 3}, "content": [
                    {"type": "listItem", "content": [{"type": "paragraph", "content": [
                        {"type": "text", "text": "See "},
                        {"type": "inlineCard", "attrs": {"url": "https://acme.atlassian.net/browse/SCRUM-2"}}
                    ]}]},
                    {"type": "listItem", "content": [{"type": "paragraph", "content": [
                        {"type": "status", "attrs": {"text": "IN REVIEW", "color": "blue"}},
                        {"type": "text", "text": " "},
                        {"type": "emoji", "attrs": {"shortName": ":tada:", "text": "🎉"}}
                    ]}]}
                ]},
                {"type": "blockCard", "attrs": {"url": "https://github.com/acme/web/pull/7"}}
            ]
        });
        assert_eq!(
            flatten(&doc),
            "3. See https://acme.atlassian.net/browse/SCRUM-2\n4. IN REVIEW 🎉\nhttps://github.com/acme/web/pull/7"
        );
    }

    #[test]
    fn test_acceptance_criteria_section() {
        let description = "As a user I want a blue button.\n\n\
            Acceptance Criteria:\n\
            - The login button is blue\n\
            - Hover state is darker blue\n\
            * ok\n\
            1. Works on mobile screens\n\
            Notes:\n\
            - This line is not a criterion";

        assert_eq!(
            acceptance_criteria(description),
            vec![
                "The login button is blue",
                "Hover state is darker blue",
                "Works on mobile screens",
            ]
        );
    }

    #[test]
    fn test_definition_of_done_and_no_section() {
        let description = "## Definition of Done\n- Unit tests updated\n## Rollout\n- Not included here";
        assert_eq!(acceptance_criteria(description), vec!["Unit tests updated"]);
        assert!(acceptance_criteria("Change to blue").is_empty());
    }
}
