//! Structured assessment of a pull request, parsed from model output or
//! derived from diff size when no usable model output exists

use serde::{Deserialize, Serialize};

use crate::github::PullRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    NeedsImprovement,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRecommendation {
    ReadyToMerge,
    NeedsImprovements,
    MajorChangesRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Where an assessment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentSource {
    Model,
    Heuristic,
}

impl AssessmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentSource::Model => "model",
            AssessmentSource::Heuristic => "heuristic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
}

/// Advisory review of a pull request against a ticket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assessment {
    pub validation_status: ValidationStatus,
    pub completeness_score: u8,
    pub merge_recommendation: MergeRecommendation,
    pub can_merge: bool,
    pub missing_requirements: Vec<String>,
    pub suggestions: Vec<String>,
    pub code_quality_issues: Vec<String>,
    pub merge_blockers: Vec<String>,
    pub feedback: String,
    pub risk_level: RiskLevel,
    pub source: AssessmentSource,
    pub confidence: Confidence,
}

#[derive(Clone, Copy)]
enum ListSection {
    Missing,
    Suggestions,
    Quality,
    Blockers,
    Feedback,
}

/// Parse the labelled review format requested from the model.
///
/// Missing labels keep neutral defaults; the whole response becomes the
/// feedback when no `DETAILED_FEEDBACK` block is present.
pub fn parse_assessment(response: &str) -> Assessment {
    let mut validation_status = ValidationStatus::NeedsImprovement;
    let mut completeness_score: u8 = 50;
    let mut merge_recommendation = MergeRecommendation::NeedsImprovements;
    let mut missing_requirements = Vec::new();
    let mut suggestions = Vec::new();
    let mut code_quality_issues = Vec::new();
    let mut merge_blockers = Vec::new();
    let mut feedback: Option<Vec<&str>> = None;
    let mut section: Option<ListSection> = None;

    for raw in response.lines() {
        let line = raw.trim();

        if let Some(value) = line.strip_prefix("VALIDATION_STATUS:") {
            let value = value.to_lowercase();
            validation_status = if value.contains("approved") {
                ValidationStatus::Valid
            } else if value.contains("rejected") {
                ValidationStatus::Invalid
            } else {
                ValidationStatus::NeedsImprovement
            };
        } else if let Some(value) = line.strip_prefix("COMPLETENESS_SCORE:") {
            let digits: String = value
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .take(4)
                .collect();
            if let Ok(score) = digits.parse::<u32>() {
                completeness_score = score.min(100) as u8;
            }
        } else if let Some(value) = line.strip_prefix("MERGE_RECOMMENDATION:") {
            let value = value.to_lowercase();
            merge_recommendation = if value.contains("ready") {
                MergeRecommendation::ReadyToMerge
            } else if value.contains("major") {
                MergeRecommendation::MajorChangesRequired
            } else {
                MergeRecommendation::NeedsImprovements
            };
        } else if line.starts_with("MISSING_REQUIREMENTS:") {
            section = Some(ListSection::Missing);
        } else if line.starts_with("SUGGESTIONS:") {
            section = Some(ListSection::Suggestions);
        } else if line.starts_with("CODE_QUALITY_ISSUES:") {
            section = Some(ListSection::Quality);
        } else if line.starts_with("MERGE_BLOCKERS:") {
            section = Some(ListSection::Blockers);
        } else if line.starts_with("REQUIREMENT_ANALYSIS:") {
            section = None;
        } else if let Some(rest) = line.strip_prefix("DETAILED_FEEDBACK:") {
            section = Some(ListSection::Feedback);
            let mut lines = Vec::new();
            if !rest.trim().is_empty() {
                lines.push(rest.trim());
            }
            feedback = Some(lines);
        } else if let Some(ListSection::Feedback) = section {
            if let (Some(lines), false) = (feedback.as_mut(), line.is_empty()) {
                lines.push(line);
            }
        } else if let (Some(item), Some(target)) = (line.strip_prefix('-'), section) {
            let item = item.trim();
            if item.is_empty() || is_placeholder(item) {
                continue;
            }
            let list = match target {
                ListSection::Missing => &mut missing_requirements,
                ListSection::Suggestions => &mut suggestions,
                ListSection::Quality => &mut code_quality_issues,
                ListSection::Blockers => &mut merge_blockers,
                ListSection::Feedback => continue,
            };
            list.push(item.to_string());
        }
    }

    let can_merge = validation_status == ValidationStatus::Valid
        && completeness_score >= 70
        && merge_recommendation == MergeRecommendation::ReadyToMerge
        && merge_blockers.is_empty();

    let feedback = match feedback {
        Some(lines) if !lines.is_empty() => lines.join("\n"),
        _ => response.trim().to_string(),
    };

    Assessment {
        validation_status,
        completeness_score,
        merge_recommendation,
        can_merge,
        missing_requirements,
        suggestions,
        code_quality_issues,
        merge_blockers,
        feedback,
        risk_level: if can_merge {
            RiskLevel::Low
        } else if completeness_score >= 50 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        },
        source: AssessmentSource::Model,
        confidence: Confidence::Medium,
    }
}

/// "None", "N/A" and similar filler the model emits for empty lists
fn is_placeholder(item: &str) -> bool {
    let lower = item.trim_end_matches('.').to_lowercase();
    matches!(lower.as_str(), "none" | "n/a" | "na" | "nothing" | "no issues" | "none identified")
}

/// Diff-size heuristic used when the model is unavailable or silent.
/// Always tagged as heuristic with low confidence.
pub fn heuristic_assessment(pr: &PullRequest, reason: &str) -> Assessment {
    let score = if pr.changed_files > 0 {
        (pr.changed_files * 10 + pr.additions / 10).clamp(30, 80) as u8
    } else {
        20
    };
    let mergeable = pr.mergeable.unwrap_or(false);

    let validation_status = if score >= 70 {
        ValidationStatus::Valid
    } else if score < 40 {
        ValidationStatus::Invalid
    } else {
        ValidationStatus::NeedsImprovement
    };
    let merge_recommendation = if score >= 80 && mergeable {
        MergeRecommendation::ReadyToMerge
    } else if score < 40 {
        MergeRecommendation::MajorChangesRequired
    } else {
        MergeRecommendation::NeedsImprovements
    };
    let can_merge = validation_status == ValidationStatus::Valid && mergeable;

    let feedback = format!(
        "Heuristic assessment from change size only ({}).\n\
         Files changed: {}\nLines added: {}\nLines deleted: {}\nMergeable: {}\n\
         Review the pull request manually against the ticket.",
        reason,
        pr.changed_files,
        pr.additions,
        pr.deletions,
        pr.mergeable.map_or("unknown".to_string(), |m| m.to_string())
    );

    Assessment {
        validation_status,
        completeness_score: score,
        merge_recommendation,
        can_merge,
        missing_requirements: vec!["Requirements could not be checked without model output".to_string()],
        suggestions: vec![
            "Review the pull request manually against the ticket".to_string(),
            "Confirm every acceptance criterion is covered".to_string(),
            "Run the test suite".to_string(),
        ],
        code_quality_issues: Vec::new(),
        merge_blockers: if can_merge {
            Vec::new()
        } else {
            vec!["Manual review required".to_string()]
        },
        feedback,
        risk_level: RiskLevel::Medium,
        source: AssessmentSource::Heuristic,
        confidence: Confidence::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "\
VALIDATION_STATUS: APPROVED
COMPLETENESS_SCORE: 85/100
MERGE_RECOMMENDATION: READY_TO_MERGE

REQUIREMENT_ANALYSIS:
- Button color changed: addressed

MISSING_REQUIREMENTS:
- None

SUGGESTIONS:
- Add a visual regression test

CODE_QUALITY_ISSUES:
- Hard-coded hex value

MERGE_BLOCKERS:

DETAILED_FEEDBACK:
The change is small and focused.
It matches the ticket.
";

    fn pull_request(changed_files: u64, additions: u64, mergeable: Option<bool>) -> PullRequest {
        PullRequest {
            number: 7,
            title: "Blue login button".to_string(),
            body: None,
            state: "open".to_string(),
            html_url: None,
            user: None,
            head: None,
            base: None,
            additions,
            deletions: 2,
            changed_files,
            commits: 1,
            mergeable,
        }
    }

    #[test]
    fn test_parse_labelled_response() {
        let assessment = parse_assessment(RESPONSE);

        assert_eq!(assessment.validation_status, ValidationStatus::Valid);
        assert_eq!(assessment.completeness_score, 85);
        assert_eq!(assessment.merge_recommendation, MergeRecommendation::ReadyToMerge);
        assert!(assessment.missing_requirements.is_empty());
        assert_eq!(assessment.suggestions, vec!["Add a visual regression test"]);
        assert_eq!(assessment.code_quality_issues, vec!["Hard-coded hex value"]);
        assert!(assessment.merge_blockers.is_empty());
        assert!(assessment.can_merge);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert_eq!(assessment.feedback, "The change is small and focused.\nIt matches the ticket.");
        assert_eq!(assessment.source, AssessmentSource::Model);
    }

    #[test]
    fn test_unlabelled_response_keeps_defaults() {
        let assessment = parse_assessment("Looks fine to me.");
        assert_eq!(assessment.validation_status, ValidationStatus::NeedsImprovement);
        assert_eq!(assessment.completeness_score, 50);
        assert!(!assessment.can_merge);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert_eq!(assessment.feedback, "Looks fine to me.");
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(parse_assessment("COMPLETENESS_SCORE: 250").completeness_score, 100);
    }

    #[test]
    fn test_heuristic_is_tagged() {
        let assessment = heuristic_assessment(&pull_request(3, 120, Some(true)), "model unavailable");

        assert_eq!(assessment.source, AssessmentSource::Heuristic);
        assert_eq!(assessment.confidence, Confidence::Low);
        assert_eq!(assessment.completeness_score, 42);
        assert_eq!(assessment.validation_status, ValidationStatus::NeedsImprovement);
        assert!(!assessment.can_merge);
        assert_eq!(assessment.merge_blockers, vec!["Manual review required"]);
        assert!(assessment.feedback.contains("model unavailable"));
    }

    #[test]
    fn test_heuristic_bounds() {
        assert_eq!(heuristic_assessment(&pull_request(0, 500, None), "x").completeness_score, 20);
        let large = heuristic_assessment(&pull_request(20, 5000, Some(true)), "x");
        assert_eq!(large.completeness_score, 80);
        assert_eq!(large.merge_recommendation, MergeRecommendation::ReadyToMerge);
        assert!(large.can_merge);
    }
}
