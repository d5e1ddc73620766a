//! Validation issues and the aggregate verdict

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Quality dimension an issue belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCategory {
    Structure,
    Budget,
    Timing,
    Geography,
    Diversity,
    Quality,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "STRUCTURE",
            Self::Budget => "BUDGET",
            Self::Timing => "TIMING",
            Self::Geography => "GEOGRAPHY",
            Self::Diversity => "DIVERSITY",
            Self::Quality => "QUALITY",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How much an issue matters; declaration order is the sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    /// Must fix, blocks approval
    Critical,
    /// Should fix
    Warning,
    /// Optional improvement
    Suggestion,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Warning => "WARNING",
            Self::Suggestion => "SUGGESTION",
        }
    }
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single finding from one checker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub category: IssueCategory,
    pub severity: IssueSeverity,
    pub message: String,
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl ValidationIssue {
    pub fn new(
        category: IssueCategory,
        severity: IssueSeverity,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
            suggestion: suggestion.into(),
            day_number: None,
            details: Vec::new(),
        }
    }

    pub fn critical(category: IssueCategory, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::new(category, IssueSeverity::Critical, message, suggestion)
    }

    pub fn warning(category: IssueCategory, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::new(category, IssueSeverity::Warning, message, suggestion)
    }

    pub fn suggestion(category: IssueCategory, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::new(category, IssueSeverity::Suggestion, message, suggestion)
    }

    pub fn on_day(mut self, day_number: u32) -> Self {
        self.day_number = Some(day_number);
        self
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == IssueSeverity::Critical
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)?;
        if let Some(day) = self.day_number {
            write!(f, " (day {})", day)?;
        }
        Ok(())
    }
}

/// Aggregate verdict over all checkers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionResult {
    /// Critical first, then warnings, then suggestions
    pub issues: Vec<ValidationIssue>,
    /// True iff no critical issue is present
    pub approved: bool,
    pub critical_count: usize,
    pub warning_count: usize,
    pub suggestion_count: usize,
}

impl ReflectionResult {
    /// Sort issues by severity (stable within a severity) and compute the verdict
    pub fn from_issues(mut issues: Vec<ValidationIssue>) -> Self {
        debug!(issue_count = issues.len(), "ReflectionResult::from_issues: called");
        issues.sort_by_key(|i| i.severity);
        let count = |severity: IssueSeverity| issues.iter().filter(|i| i.severity == severity).count();
        let critical_count = count(IssueSeverity::Critical);
        let warning_count = count(IssueSeverity::Warning);
        let suggestion_count = count(IssueSeverity::Suggestion);
        Self {
            approved: critical_count == 0,
            critical_count,
            warning_count,
            suggestion_count,
            issues,
        }
    }

    /// Issues rendered as `[SEVERITY] CATEGORY: message`
    pub fn issue_lines(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }

    /// Suggestions attached to critical issues, used to steer regeneration
    pub fn revision_suggestions(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter(|i| i.is_critical() && !i.suggestion.is_empty())
            .map(|i| i.suggestion.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_by_severity_stable() {
        let result = ReflectionResult::from_issues(vec![
            ValidationIssue::suggestion(IssueCategory::Diversity, "s1", ""),
            ValidationIssue::warning(IssueCategory::Timing, "w1", ""),
            ValidationIssue::critical(IssueCategory::Budget, "c1", "cut costs"),
            ValidationIssue::warning(IssueCategory::Geography, "w2", ""),
            ValidationIssue::critical(IssueCategory::Structure, "c2", "add a day"),
        ]);

        let messages: Vec<&str> = result.issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(messages, vec!["c1", "c2", "w1", "w2", "s1"]);
        assert!(!result.approved);
        assert_eq!(
            (result.critical_count, result.warning_count, result.suggestion_count),
            (2, 2, 1)
        );
        assert_eq!(result.revision_suggestions(), vec!["cut costs", "add a day"]);
    }

    #[test]
    fn test_no_critical_means_approved() {
        let result = ReflectionResult::from_issues(vec![ValidationIssue::warning(IssueCategory::Timing, "late", "")]);
        assert!(result.approved);
        assert!(ReflectionResult::from_issues(vec![]).approved);
    }

    #[test]
    fn test_issue_rendering() {
        let issue = ValidationIssue::critical(IssueCategory::Timing, "Overlap", "").on_day(2);
        assert_eq!(issue.to_string(), "[CRITICAL] TIMING: Overlap (day 2)");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["dayNumber"], 2);
    }
}
