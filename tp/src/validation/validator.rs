//! PlanValidator - runs every checker and aggregates the verdict

use tracing::{debug, info};

use super::checks::{check_budget, check_diversity, check_geography, check_structure, check_timing};
use super::holistic::HolisticReview;
use super::issue::ReflectionResult;
use crate::state::PlanState;

/// Runs the checkers in a fixed order, then sorts by severity
#[derive(Default)]
pub struct PlanValidator {
    holistic: Option<HolisticReview>,
}

impl PlanValidator {
    /// Validator with only the deterministic checkers
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a holistic reviewer run after the deterministic checkers
    pub fn with_holistic(mut self, review: HolisticReview) -> Self {
        self.holistic = Some(review);
        self
    }

    /// Deterministic checkers only; never touches the network
    pub fn check(state: &PlanState) -> ReflectionResult {
        debug!(plan_id = %state.plan_id, "PlanValidator::check: called");
        let mut issues = check_structure(state);
        issues.extend(check_budget(state));
        issues.extend(check_timing(state));
        issues.extend(check_geography(state));
        issues.extend(check_diversity(state));
        ReflectionResult::from_issues(issues)
    }

    /// Full validation including the holistic review when attached
    pub async fn validate(&self, state: &PlanState) -> ReflectionResult {
        debug!(plan_id = %state.plan_id, holistic = self.holistic.is_some(), "PlanValidator::validate: called");
        let mut issues = Self::check(state).issues;
        if let Some(review) = &self.holistic {
            issues.extend(review.review(state).await);
        }

        let result = ReflectionResult::from_issues(issues);
        info!(
            "Reflection completed: {} issues found (approved: {})",
            result.issues.len(),
            result.approved
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Reasoner;
    use crate::llm::mock::MockLlmClient;
    use crate::prompts::PromptLoader;
    use crate::state::{ActivityPlan, ActivityType, BudgetCheck, Coordinates, DayPlan};
    use crate::validation::{IssueCategory, IssueSeverity};
    use std::sync::Arc;
    use std::time::Duration;

    fn good_state() -> PlanState {
        let day = |n: u32| {
            DayPlan::new(n, "Day", vec![
                ActivityPlan::new("Hotel", ActivityType::Accommodation)
                    .at("08:00", 30)
                    .in_location("Hotel"),
                ActivityPlan::new("Museum", ActivityType::Activity)
                    .at("09:00", 120)
                    .in_location("Museum"),
                ActivityPlan::new("Lunch", ActivityType::Dining)
                    .at("12:00", 60)
                    .in_location("Cafe"),
                ActivityPlan::new("Park", ActivityType::Activity)
                    .at("14:00", 90)
                    .in_location("Park"),
            ])
        };
        let mut state = PlanState {
            duration_days: 2,
            budget: 1000.0,
            itinerary: vec![day(1), day(2)],
            budget_check: Some(BudgetCheck::new(700.0, 1000.0, vec![])),
            ..Default::default()
        };
        for (name, lat) in [("Hotel", 0.0), ("Museum", 0.01), ("Cafe", 0.02), ("Park", 0.03)] {
            state.geo_data.insert(name.to_string(), Coordinates::found(name, lat, 0.0));
        }
        state
    }

    #[test]
    fn test_clean_plan_is_approved() {
        let result = PlanValidator::check(&good_state());
        assert!(result.approved, "unexpected issues: {:?}", result.issue_lines());
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_missing_day_rejects() {
        let mut state = good_state();
        state.duration_days = 3;
        let result = PlanValidator::check(&state);
        assert!(!result.approved);
        assert_eq!(result.critical_count, 1);
        assert_eq!(result.issues[0].message, "Expected 3 days, got 2 days");
    }

    #[test]
    fn test_order_is_severity_then_checker() {
        let mut state = good_state();
        state.budget_check = Some(BudgetCheck::new(1500.0, 1000.0, vec![]));
        state.duration_days = 3;
        state.itinerary[0].activities[0].start_time = Some("04:00".to_string());

        let result = PlanValidator::check(&state);
        let cats: Vec<(IssueSeverity, IssueCategory)> = result.issues.iter().map(|i| (i.severity, i.category)).collect();
        assert_eq!(cats, vec![
            (IssueSeverity::Critical, IssueCategory::Structure),
            (IssueSeverity::Critical, IssueCategory::Budget),
            (IssueSeverity::Warning, IssueCategory::Timing),
        ]);
    }

    #[tokio::test]
    async fn test_holistic_warning_does_not_block() {
        let reasoner = Reasoner::new(Arc::new(MockLlmClient::always("Too rushed")), Duration::from_secs(1));
        let validator = PlanValidator::new().with_holistic(HolisticReview::new(
            reasoner,
            Arc::new(PromptLoader::embedded_only()),
        ));

        let result = validator.validate(&good_state()).await;
        assert!(result.approved);
        assert_eq!(result.warning_count, 1);
        assert_eq!(result.issues[0].category, IssueCategory::Quality);
    }
}
