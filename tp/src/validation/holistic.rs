//! Natural-language review of the whole itinerary

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::issue::{IssueCategory, ValidationIssue};
use crate::llm::Reasoner;
use crate::prompts::PromptLoader;
use crate::state::{ActivityPlan, PlanState};

#[derive(Debug, Serialize)]
struct CritiqueDay {
    day_number: u32,
    theme: String,
    activities: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CritiqueContext {
    destination: String,
    days: u32,
    budget: String,
    itinerary: Vec<CritiqueDay>,
}

fn activity_line(activity: &ActivityPlan) -> String {
    format!(
        "{}: {} ({}, {} min, ${})",
        activity.start_time.as_deref().unwrap_or("--:--"),
        activity.name,
        activity.activity_type,
        activity.duration_minutes.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string()),
        activity
            .estimated_cost
            .map(|c| format!("{:.2}", c))
            .unwrap_or_else(|| "?".to_string()),
    )
}

/// Asks the reasoning collaborator for a critique
pub struct HolisticReview {
    reasoner: Reasoner,
    prompts: Arc<PromptLoader>,
}

impl HolisticReview {
    pub fn new(reasoner: Reasoner, prompts: Arc<PromptLoader>) -> Self {
        debug!("HolisticReview::new: called");
        Self { reasoner, prompts }
    }

    fn prompt(&self, state: &PlanState) -> eyre::Result<String> {
        let context = CritiqueContext {
            destination: state.destination_context(),
            days: state.duration_days,
            budget: format!("{:.2}", state.budget),
            itinerary: state
                .itinerary
                .iter()
                .map(|day| CritiqueDay {
                    day_number: day.day_number,
                    theme: day.theme.clone(),
                    activities: day.activities.iter().map(activity_line).collect(),
                })
                .collect(),
        };
        self.prompts.render("critique", &context)
    }

    /// A warning carrying the critique unless the reply contains "pass"
    ///
    /// Reasoning failures yield no issue.
    pub async fn review(&self, state: &PlanState) -> Vec<ValidationIssue> {
        debug!(plan_id = %state.plan_id, "HolisticReview::review: called");
        let prompt = match self.prompt(state) {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not build critique prompt: {}", e);
                return Vec::new();
            }
        };

        match self.reasoner.chat(&prompt).await {
            Ok(reply) if reply.to_lowercase().contains("pass") => {
                info!("Holistic review passed");
                Vec::new()
            }
            Ok(reply) => {
                debug!("HolisticReview::review: critique branch");
                vec![ValidationIssue::warning(
                    IssueCategory::Quality,
                    "LLM validation found issues",
                    reply.trim(),
                )]
            }
            Err(e) => {
                warn!("Holistic review skipped: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{MockLlmClient, MockReply};
    use crate::state::{ActivityType, DayPlan};
    use crate::validation::IssueSeverity;
    use std::time::Duration;

    fn review(client: MockLlmClient) -> (HolisticReview, Arc<MockLlmClient>) {
        let client = Arc::new(client);
        let reasoner = Reasoner::new(client.clone(), Duration::from_secs(1));
        (HolisticReview::new(reasoner, Arc::new(PromptLoader::embedded_only())), client)
    }

    fn state() -> PlanState {
        PlanState {
            destination: "Lima".to_string(),
            duration_days: 1,
            budget: 500.0,
            itinerary: vec![DayPlan::new(1, "Food", vec![
                ActivityPlan::new("Ceviche lunch", ActivityType::Dining).at("12:30", 90).costing(40.0),
            ])],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_pass_gives_no_issue() {
        let (review, client) = review(MockLlmClient::always("PASS - looks great"));
        assert!(review.review(&state()).await.is_empty());
        let prompt = &client.prompts()[0];
        assert!(prompt.contains("12:30: Ceviche lunch (dining, 90 min, $40.00)"));
    }

    #[tokio::test]
    async fn test_critique_becomes_warning() {
        let (review, _) = review(MockLlmClient::always("1. Too much food\n2. No rest"));
        let issues = review.review(&state()).await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::Quality);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
        assert_eq!(issues[0].suggestion, "1. Too much food\n2. No rest");
    }

    #[tokio::test]
    async fn test_failure_adds_nothing() {
        let (review, _) = review(MockLlmClient::new(vec![MockReply::Fail("down".to_string())]));
        assert!(review.review(&state()).await.is_empty());
    }
}
