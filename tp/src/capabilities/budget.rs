//! Budget validation capability

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::traits::parse_params;
use super::{Capability, CapabilityCategory, Outcome, OutcomeData};
use crate::state::{Attraction, BudgetCheck, DayPlan, parse_price};

/// Most-expensive items suggested for replacement
const MAX_ITEM_SUGGESTIONS: usize = 3;

/// A priced line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedItem {
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub price: String,
}

impl PricedItem {
    pub fn new(name: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: String::new(),
            price: price.into(),
        }
    }

    pub fn from_attraction(attraction: &Attraction) -> Self {
        Self {
            name: attraction.name.clone(),
            category: attraction.category.clone(),
            price: attraction.price.clone(),
        }
    }

    /// Priced activities of an itinerary
    pub fn from_itinerary(itinerary: &[DayPlan]) -> Vec<Self> {
        itinerary
            .iter()
            .flat_map(|day| day.activities.iter())
            .filter_map(|a| {
                a.estimated_cost.map(|cost| Self {
                    name: a.name.clone(),
                    category: a.activity_type.to_string(),
                    price: format!("{:.2}", cost),
                })
            })
            .collect()
    }
}

/// Sum parsed prices and compare against the budget
///
/// Suggestions are only produced when the total exceeds the budget, listing
/// generic savings first and then the most expensive items.
pub fn validate_budget(items: &[PricedItem], budget: f64) -> BudgetCheck {
    debug!(item_count = items.len(), budget, "validate_budget: called");
    let costs: Vec<f64> = items.iter().map(|i| parse_price(&i.price)).collect();
    let total: f64 = costs.iter().sum();

    let recommendations = if total > budget {
        debug!(total, budget, "validate_budget: over budget branch");
        over_budget_suggestions(items, &costs, total - budget)
    } else {
        debug!(total, budget, "validate_budget: within budget branch");
        Vec::new()
    };

    BudgetCheck::new(total, budget, recommendations)
}

fn over_budget_suggestions(items: &[PricedItem], costs: &[f64], overage: f64) -> Vec<String> {
    let mut suggestions = vec![
        format!("Budget exceeded by ${:.2}", overage),
        "Consider these alternatives:".to_string(),
        "• Replace expensive attractions with free alternatives (parks, temples, beaches)".to_string(),
        "• Reduce dining budget by trying local street food or markets".to_string(),
        "• Use public transportation instead of taxis".to_string(),
        "• Choose budget-friendly accommodation options".to_string(),
    ];

    let mut ranked: Vec<(usize, f64)> = costs.iter().copied().enumerate().filter(|(_, c)| *c > 0.0).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    suggestions.extend(ranked.into_iter().take(MAX_ITEM_SUGGESTIONS).map(|(idx, _)| {
        format!(
            "• Consider cheaper alternative to {} ({})",
            items[idx].name, items[idx].price
        )
    }));
    suggestions
}

/// Capability wrapper around [`validate_budget`]
#[derive(Debug, Default)]
pub struct BudgetValidate;

#[derive(Debug, Deserialize)]
struct BudgetParams {
    items: Vec<PricedItem>,
    budget: f64,
}

#[async_trait]
impl Capability for BudgetValidate {
    fn name(&self) -> &'static str {
        "validate_budget"
    }

    fn description(&self) -> &'static str {
        "Total the prices of the found attractions and check them against the budget"
    }

    fn category(&self) -> CapabilityCategory {
        CapabilityCategory::Validation
    }

    fn parallelizable(&self) -> bool {
        true
    }

    async fn invoke(&self, params: Value) -> Outcome {
        debug!("BudgetValidate::invoke: called");
        let params: BudgetParams = match parse_params(self.name(), params) {
            Ok(p) => p,
            Err(outcome) => return outcome,
        };
        if params.items.is_empty() {
            return Outcome::failure("No attractions to validate. Search attractions first.");
        }

        let check = validate_budget(&params.items, params.budget);
        let summary = if check.within_budget {
            format!(
                "Within budget: total ${:.2} of ${:.2} (${:.2} remaining)",
                check.total_cost, check.budget, check.remaining
            )
        } else {
            format!(
                "Over budget: total ${:.2} exceeds ${:.2} by ${:.2}",
                check.total_cost,
                check.budget,
                -check.remaining
            )
        };
        info!("{}", summary);
        Outcome::success(OutcomeData::Budget(check), summary)
    }
}
