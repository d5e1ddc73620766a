//! Knowledge search capability

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::traits::parse_params;
use super::{Capability, CapabilityCategory, Outcome, OutcomeData};
use crate::config::KnowledgeConfig;
use crate::providers::{KnowledgeBase, KnowledgeRecord};
use crate::state::Attraction;

/// Delay before the first retry; doubles each attempt
const RETRY_BACKOFF_MS: u64 = 250;

/// Attraction retrieval with a score threshold, retries and a timeout
pub struct KnowledgeSearch {
    base: Arc<dyn KnowledgeBase>,
    min_score: f64,
    max_results: usize,
    retries: u32,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

/// Exponential backoff before retry `attempt`, never longer than `cap`
fn retry_backoff(attempt: u32, cap: Duration) -> Duration {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(RETRY_BACKOFF_MS.saturating_mul(factor)).min(cap)
}

impl KnowledgeSearch {
    pub fn new(base: Arc<dyn KnowledgeBase>, config: &KnowledgeConfig) -> Self {
        debug!(min_score = config.min_score, retries = config.retries, "KnowledgeSearch::new: called");
        if config.retries > config.effective_retries() {
            warn!("knowledge retries {} capped at {}", config.retries, config.effective_retries());
        }
        Self {
            base,
            min_score: config.min_score,
            max_results: config.max_results.max(1),
            retries: config.effective_retries(),
            timeout: config.timeout(),
        }
    }

    /// Search attractions scoring strictly above the threshold
    ///
    /// The collaborator is tried `retries + 1` times, each attempt bounded by
    /// the timeout. When every attempt fails the result is empty.
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<Attraction> {
        debug!(%query, max_results, "KnowledgeSearch::search: called");
        let limit = max_results.clamp(1, self.max_results);

        for attempt in 0..=self.retries {
            if attempt > 0 {
                let backoff = retry_backoff(attempt, self.timeout);
                warn!(attempt, backoff_ms = backoff.as_millis() as u64, "Retrying knowledge search");
                tokio::time::sleep(backoff).await;
            }

            match tokio::time::timeout(self.timeout, self.base.search(query, limit)).await {
                Ok(Ok(records)) => {
                    let attractions = self.keep_relevant(records, limit);
                    info!("Knowledge search for '{}' returned {} attractions", query, attractions.len());
                    return attractions;
                }
                Ok(Err(e)) => {
                    debug!(attempt, error = %e, "KnowledgeSearch::search: collaborator error branch");
                    warn!("Knowledge search attempt {} failed: {}", attempt + 1, e);
                }
                Err(_) => {
                    debug!(attempt, "KnowledgeSearch::search: timeout branch");
                    warn!("Knowledge search attempt {} timed out after {:?}", attempt + 1, self.timeout);
                }
            }
        }

        warn!(
            "Knowledge search for '{}' gave up after {} attempts, continuing without results",
            query,
            self.retries + 1
        );
        Vec::new()
    }

    fn keep_relevant(&self, records: Vec<KnowledgeRecord>, limit: usize) -> Vec<Attraction> {
        debug!(count = records.len(), min_score = self.min_score, "KnowledgeSearch::keep_relevant: called");
        records
            .into_iter()
            .filter(|r| r.score > self.min_score)
            .take(limit)
            .map(|r| Attraction {
                name: r.name,
                category: r.category,
                price: r.price,
                description: r.description,
                relevance_score: r.score,
                source: r.source,
            })
            .collect()
    }
}

#[async_trait]
impl Capability for KnowledgeSearch {
    fn name(&self) -> &'static str {
        "search_attractions"
    }

    fn description(&self) -> &'static str {
        "Search the knowledge base for attractions at the destination"
    }

    fn category(&self) -> CapabilityCategory {
        CapabilityCategory::KnowledgeRetrieval
    }

    fn parallelizable(&self) -> bool {
        true
    }

    async fn invoke(&self, params: Value) -> Outcome {
        debug!(%params, "KnowledgeSearch::invoke: called");
        let params: SearchParams = match parse_params(self.name(), params) {
            Ok(p) => p,
            Err(outcome) => return outcome,
        };
        if params.query.trim().is_empty() {
            return Outcome::failure("Search query is empty");
        }

        let attractions = self.search(&params.query, params.max_results.unwrap_or(self.max_results)).await;
        let summary = if attractions.is_empty() {
            "No attractions found".to_string()
        } else {
            let names: Vec<&str> = attractions.iter().take(5).map(|a| a.name.as_str()).collect();
            format!("Found {} attractions: {}", attractions.len(), names.join(", "))
        };
        Outcome::success(OutcomeData::Attractions(attractions), summary)
    }
}
