//! Capability trait definition

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::state::{Attraction, BudgetCheck, Coordinates, Poi};

/// What kind of work a capability does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityCategory {
    KnowledgeRetrieval,
    Geocoding,
    Validation,
    Search,
    Generation,
    General,
}

impl CapabilityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnowledgeRetrieval => "knowledge-retrieval",
            Self::Geocoding => "geocoding",
            Self::Validation => "validation",
            Self::Search => "search",
            Self::Generation => "generation",
            Self::General => "general",
        }
    }
}

impl fmt::Display for CapabilityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An external action the planner can take
///
/// `invoke` never fails: collaborator errors, bad parameters and empty
/// results all come back as an [`Outcome`].
#[async_trait]
pub trait Capability: Send + Sync {
    /// Unique name (matches the action token in reasoning prompts)
    fn name(&self) -> &'static str;

    /// Human-readable description for prompt menus
    fn description(&self) -> &'static str;

    fn category(&self) -> CapabilityCategory;

    /// Safe to run concurrently with other invocations
    fn parallelizable(&self) -> bool {
        false
    }

    /// Run the capability
    async fn invoke(&self, params: Value) -> Outcome;
}

/// Name/description/category/parallelizable, for prompt construction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub category: CapabilityCategory,
    pub parallelizable: bool,
}

/// Structured payload of a successful invocation
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeData {
    None,
    Attractions(Vec<Attraction>),
    Coordinates(Vec<Coordinates>),
    Budget(BudgetCheck),
    Places(Vec<Poi>),
}

/// Result of a capability invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub success: bool,
    pub data: OutcomeData,
    /// One-line human summary used as the loop's observation
    pub summary: String,
    pub error: Option<String>,
    pub duration: Duration,
}

impl Outcome {
    /// Create a successful outcome
    pub fn success(data: OutcomeData, summary: impl Into<String>) -> Self {
        debug!("Outcome::success: called");
        Self {
            success: true,
            data,
            summary: summary.into(),
            error: None,
            duration: Duration::ZERO,
        }
    }

    /// Create a failed outcome
    pub fn failure(error: impl Into<String>) -> Self {
        debug!("Outcome::failure: called");
        let error = error.into();
        Self {
            success: false,
            data: OutcomeData::None,
            summary: format!("Error: {}", error),
            error: Some(error),
            duration: Duration::ZERO,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Deserialize capability parameters or explain why not
pub(crate) fn parse_params<T: serde::de::DeserializeOwned>(name: &str, params: Value) -> Result<T, Outcome> {
    serde_json::from_value(params).map_err(|e| {
        debug!(%name, error = %e, "parse_params: invalid parameters");
        Outcome::failure(format!("Invalid parameters for {}: {}", name, e))
    })
}
