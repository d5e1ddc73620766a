//! CapabilityRegistry - named lookup and guarded invocation

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    BudgetValidate, Capability, CapabilityDescriptor, GeocodeLocations, KnowledgeSearch, NearbySearch, Outcome,
};
use crate::config::Config;
use crate::providers::{Geocoder, KnowledgeBase, PlacesProvider};

/// Default per-invocation time limit
pub const DEFAULT_CAPABILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// The four standard capabilities as typed handles
///
/// Graph nodes call these directly; the reasoning loop reaches the same
/// instances by name through [`CapabilitySet::registry`].
#[derive(Clone)]
pub struct CapabilitySet {
    pub knowledge: Arc<KnowledgeSearch>,
    pub geocode: Arc<GeocodeLocations>,
    pub budget: Arc<BudgetValidate>,
    pub nearby: Arc<NearbySearch>,
}

impl CapabilitySet {
    pub fn new(
        knowledge: Arc<dyn KnowledgeBase>,
        geocoder: Arc<dyn Geocoder>,
        places: Arc<dyn PlacesProvider>,
        config: &Config,
    ) -> Self {
        debug!("CapabilitySet::new: called");
        Self {
            knowledge: Arc::new(KnowledgeSearch::new(knowledge, &config.knowledge)),
            geocode: Arc::new(GeocodeLocations::new(geocoder)),
            budget: Arc::new(BudgetValidate),
            nearby: Arc::new(NearbySearch::from_config(places, &config.geo)),
        }
    }

    /// Registry exposing every capability by name
    pub fn registry(&self, timeout: Duration) -> CapabilityRegistry {
        debug!(?timeout, "CapabilitySet::registry: called");
        let mut registry = CapabilityRegistry::empty().with_timeout(timeout);
        registry.add(self.knowledge.clone());
        registry.add(self.geocode.clone());
        registry.add(self.budget.clone());
        registry.add(self.nearby.clone());
        registry
    }
}

/// Named capabilities with timeout and panic isolation around each call
#[derive(Clone)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Arc<dyn Capability>>,
    timeout: Duration,
}

impl CapabilityRegistry {
    /// Standard wiring over the given collaborators
    pub fn standard(
        knowledge: Arc<dyn KnowledgeBase>,
        geocoder: Arc<dyn Geocoder>,
        places: Arc<dyn PlacesProvider>,
        config: &Config,
    ) -> Self {
        debug!("CapabilityRegistry::standard: called");
        CapabilitySet::new(knowledge, geocoder, places, config).registry(config.agent.capability_timeout())
    }

    /// Create an empty registry (for testing)
    pub fn empty() -> Self {
        debug!("CapabilityRegistry::empty: called");
        Self {
            capabilities: BTreeMap::new(),
            timeout: DEFAULT_CAPABILITY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a capability, replacing any with the same name
    pub fn add(&mut self, capability: Arc<dyn Capability>) {
        debug!(name = %capability.name(), "CapabilityRegistry::add: called");
        self.capabilities.insert(capability.name().to_string(), capability);
    }

    pub fn has(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Descriptors for prompt construction, sorted by name
    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        debug!("CapabilityRegistry::descriptors: called");
        self.capabilities
            .values()
            .map(|c| CapabilityDescriptor {
                name: c.name().to_string(),
                description: c.description().to_string(),
                category: c.category(),
                parallelizable: c.parallelizable(),
            })
            .collect()
    }

    /// Invoke a capability by name
    ///
    /// Never fails: unknown names, timeouts and panics inside the capability
    /// all come back as a failed [`Outcome`].
    pub async fn invoke(&self, name: &str, params: Value) -> Outcome {
        debug!(%name, "CapabilityRegistry::invoke: called");
        let Some(capability) = self.capabilities.get(name) else {
            debug!(%name, "CapabilityRegistry::invoke: unknown capability branch");
            return Outcome::failure(format!("Unknown capability: {}", name));
        };

        let started = Instant::now();
        let call = AssertUnwindSafe(capability.invoke(params)).catch_unwind();
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                warn!("Capability {} panicked", name);
                Outcome::failure(format!("Capability {} panicked", name))
            }
            Err(_) => {
                warn!("Capability {} timed out after {:?}", name, self.timeout);
                Outcome::failure(format!("Capability {} timed out after {:?}", name, self.timeout))
            }
        };
        outcome.with_duration(started.elapsed())
    }
}
