//! Capabilities - external actions behind a uniform interface
//!
//! Each capability has a unique name, a description for prompt menus, a
//! category and a parallelizable flag. Invocation never fails: every error
//! is folded into a structured [`Outcome`].

mod budget;
mod geocode;
mod knowledge;
mod nearby;
mod registry;
mod traits;

pub use budget::{BudgetValidate, PricedItem, validate_budget};
pub use geocode::GeocodeLocations;
pub use knowledge::KnowledgeSearch;
pub use nearby::{DEFAULT_CATEGORY, DEFAULT_LIMIT, DEFAULT_RADIUS_KM, NearbySearch};
pub use registry::{CapabilityRegistry, CapabilitySet, DEFAULT_CAPABILITY_TIMEOUT};
pub use traits::{Capability, CapabilityCategory, CapabilityDescriptor, Outcome, OutcomeData};
