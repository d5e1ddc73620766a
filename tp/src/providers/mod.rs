//! External collaborators
//!
//! Narrow async interfaces the planner consumes: knowledge retrieval,
//! geocoding, nearby places and final-plan persistence. The shipped
//! implementations are a file-backed attraction catalog, Nominatim and
//! Geoapify compatible HTTP clients, a JSON file sink, and null providers
//! for offline runs.

mod catalog;
mod error;
mod geoapify;
mod nominatim;
mod null;
mod sink;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::{PlanState, Poi};

pub use catalog::{CatalogEntry, CatalogKnowledgeBase};
pub use error::ProviderError;
pub use geoapify::GeoapifyPlaces;
pub use nominatim::NominatimGeocoder;
pub use null::{NullGeocoder, NullPlaces};
pub use sink::{JsonFileSink, MemorySink};

/// Relevance-ranked retrieval record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeRecord {
    pub name: String,
    pub category: String,
    pub price: String,
    pub description: String,
    /// Similarity in 0..=1
    pub score: f64,
    pub source: String,
}

/// Knowledge retrieval (vector or lexical search)
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<KnowledgeRecord>, ProviderError>;
}

/// Forward geocoding
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Latitude/longitude for a location, `None` when nothing matched
    async fn geocode(&self, location: &str) -> Result<Option<(f64, f64)>, ProviderError>;
}

/// Nearby search parameters
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub category: String,
    pub limit: usize,
}

/// Points-of-interest lookup
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    async fn search_nearby(&self, query: &NearbyQuery) -> Result<Vec<Poi>, ProviderError>;
}

/// Persistence for finalized plans
#[async_trait]
pub trait PlanSink: Send + Sync {
    async fn persist(&self, state: &PlanState) -> Result<(), ProviderError>;
}
