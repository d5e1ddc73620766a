//! Nearby points-of-interest capability

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::traits::parse_params;
use super::{Capability, CapabilityCategory, Outcome, OutcomeData};
use crate::config::GeoConfig;
use crate::providers::{NearbyQuery, PlacesProvider, ProviderError};
use crate::state::Poi;

pub const DEFAULT_RADIUS_KM: f64 = 1.0;
pub const DEFAULT_CATEGORY: &str = "attraction";
pub const DEFAULT_LIMIT: usize = 10;

/// Points of interest around a coordinate
pub struct NearbySearch {
    places: Arc<dyn PlacesProvider>,
    radius_km: f64,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct NearbyParams {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    radius_km: Option<f64>,
    #[serde(default)]
    category: Option<String>,
}

impl NearbySearch {
    pub fn new(places: Arc<dyn PlacesProvider>) -> Self {
        debug!("NearbySearch::new: called");
        Self {
            places,
            radius_km: DEFAULT_RADIUS_KM,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn from_config(places: Arc<dyn PlacesProvider>, config: &GeoConfig) -> Self {
        debug!(radius_km = config.nearby_radius_km, limit = config.nearby_limit, "NearbySearch::from_config: called");
        let radius_km = if config.nearby_radius_km > 0.0 {
            config.nearby_radius_km
        } else {
            DEFAULT_RADIUS_KM
        };
        Self {
            places,
            radius_km,
            limit: config.nearby_limit.max(1),
        }
    }

    fn query(&self, latitude: f64, longitude: f64, radius_km: Option<f64>, category: Option<&str>) -> NearbyQuery {
        NearbyQuery {
            latitude,
            longitude,
            radius_km: radius_km.filter(|r| *r > 0.0).unwrap_or(self.radius_km),
            category: category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(DEFAULT_CATEGORY)
                .to_string(),
            limit: self.limit,
        }
    }

    async fn lookup(&self, query: &NearbyQuery) -> Result<Vec<Poi>, ProviderError> {
        let mut pois = self.places.search_nearby(query).await?;
        pois.truncate(query.limit);
        Ok(pois)
    }

    /// Points of interest within the radius; collaborator errors give an empty list
    pub async fn search(&self, latitude: f64, longitude: f64, radius_km: Option<f64>, category: Option<&str>) -> Vec<Poi> {
        debug!(latitude, longitude, ?radius_km, ?category, "NearbySearch::search: called");
        let query = self.query(latitude, longitude, radius_km, category);
        match self.lookup(&query).await {
            Ok(pois) => pois,
            Err(e) => {
                warn!("Nearby search failed, continuing without places: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Capability for NearbySearch {
    fn name(&self) -> &'static str {
        "search_nearby"
    }

    fn description(&self) -> &'static str {
        "Find points of interest around a latitude/longitude"
    }

    fn category(&self) -> CapabilityCategory {
        CapabilityCategory::Search
    }

    fn parallelizable(&self) -> bool {
        true
    }

    async fn invoke(&self, params: Value) -> Outcome {
        debug!(%params, "NearbySearch::invoke: called");
        let params: NearbyParams = match parse_params(self.name(), params) {
            Ok(p) => p,
            Err(outcome) => return outcome,
        };

        let query = self.query(params.latitude, params.longitude, params.radius_km, params.category.as_deref());
        match self.lookup(&query).await {
            Ok(pois) => {
                let summary = format!(
                    "Found {} {} places within {:.1} km",
                    pois.len(),
                    query.category,
                    query.radius_km
                );
                Outcome::success(OutcomeData::Places(pois), summary)
            }
            Err(e) => {
                debug!(error = %e, "NearbySearch::invoke: provider error branch");
                Outcome::failure(format!("Nearby search failed: {}", e))
            }
        }
    }
}
