//! Geocoding capability

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::traits::parse_params;
use super::{Capability, CapabilityCategory, Outcome, OutcomeData};
use crate::providers::Geocoder;
use crate::state::Coordinates;

/// Single and batch geocoding over a [`Geocoder`]
pub struct GeocodeLocations {
    geocoder: Arc<dyn Geocoder>,
}

#[derive(Debug, Deserialize)]
struct GeocodeParams {
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    locations: Vec<String>,
}

impl GeocodeLocations {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        debug!("GeocodeLocations::new: called");
        Self { geocoder }
    }

    async fn lookup(geocoder: &dyn Geocoder, location: &str) -> Coordinates {
        if location.trim().is_empty() {
            debug!("GeocodeLocations::lookup: empty location branch");
            return Coordinates::failed(location, "Empty location");
        }
        match geocoder.geocode(location).await {
            Ok(Some((lat, lon))) => Coordinates::found(location, lat, lon),
            Ok(None) => {
                debug!(%location, "GeocodeLocations::lookup: no match branch");
                Coordinates::failed(location, "No results found")
            }
            Err(e) => {
                debug!(%location, error = %e, "GeocodeLocations::lookup: error branch");
                Coordinates::failed(location, e.to_string())
            }
        }
    }

    /// Geocode one location; failures come back with `success = false`
    pub async fn geocode(&self, location: &str) -> Coordinates {
        debug!(%location, "GeocodeLocations::geocode: called");
        Self::lookup(self.geocoder.as_ref(), location).await
    }

    /// Geocode every location in parallel and wait for all of them
    ///
    /// Returns one entry per input, in input order. A lookup task that dies
    /// is reported as a failed entry rather than dropped.
    pub async fn geocode_batch(&self, locations: &[String]) -> Vec<Coordinates> {
        debug!(count = locations.len(), "GeocodeLocations::geocode_batch: called");
        let handles: Vec<_> = locations
            .iter()
            .map(|location| {
                let geocoder = Arc::clone(&self.geocoder);
                let location = location.clone();
                tokio::spawn(async move { Self::lookup(geocoder.as_ref(), &location).await })
            })
            .collect();

        let results: Vec<Coordinates> = join_all(handles)
            .await
            .into_iter()
            .zip(locations)
            .map(|(joined, location)| {
                joined.unwrap_or_else(|e| Coordinates::failed(location.as_str(), format!("Geocode task failed: {}", e)))
            })
            .collect();

        let found = results.iter().filter(|c| c.success).count();
        info!("Geocoded {}/{} locations", found, results.len());
        results
    }
}

#[async_trait]
impl Capability for GeocodeLocations {
    fn name(&self) -> &'static str {
        "geocode_locations"
    }

    fn description(&self) -> &'static str {
        "Look up coordinates for one location or a list of locations"
    }

    fn category(&self) -> CapabilityCategory {
        CapabilityCategory::Geocoding
    }

    fn parallelizable(&self) -> bool {
        true
    }

    async fn invoke(&self, params: Value) -> Outcome {
        debug!(%params, "GeocodeLocations::invoke: called");
        let params: GeocodeParams = match parse_params(self.name(), params) {
            Ok(p) => p,
            Err(outcome) => return outcome,
        };

        let mut locations = params.locations;
        if let Some(single) = params.location {
            locations.insert(0, single);
        }
        if locations.is_empty() {
            return Outcome::failure("No locations to geocode");
        }

        let results = self.geocode_batch(&locations).await;
        let found = results.iter().filter(|c| c.success).count();
        let summary = format!("Geocoded {}/{} locations", found, results.len());
        Outcome::success(OutcomeData::Coordinates(results), summary)
    }
}
