//! Offline collaborators

use async_trait::async_trait;
use tracing::debug;

use super::{Geocoder, NearbyQuery, PlacesProvider, ProviderError};
use crate::state::Poi;

/// Places provider that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlaces;

#[async_trait]
impl PlacesProvider for NullPlaces {
    async fn search_nearby(&self, query: &NearbyQuery) -> Result<Vec<Poi>, ProviderError> {
        debug!(category = %query.category, "NullPlaces::search_nearby: called");
        Ok(Vec::new())
    }
}

/// Geocoder that matches nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGeocoder;

#[async_trait]
impl Geocoder for NullGeocoder {
    async fn geocode(&self, location: &str) -> Result<Option<(f64, f64)>, ProviderError> {
        debug!(%location, "NullGeocoder::geocode: called");
        Ok(None)
    }
}
