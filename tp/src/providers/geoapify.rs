//! Geoapify-compatible places client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{NearbyQuery, PlacesProvider, ProviderError};
use crate::config::GeoConfig;
use crate::state::Poi;

/// Nearby search against a Geoapify `/v2/places` endpoint
pub struct GeoapifyPlaces {
    http: Client,
    url: String,
    api_key: Option<String>,
    api_key_env: String,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Properties {
    name: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    lat: f64,
    lon: f64,
    /// Metres from the search centre
    distance: Option<f64>,
    formatted: Option<String>,
}

impl GeoapifyPlaces {
    pub fn from_config(config: &GeoConfig) -> Result<Self, ProviderError> {
        debug!(url = %config.places_url, "GeoapifyPlaces::from_config: called");
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            url: config.places_url.clone(),
            api_key: config.places_api_key(),
            api_key_env: config.places_api_key_env.clone(),
        })
    }

    /// Map planner categories onto Geoapify category ids
    fn category_id(category: &str) -> String {
        match category.trim().to_lowercase().as_str() {
            "" | "attraction" | "sightseeing" => "tourism.attraction".to_string(),
            "dining" | "restaurant" | "food" => "catering.restaurant".to_string(),
            "cafe" | "coffee" => "catering.cafe".to_string(),
            "hotel" | "accommodation" => "accommodation.hotel".to_string(),
            "museum" => "entertainment.museum".to_string(),
            "park" => "leisure.park".to_string(),
            "shopping" => "commercial.shopping_mall".to_string(),
            other => other.to_string(),
        }
    }

    fn parse_body(body: &str, category: &str) -> Result<Vec<Poi>, ProviderError> {
        let collection: FeatureCollection = serde_json::from_str(body)?;
        Ok(collection
            .features
            .into_iter()
            .filter_map(|f| {
                let p = f.properties;
                let name = p.name.filter(|n| !n.trim().is_empty())?;
                Some(Poi {
                    name,
                    category: p.categories.into_iter().next().unwrap_or_else(|| category.to_string()),
                    latitude: p.lat,
                    longitude: p.lon,
                    distance_km: p.distance.map(|m| m / 1000.0),
                    address: p.formatted,
                })
            })
            .collect())
    }
}

#[async_trait]
impl PlacesProvider for GeoapifyPlaces {
    async fn search_nearby(&self, query: &NearbyQuery) -> Result<Vec<Poi>, ProviderError> {
        debug!(?query, "GeoapifyPlaces::search_nearby: called");
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("GeoapifyPlaces::search_nearby: missing api key branch");
            return Err(ProviderError::NotConfigured(format!("{} not set", self.api_key_env)));
        };

        let radius_m = (query.radius_km * 1000.0).round().max(1.0) as u64;
        let filter = format!("circle:{},{},{}", query.longitude, query.latitude, radius_m);
        let bias = format!("proximity:{},{}", query.longitude, query.latitude);
        let limit = query.limit.to_string();
        let categories = Self::category_id(&query.category);

        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("categories", categories.as_str()),
                ("filter", filter.as_str()),
                ("bias", bias.as_str()),
                ("limit", limit.as_str()),
                ("apiKey", api_key),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let mut pois = Self::parse_body(&body, &query.category)?;
        pois.truncate(query.limit);
        Ok(pois)
    }
}
