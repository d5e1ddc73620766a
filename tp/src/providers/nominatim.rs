//! Nominatim-compatible HTTP geocoder

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{Geocoder, ProviderError};
use crate::config::GeoConfig;

/// Geocoder against an OpenStreetMap Nominatim `/search` endpoint
pub struct NominatimGeocoder {
    http: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn from_config(config: &GeoConfig) -> Result<Self, ProviderError> {
        debug!(url = %config.geocoder_url, "NominatimGeocoder::from_config: called");
        if config.geocoder_url.trim().is_empty() {
            return Err(ProviderError::NotConfigured("geocoder-url is empty".to_string()));
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            url: config.geocoder_url.clone(),
        })
    }

    /// First match of a Nominatim JSON body
    fn parse_body(body: &str) -> Result<Option<(f64, f64)>, ProviderError> {
        let places: Vec<NominatimPlace> = serde_json::from_str(body)?;
        let Some(place) = places.into_iter().next() else {
            debug!("NominatimGeocoder::parse_body: no match branch");
            return Ok(None);
        };
        let lat = place
            .lat
            .parse::<f64>()
            .map_err(|e| ProviderError::Parse(format!("lat: {}", e)))?;
        let lon = place
            .lon
            .parse::<f64>()
            .map_err(|e| ProviderError::Parse(format!("lon: {}", e)))?;
        Ok(Some((lat, lon)))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, location: &str) -> Result<Option<(f64, f64)>, ProviderError> {
        debug!(%location, "NominatimGeocoder::geocode: called");
        let response = self
            .http
            .get(&self.url)
            .query(&[("q", location), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "NominatimGeocoder::geocode: error status branch");
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        Self::parse_body(&body)
    }
}
