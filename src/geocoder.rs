//! Address geocoding.
//!
//! Locations store coordinates derived from their address components. The
//! workflow asks a [`Geocoder`] for new coordinates whenever an address
//! changes; [`NominatimGeocoder`] is the HTTP implementation used in
//! production.

use async_trait::async_trait;
use failsafe::CircuitBreaker;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::config::GeocoderSettings;
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolves a free-text address to coordinates.
    ///
    /// Fails with [`AppError::Geocode`] when the provider errors or finds no match.
    async fn geocode(&self, address: &str) -> Result<Coordinates, AppError>;
}

/// Nominatim / OpenStreetMap search client.
///
/// Results are cached for 24 hours, keyed by a digest of the normalized
/// address, and provider calls go through a circuit breaker.
pub struct NominatimGeocoder<B> {
    client: reqwest::Client,
    base_url: String,
    country_codes: String,
    cache: Cache<String, Coordinates>,
    breaker: B,
}

impl<B: CircuitBreaker> NominatimGeocoder<B> {
    pub fn with_breaker(settings: &GeocoderSettings, breaker: B) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to create geocoder client: {}", e)))?;

        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(86400))
            .max_capacity(10_000)
            .build();

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            country_codes: settings.country_codes.clone(),
            cache,
            breaker,
        })
    }

    async fn search(&self, address: &str) -> Result<Option<Coordinates>, AppError> {
        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            &[
                ("q", address),
                ("countrycodes", self.country_codes.as_str()),
                ("format", "jsonv2"),
                ("limit", "1"),
            ],
        )
        .map_err(|e| AppError::InternalError(format!("Failed to build geocoder URL: {}", e)))?;

        tracing::debug!("Geocoding address: {}", address);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Geocode(format!("Geocoding request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::Geocode(
                "Geocoding provider rate limit exceeded".to_string(),
            ));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Geocoder returned error {}: {}", status, error_text);
            return Err(AppError::Geocode(format!(
                "Geocoding provider returned status {}",
                status
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            AppError::Geocode(format!("Failed to parse geocoding response: {}", e))
        })?;
        parse_response(&body)
    }
}

#[async_trait]
impl<B> Geocoder for NominatimGeocoder<B>
where
    B: CircuitBreaker + Send + Sync,
{
    async fn geocode(&self, address: &str) -> Result<Coordinates, AppError> {
        let normalized = normalize_address(address);
        if normalized.is_empty() {
            return Err(AppError::Geocode("Address is empty".to_string()));
        }

        let key = cache_key(&normalized);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!("Geocode cache HIT for: {}", normalized);
            return Ok(hit);
        }

        if !self.breaker.is_call_permitted() {
            tracing::warn!("Geocoder circuit open, rejecting lookup for: {}", normalized);
            return Err(AppError::Geocode(
                "Geocoding service temporarily unavailable".to_string(),
            ));
        }

        // A "no match" answer is a healthy provider response and does not
        // count against the breaker.
        let outcome = self.search(&normalized).await;
        let found = match self.breaker.call(|| outcome) {
            Ok(found) => found,
            Err(failsafe::Error::Inner(e)) => return Err(e),
            Err(failsafe::Error::Rejected) => {
                return Err(AppError::Geocode(
                    "Geocoding service temporarily unavailable".to_string(),
                ))
            }
        };

        let coordinates = found.ok_or_else(|| {
            AppError::Geocode(format!("No coordinates found for address '{}'", normalized))
        })?;

        self.cache.insert(key, coordinates).await;
        tracing::info!(
            "Geocoded '{}' to ({}, {})",
            normalized,
            coordinates.latitude,
            coordinates.longitude
        );
        Ok(coordinates)
    }
}

/// Collapses whitespace runs and trims, so cosmetic differences share a cache entry.
pub fn normalize_address(address: &str) -> String {
    address.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 of the lowercased address, hex encoded.
fn cache_key(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Parses a Nominatim `jsonv2` search response. An empty array means no match.
pub fn parse_response(body: &serde_json::Value) -> Result<Option<Coordinates>, AppError> {
    let results = body.as_array().ok_or_else(|| {
        AppError::Geocode("Geocoding response is not an array".to_string())
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let coordinate = |field: &str| {
        first[field]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .or_else(|| first[field].as_f64())
            .ok_or_else(|| AppError::Geocode(format!("Missing {} in geocoding response", field)))
    };

    Ok(Some(Coordinates {
        latitude: coordinate("lat")?,
        longitude: coordinate("lon")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_result() {
        let body = serde_json::json!([
            { "lat": "14.6507", "lon": "121.1029", "display_name": "Marikina" },
            { "lat": "0", "lon": "0" }
        ]);
        let coords = parse_response(&body).unwrap().unwrap();
        assert!((coords.latitude - 14.6507).abs() < 1e-6);
        assert!((coords.longitude - 121.1029).abs() < 1e-6);
    }

    #[test]
    fn empty_result_is_no_match() {
        assert!(parse_response(&serde_json::json!([])).unwrap().is_none());
    }

    #[test]
    fn rejects_malformed_responses() {
        assert!(parse_response(&serde_json::json!({ "error": "x" })).is_err());
        assert!(parse_response(&serde_json::json!([{ "lat": "abc", "lon": "1" }])).is_err());
    }

    #[test]
    fn normalization_collapses_whitespace() {
        assert_eq!(
            normalize_address("  123   Main St,\n Marikina "),
            "123 Main St, Marikina"
        );
    }

    #[test]
    fn cache_key_ignores_case() {
        assert_eq!(cache_key("Main St"), cache_key("MAIN ST"));
        assert_ne!(cache_key("Main St"), cache_key("Oak Ave"));
        assert_eq!(cache_key("x").len(), 64);
    }
}
