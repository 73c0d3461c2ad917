use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::Coordinates;

pub const DEFAULT_GEOCODER_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_GEOCODER_USER_AGENT: &str = "elderly-home-care-backend/1.0";

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("unusable geocoder result: {0}")]
    Malformed(String),
}

/// Resolves a free-form address. Failures are logged and reported as `None`.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Option<Coordinates>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeocoder;

#[async_trait]
impl Geocoder for DisabledGeocoder {
    async fn geocode(&self, _address: &str) -> Option<Coordinates> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocoderConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_GEOCODER_ENDPOINT.into(),
            user_agent: DEFAULT_GEOCODER_USER_AGENT.into(),
            timeout_secs: 10,
        }
    }
}

impl GeocoderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let enabled = match std::env::var("CM_GEOCODER_ENABLED") {
            Ok(val) => matches!(val.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
            Err(_) => defaults.enabled,
        };
        Self {
            enabled,
            endpoint: std::env::var("CM_GEOCODER_ENDPOINT").unwrap_or(defaults.endpoint),
            user_agent: std::env::var("CM_GEOCODER_USER_AGENT").unwrap_or(defaults.user_agent),
            timeout_secs: std::env::var("CM_GEOCODER_TIMEOUT_SECS")
                .ok()
                .and_then(|raw| raw.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

// Nominatim serializes coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

#[derive(Clone)]
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    async fn lookup(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", address),
                ("format", "json"),
                ("addressdetails", "0"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status));
        }

        let places: Vec<Place> = response.json().await?;
        let Some(first) = places.into_iter().next() else {
            return Ok(None);
        };
        let lat = first.lat.trim().parse::<f64>();
        let lon = first.lon.trim().parse::<f64>();
        match (lat, lon) {
            (Ok(lat), Ok(lon)) => {
                let coordinates = Coordinates::new(lat, lon);
                if coordinates.is_valid() {
                    Ok(Some(coordinates))
                } else {
                    Err(GeocodeError::Malformed(format!("{lat},{lon} out of range")))
                }
            }
            _ => Err(GeocodeError::Malformed(format!("{},{}", first.lat, first.lon))),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    #[instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Option<Coordinates> {
        match self.lookup(address).await {
            Ok(found) => {
                debug!(found = found.is_some(), "geocoded address");
                found
            }
            Err(err) => {
                warn!(error = %err, "geocoding failed");
                None
            }
        }
    }
}
