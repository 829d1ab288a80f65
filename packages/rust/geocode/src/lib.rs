//! Forward geocoding of institution addresses through OpenCage.

use std::time::Duration;

use profsite_shared::{AppConfig, Point, ProfsiteError, Result, resolve_api_key, validate_api_base};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// User-Agent string for geocoding requests.
const USER_AGENT: &str = concat!("profsite/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    lat: f64,
    lng: f64,
}

/// OpenCage API client.
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: Client,
    api_base: String,
    api_key: String,
}

impl Geocoder {
    /// Create a geocoder for `api_base` authenticated with `api_key`.
    pub fn new(api_base: &str, api_key: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProfsiteError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Build from the `[opencage]` section, reading the key from the environment.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_base = validate_api_base(&config.opencage.api_base, "opencage")?;
        let key = resolve_api_key(&config.opencage.api_key_env, "OpenCage")?;
        Self::new(&api_base, key, config.opencage.timeout_secs)
    }

    /// Location of the best match for `query`, or `None` when nothing matches.
    #[instrument(skip(self))]
    pub async fn geocode_address(&self, query: &str) -> Result<Option<Point>> {
        if query.trim().is_empty() {
            return Ok(None);
        }

        let url = format!("{}/geocode/v1/json", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("key", self.api_key.as_str()), ("no_annotations", "1")])
            .send()
            .await
            .map_err(|e| ProfsiteError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfsiteError::Remote {
                status: status.as_u16(),
                url,
            });
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| ProfsiteError::parse(format!("{url}: unexpected response body: {e}")))?;

        match body.results.first() {
            Some(best) => {
                let point = Point {
                    lng: best.geometry.lng,
                    lat: best.geometry.lat,
                };
                info!(lng = point.lng, lat = point.lat, "address geocoded");
                Ok(Some(point))
            }
            None => {
                debug!("no geocoding match");
                Ok(None)
            }
        }
    }
}
