//! Road distance provider using the openrouteservice directions API.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::debug;

use wastecalc_core::{
    model::Coordinate,
    ports::{RoutingError, RoutingPort},
};

const DEFAULT_BASE_URL: &str = "https://api.openrouteservice.org";
const PROFILE: &str = "driving-car";

/// Environment variable holding the API key. Absent means "no routing provider".
pub const API_KEY_ENV: &str = "ORS_API_KEY";
/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "ORS_BASE_URL";

/// Response from /v2/directions/{profile}, a `GeoJSON` feature collection.
#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    features: Vec<RouteFeature>,
}

#[derive(Debug, Deserialize)]
struct RouteFeature {
    properties: RouteProperties,
}

#[derive(Debug, Deserialize)]
struct RouteProperties {
    #[serde(default)]
    segments: Vec<RouteSegment>,
    // summary, way_points and friends are ignored
}

#[derive(Debug, Deserialize)]
struct RouteSegment {
    /// Metres.
    distance: Option<f64>,
}

#[derive(Debug, Clone)]
/// Connection settings for openrouteservice.
pub struct OpenRouteConfig {
    /// API root without trailing slash.
    pub base_url: String,
    /// API key sent in the `Authorization` header.
    pub api_key: String,
    /// Per-request timeout of the HTTP client.
    pub timeout_secs: u64,
}

impl OpenRouteConfig {
    /// Config for the public endpoint with the given key.
    #[must_use]
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: api_key.into(),
            timeout_secs: 5,
        }
    }

    /// Read [`API_KEY_ENV`] and [`BASE_URL_ENV`]. Returns `None` when no key is configured.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_parts(env::var(API_KEY_ENV).ok(), env::var(BASE_URL_ENV).ok())
    }

    fn from_parts(api_key: Option<String>, base_url: Option<String>) -> Option<Self> {
        let api_key = api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())?;

        let mut config = Self::new(api_key);
        if let Some(url) = base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
        {
            config.base_url = url.trim_end_matches('/').to_owned();
        }
        Some(config)
    }
}

/// Driving distance lookups against openrouteservice.
pub struct OpenRouteClient {
    client: Client,
    config: OpenRouteConfig,
}

impl OpenRouteClient {
    /// Create a client with its own HTTP connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Network`] when the HTTP client cannot be built.
    pub fn new(config: OpenRouteConfig) -> Result<Self, RoutingError> {
        let client = Client::builder()
            .user_agent("wastecalc/0.1")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client, config: OpenRouteConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl RoutingPort for OpenRouteClient {
    fn name(&self) -> &'static str {
        "openrouteservice"
    }

    async fn driving_distance_km(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<f64, RoutingError> {
        // openrouteservice expects lon,lat.
        let start = format!("{:.6},{:.6}", from.lon, from.lat);
        let end = format!("{:.6},{:.6}", to.lon, to.lat);

        let response = self
            .client
            .get(format!("{}/v2/directions/{PROFILE}", self.config.base_url))
            .header(AUTHORIZATION, self.config.api_key.as_str())
            .query(&[("start", start.as_str()), ("end", end.as_str())])
            .send()
            .await
            .map_err(|err| RoutingError::Network(err.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RoutingError::Status(status.as_u16()));
        }

        let body = response
            .json::<DirectionsResponse>()
            .await
            .map_err(|err| {
                // Error texts must not carry the request URL.
                let err = err.without_url();
                if err.is_decode() {
                    RoutingError::MalformedPayload(err.to_string())
                } else {
                    RoutingError::Network(err)
                }
            })?;

        let distance_km = route_distance_km(&body)?;
        debug!(%start, %end, distance_km, "openrouteservice route resolved");
        Ok(distance_km)
    }
}

/// Build the routing port when a key is configured, `None` otherwise.
///
/// # Errors
///
/// Returns [`RoutingError::Network`] when the HTTP client cannot be built.
pub fn routing_port(
    config: Option<OpenRouteConfig>,
) -> Result<Option<Arc<dyn RoutingPort>>, RoutingError> {
    let Some(config) = config else {
        return Ok(None);
    };
    let port: Arc<dyn RoutingPort> = Arc::new(OpenRouteClient::new(config)?);
    Ok(Some(port))
}

/// Distance of the first segment of the first route, in kilometres.
fn route_distance_km(response: &DirectionsResponse) -> Result<f64, RoutingError> {
    let metres = response
        .features
        .first()
        .and_then(|feature| feature.properties.segments.first())
        .and_then(|segment| segment.distance)
        .ok_or_else(|| {
            RoutingError::MalformedPayload("response has no route segment distance".to_owned())
        })?;

    if !metres.is_finite() || metres < 0.0 {
        return Err(RoutingError::MalformedPayload(format!(
            "segment distance {metres} is not usable"
        )));
    }
    Ok(metres / 1000.0)
}
