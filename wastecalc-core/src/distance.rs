//! Road distance lookups with a time-boxed in-memory cache and haversine fallback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::geo::road_distance_estimate_km;
use crate::model::Coordinate;
use crate::ports::{Clock, DistancePort, RoutingError, RoutingPort, SystemClock};

/// How long a cached distance stays fresh, in minutes.
pub const DEFAULT_CACHE_TTL_MINUTES: i64 = 10;

/// Upper bound for a single routing request.
pub const DEFAULT_ROUTING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
/// Tuning knobs for [`RoadDistanceProvider`].
pub struct RoadDistanceConfig {
    /// Age after which a cached distance is recomputed.
    pub cache_ttl: TimeDelta,
    /// Budget for one routing request before falling back to the estimate.
    pub request_timeout: Duration,
}

impl Default for RoadDistanceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: TimeDelta::minutes(DEFAULT_CACHE_TTL_MINUTES),
            request_timeout: DEFAULT_ROUTING_TIMEOUT,
        }
    }
}

/// Coordinate pair quantised to micro-degrees (about 10 cm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey([i64; 4]);

impl CacheKey {
    fn new(from: Coordinate, to: Coordinate) -> Self {
        Self([
            micro_degrees(from.lat),
            micro_degrees(from.lon),
            micro_degrees(to.lat),
            micro_degrees(to.lon),
        ])
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "validated coordinates times 1e6 fit easily into i64"
)]
fn micro_degrees(degrees: f64) -> i64 {
    (degrees * 1_000_000.0).round() as i64
}

#[derive(Debug, Clone, Copy)]
struct CachedDistance {
    distance_km: f64,
    cached_at: DateTime<Utc>,
}

/// Resolves driving distances through an optional [`RoutingPort`].
///
/// Lookups never fail: a missing backend, an error, a timeout, or an unusable payload all
/// degrade to [`road_distance_estimate_km`]. Results are cached per coordinate pair; stale
/// entries are replaced on the next read and never purged in the background.
pub struct RoadDistanceProvider {
    routing: Option<Arc<dyn RoutingPort>>,
    clock: Arc<dyn Clock>,
    config: RoadDistanceConfig,
    cache: DashMap<CacheKey, CachedDistance>,
}

impl RoadDistanceProvider {
    /// Provider using the system clock and default configuration.
    #[must_use]
    pub fn new(routing: Option<Arc<dyn RoutingPort>>) -> Self {
        Self::with_clock(routing, Arc::new(SystemClock), RoadDistanceConfig::default())
    }

    /// Provider with an explicit clock and configuration.
    #[must_use]
    pub fn with_clock(
        routing: Option<Arc<dyn RoutingPort>>,
        clock: Arc<dyn Clock>,
        config: RoadDistanceConfig,
    ) -> Self {
        Self {
            routing,
            clock,
            config,
            cache: DashMap::new(),
        }
    }

    /// Drop every cached distance.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached coordinate pairs, fresh or stale.
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    async fn resolve(&self, from: Coordinate, to: Coordinate) -> f64 {
        let Some(routing) = &self.routing else {
            return road_distance_estimate_km(from, to);
        };

        let outcome = match tokio::time::timeout(
            self.config.request_timeout,
            routing.driving_distance_km(from, to),
        )
        .await
        {
            Ok(result) => result.and_then(usable_distance),
            Err(_elapsed) => Err(RoutingError::Timeout),
        };

        match outcome {
            Ok(distance_km) => distance_km,
            Err(err) => {
                let estimate = road_distance_estimate_km(from, to);
                warn!(
                    backend = routing.name(),
                    ?from,
                    ?to,
                    error = %err,
                    estimate_km = estimate,
                    "routing failed, falling back to haversine estimate"
                );
                estimate
            }
        }
    }
}

fn usable_distance(distance_km: f64) -> Result<f64, RoutingError> {
    if distance_km.is_finite() && distance_km >= 0.0 {
        Ok(distance_km)
    } else {
        Err(RoutingError::MalformedPayload(format!(
            "distance {distance_km} is not a usable number"
        )))
    }
}

#[async_trait]
impl DistancePort for RoadDistanceProvider {
    async fn road_distance_km(&self, from: Coordinate, to: Coordinate) -> f64 {
        let key = CacheKey::new(from, to);
        let cached = self.cache.get(&key).map(|entry| *entry);

        if let Some(entry) = cached
            && self.clock.now() - entry.cached_at < self.config.cache_ttl
        {
            debug!(?from, ?to, distance_km = entry.distance_km, "road distance cache hit");
            return entry.distance_km;
        }

        let distance_km = self.resolve(from, to).await;
        self.cache.insert(
            key,
            CachedDistance {
                distance_km,
                cached_at: self.clock.now(),
            },
        );
        distance_km
    }
}
