//! Traits describing the collaborators of the calculator and the shared error types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Error as ReqwestError;

use crate::model::{
    ClassificationCode, Coordinate, DisposalFacility, DisposalTariff, FacilityId,
    TransportTariffRow,
};

#[derive(thiserror::Error, Debug)]
/// Errors surfaced to callers of the calculator.
pub enum CalcError {
    /// Caller input is malformed or out of range.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Facility does not exist or is inactive.
    #[error("Facility not found: {0}")]
    FacilityNotFound(FacilityId),
    /// Facility has no disposal tariff for the classification code.
    #[error("No disposal tariff for code {code} at facility {facility}")]
    TariffNotFound {
        /// Requested classification code.
        code: ClassificationCode,
        /// Requested facility.
        facility: FacilityId,
    },
    /// Transport tariff table has no row for the distance.
    #[error("No transport tariff for {0} km")]
    TransportTariffNotFound(u32),
    /// Distance is beyond the generated transport tariff table.
    #[error("Distance {distance_km} km exceeds the tariff table maximum of {max_km} km")]
    DistanceOutOfRange {
        /// Billable distance that was requested.
        distance_km: u32,
        /// Largest distance the table covers.
        max_km: u32,
    },
    /// Persistence collaborator failed.
    #[error("Repository error: {0}")]
    Repository(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Coarse classification of [`CalcError`] for mapping onto transport status codes.
pub enum ErrorKind {
    /// Bad request.
    Validation,
    /// Referenced data is missing.
    NotFound,
    /// Tariff table must be regenerated with a larger range.
    DistanceOutOfRange,
    /// Anything else.
    Internal,
}

impl CalcError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            CalcError::Validation(_) => ErrorKind::Validation,
            CalcError::FacilityNotFound(_)
            | CalcError::TariffNotFound { .. }
            | CalcError::TransportTariffNotFound(_) => ErrorKind::NotFound,
            CalcError::DistanceOutOfRange { .. } => ErrorKind::DistanceOutOfRange,
            CalcError::Repository(_) => ErrorKind::Internal,
        }
    }
}

#[derive(thiserror::Error, Debug)]
/// Failures of the external routing service. Never leaves the road distance provider.
pub enum RoutingError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Routing service answered with a non-success status.
    #[error("Routing service responded with status {0}")]
    Status(u16),
    /// Response did not contain a usable distance.
    #[error("Malformed routing payload: {0}")]
    MalformedPayload(String),
    /// Request took longer than the configured budget.
    #[error("Routing request timed out")]
    Timeout,
}

#[async_trait]
/// Trait for external driving-distance backends.
pub trait RoutingPort: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Driving distance between two points in kilometres.
    ///
    /// # Errors
    ///
    /// Returns a [`RoutingError`] when the backend cannot produce a distance.
    async fn driving_distance_km(&self, from: Coordinate, to: Coordinate)
    -> Result<f64, RoutingError>;
}

#[async_trait]
/// Source of road distances for the calculator. Infallible by contract.
pub trait DistancePort: Send + Sync {
    /// Road distance between two points in kilometres.
    async fn road_distance_km(&self, from: Coordinate, to: Coordinate) -> f64;
}

#[async_trait]
/// Storage for the per-kilometre transport tariff table.
pub trait TariffRepository: Send + Sync {
    /// Row for a whole-kilometre distance.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Repository`] when the store fails.
    async fn transport_tariff(&self, distance_km: u32)
    -> Result<Option<TransportTariffRow>, CalcError>;

    /// Largest distance present in the table, `None` when the table is empty.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Repository`] when the store fails.
    async fn max_distance_km(&self) -> Result<Option<u32>, CalcError>;

    /// Insert or overwrite rows keyed by distance. The whole slice is applied atomically.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Repository`] when the batch could not be committed.
    async fn upsert_transport_tariffs(&self, rows: &[TransportTariffRow]) -> Result<(), CalcError>;
}

#[async_trait]
/// Storage for disposal facilities and their per-code tariffs.
pub trait FacilityRepository: Send + Sync {
    /// Facility by id regardless of its active flag.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Repository`] when the store fails.
    async fn facility(&self, id: &FacilityId) -> Result<Option<DisposalFacility>, CalcError>;

    /// Tariff for a (code, facility) pair.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Repository`] when the store fails.
    async fn disposal_tariff(
        &self,
        code: &ClassificationCode,
        facility: &FacilityId,
    ) -> Result<Option<DisposalTariff>, CalcError>;

    /// Active facilities that accept the code, each with its tariff.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Repository`] when the store fails.
    async fn active_facilities_with_tariff(
        &self,
        code: &ClassificationCode,
    ) -> Result<Vec<(DisposalFacility, DisposalTariff)>, CalcError>;

    /// Active facilities close to `origin`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Repository`] when the store fails.
    async fn active_facilities_near(
        &self,
        origin: Coordinate,
        limit: usize,
    ) -> Result<Vec<DisposalFacility>, CalcError>;
}

/// Wall clock abstraction so cache expiry can be tested without sleeping.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
/// [`Clock`] backed by the system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
