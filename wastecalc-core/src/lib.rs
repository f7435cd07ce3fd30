//! Pricing core for construction-waste transport and disposal.

/// Disposal facility and tariff lookups.
pub mod disposal;
/// Road distances with caching and haversine fallback.
pub mod distance;
/// Great-circle distance helpers.
pub mod geo;
/// In-memory repositories and dataset loading.
pub mod memory;
/// Domain models and identifiers.
pub mod model;
/// Traits describing collaborators and shared error types.
pub mod ports;
/// Request bodies and their validation.
pub mod request;
/// High-level calculator facade used by clients.
pub mod service;
/// Transport tariff table generation and lookup.
pub mod tariff;

pub use model::*;
pub use ports::*;
pub use service::*;
