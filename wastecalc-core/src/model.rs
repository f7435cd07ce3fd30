//! Domain data structures for coordinates, cargo, facilities, tariffs, and quotes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ports::CalcError;

/// Number of digits in a waste classification (FKKO) code.
pub const CLASSIFICATION_CODE_LEN: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Latitude/longitude pair in degrees.
pub struct Coordinate {
    /// Latitude in degrees, `-90..=90`.
    pub lat: f64,
    /// Longitude in degrees, `-180..=180`.
    pub lon: f64,
}

impl Coordinate {
    /// Construct a coordinate without validation.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Check that both components are finite and inside the WGS84 range.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Validation`] naming `label` when the coordinate is unusable.
    pub fn validate(&self, label: &str) -> Result<(), CalcError> {
        if !self.lat.is_finite() || !self.lon.is_finite() {
            return Err(CalcError::Validation(format!(
                "{label} coordinates must be finite numbers"
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lon) {
            return Err(CalcError::Validation(format!(
                "{label} coordinates out of range: ({}, {})",
                self.lat, self.lon
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Measurement unit the customer states the cargo in.
pub enum Unit {
    /// Metric tons.
    #[serde(rename = "t")]
    Tonnes,
    /// Cubic metres.
    #[serde(rename = "m3")]
    CubicMetres,
}

impl fmt::Display for Unit {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Unit::Tonnes => "t",
            Unit::CubicMetres => "m3",
        };
        write!(formatter, "{tag}")
    }
}

impl FromStr for Unit {
    type Err = CalcError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "t" => Ok(Unit::Tonnes),
            "m3" | "m³" => Ok(Unit::CubicMetres),
            other => Err(CalcError::Validation(format!("unknown unit: {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Cargo volume with its unit and compaction factor.
///
/// The compaction factor is the density of the material in tons per cubic metre, so a
/// higher compaction means more tons fit into the same volume.
pub struct CargoSpec {
    volume: f64,
    unit: Unit,
    compaction: f64,
}

impl CargoSpec {
    /// Build a validated cargo description.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Validation`] when the volume or compaction is not a positive finite
    /// number.
    pub fn new(volume: f64, unit: Unit, compaction: f64) -> Result<Self, CalcError> {
        if !volume.is_finite() || volume <= 0.0 {
            return Err(CalcError::Validation(format!(
                "volume must be a positive number, got {volume}"
            )));
        }
        if !compaction.is_finite() || compaction <= 0.0 {
            return Err(CalcError::Validation(format!(
                "compaction must be a positive number, got {compaction}"
            )));
        }
        Ok(Self {
            volume,
            unit,
            compaction,
        })
    }

    /// Volume in the unit the customer stated.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Unit the volume is expressed in.
    #[must_use]
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Compaction factor (t/m³).
    #[must_use]
    pub fn compaction(&self) -> f64 {
        self.compaction
    }

    /// Cargo mass in tons.
    #[must_use]
    pub fn volume_t(&self) -> f64 {
        match self.unit {
            Unit::Tonnes => self.volume,
            Unit::CubicMetres => self.volume * self.compaction,
        }
    }

    /// Cargo volume in cubic metres.
    #[must_use]
    pub fn volume_m3(&self) -> f64 {
        match self.unit {
            Unit::Tonnes => self.volume / self.compaction,
            Unit::CubicMetres => self.volume,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
/// Waste classification (FKKO) code: exactly eleven digits.
pub struct ClassificationCode(String);

impl ClassificationCode {
    /// Digits of the code without separators.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ClassificationCode {
    type Err = CalcError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // Codes are often printed in groups ("8 11 100 01 49 4").
        let digits: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
        if digits.len() != CLASSIFICATION_CODE_LEN
            || !digits.chars().all(|ch| ch.is_ascii_digit())
        {
            return Err(CalcError::Validation(format!(
                "classification code must be {CLASSIFICATION_CODE_LEN} digits, got {raw:?}"
            )));
        }
        Ok(Self(digits))
    }
}

impl TryFrom<String> for ClassificationCode {
    type Error = CalcError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<ClassificationCode> for String {
    fn from(code: ClassificationCode) -> Self {
        code.0
    }
}

impl fmt::Display for ClassificationCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// External identifier of a disposal facility (polygon).
pub struct FacilityId(pub String);

impl FacilityId {
    /// Parse a caller-supplied identifier, rejecting blank input.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Validation`] when the identifier is empty.
    pub fn parse(raw: &str) -> Result<Self, CalcError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CalcError::Validation("facility id must not be empty".to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl fmt::Display for FacilityId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Licensed disposal or processing site.
pub struct DisposalFacility {
    /// Unique external identifier.
    pub id: FacilityId,
    /// Display name.
    pub name: String,
    /// Postal address.
    pub address: String,
    /// Location of the gate trucks drive to.
    pub coordinate: Coordinate,
    /// Inactive facilities are never quoted.
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
/// Disposal price for one classification code at one facility.
pub struct DisposalTariff {
    code: ClassificationCode,
    facility_id: FacilityId,
    rub_per_ton: f64,
}

impl DisposalTariff {
    /// Build a validated tariff row.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Validation`] when the rate is not a positive finite number.
    pub fn new(
        code: ClassificationCode,
        facility_id: FacilityId,
        rub_per_ton: f64,
    ) -> Result<Self, CalcError> {
        if !rub_per_ton.is_finite() || rub_per_ton <= 0.0 {
            return Err(CalcError::Validation(format!(
                "disposal tariff for {code} at {facility_id} must be positive, got {rub_per_ton}"
            )));
        }
        Ok(Self {
            code,
            facility_id,
            rub_per_ton,
        })
    }

    /// Classification code the rate applies to.
    #[must_use]
    pub fn code(&self) -> &ClassificationCode {
        &self.code
    }

    /// Facility the rate applies to.
    #[must_use]
    pub fn facility_id(&self) -> &FacilityId {
        &self.facility_id
    }

    /// Rate in rubles per ton.
    #[must_use]
    pub fn rub_per_ton(&self) -> f64 {
        self.rub_per_ton
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Precomputed transport prices for one whole kilometre of distance.
pub struct TransportTariffRow {
    /// Distance key, starting at 1.
    pub distance_km: u32,
    /// Cost price for hauling one ton over the whole distance.
    pub base_tariff_per_ton: f64,
    /// Cost price for hauling one ton over one kilometre.
    pub base_tariff_per_ton_km: f64,
    /// Cost price for hauling one cubic metre over the whole distance.
    pub base_tariff_per_m3: f64,
    /// Cost price for hauling one cubic metre over one kilometre.
    pub base_tariff_per_m3_km: f64,
    /// Customer price per ton.
    pub outgoing_tariff_per_ton: f64,
    /// Customer price per ton-kilometre.
    pub outgoing_tariff_per_ton_km: f64,
    /// Customer price per cubic metre.
    pub outgoing_tariff_per_m3: f64,
    /// Customer price per cubic-metre-kilometre.
    pub outgoing_tariff_per_m3_km: f64,
    /// `base_tariff_per_ton - outgoing_tariff_per_ton`.
    pub margin_per_ton: f64,
    /// `base_tariff_per_ton_km - outgoing_tariff_per_ton_km`.
    pub margin_per_ton_km: f64,
    /// `base_tariff_per_m3 - outgoing_tariff_per_m3`.
    pub margin_per_m3: f64,
    /// `base_tariff_per_m3_km - outgoing_tariff_per_m3_km`.
    pub margin_per_m3_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Facility identity attached to a disposal quote.
pub struct FacilitySummary {
    /// Facility identifier.
    pub id: FacilityId,
    /// Display name.
    pub name: String,
    /// Postal address.
    pub address: String,
    /// Facility location.
    pub coordinate: Coordinate,
}

impl From<&DisposalFacility> for FacilitySummary {
    fn from(facility: &DisposalFacility) -> Self {
        Self {
            id: facility.id.clone(),
            name: facility.name.clone(),
            address: facility.address.clone(),
            coordinate: facility.coordinate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Price breakdown for a transport-only order.
pub struct TransportQuote {
    /// Road distance between pickup and dropoff.
    pub distance_km: f64,
    /// Applied customer tariff per unit of cargo.
    pub transport_tariff: f64,
    /// Price of the haul.
    pub transport_price: f64,
    /// Amount the customer pays.
    pub total_price: f64,
    /// Cargo mass in tons.
    pub volume_t: f64,
    /// Cargo volume in cubic metres.
    pub volume_m3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Price breakdown for hauling waste to a facility and disposing of it there.
pub struct DisposalQuote {
    /// Facility the waste is delivered to.
    pub facility: FacilitySummary,
    /// Road distance between pickup and facility.
    pub distance_km: f64,
    /// Applied customer transport tariff per unit of cargo.
    pub transport_tariff: f64,
    /// Price of the haul.
    pub transport_price: f64,
    /// Facility disposal rate per ton.
    pub utilization_tariff: f64,
    /// Disposal fee.
    pub utilization_price: f64,
    /// `transport_price + utilization_price`.
    pub total_price: f64,
    /// Cargo mass in tons.
    pub volume_t: f64,
    /// Cargo volume in cubic metres.
    pub volume_m3: f64,
}
