//! Wire-level request bodies and their validation into domain inputs.

use serde::{Deserialize, Serialize};

use crate::model::{CargoSpec, ClassificationCode, Coordinate, FacilityId, Unit};
use crate::ports::CalcError;

fn default_compaction() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Body of a transport-only price request.
pub struct TransportRequest {
    /// Where the cargo is loaded.
    pub pickup_coords: Coordinate,
    /// Where the cargo is delivered.
    pub dropoff_coords: Coordinate,
    /// Amount of cargo in `unit`.
    pub volume: f64,
    /// `"t"` or `"m3"`.
    pub unit: String,
    /// Density in t/m³.
    #[serde(default = "default_compaction")]
    pub compaction: f64,
}

/// Validated transport request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportInput {
    /// Pickup point.
    pub pickup: Coordinate,
    /// Dropoff point.
    pub dropoff: Coordinate,
    /// Cargo description.
    pub cargo: CargoSpec,
}

impl TransportRequest {
    /// Validate every field without touching the network or the store.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Validation`] for the first malformed field.
    pub fn validate(&self) -> Result<TransportInput, CalcError> {
        self.pickup_coords.validate("pickup")?;
        self.dropoff_coords.validate("dropoff")?;
        let unit: Unit = self.unit.parse()?;
        Ok(TransportInput {
            pickup: self.pickup_coords,
            dropoff: self.dropoff_coords,
            cargo: CargoSpec::new(self.volume, unit, self.compaction)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Body of a disposal price request. Without `polygon_id` the best facilities are ranked.
pub struct DisposalRequest {
    /// Where the waste is loaded.
    pub pickup_coords: Coordinate,
    /// Waste classification code.
    pub fkko_code: String,
    /// Target facility for a single quote.
    #[serde(default)]
    pub polygon_id: Option<String>,
    /// Amount of waste in `unit`.
    pub volume: f64,
    /// `"t"` or `"m3"`.
    pub unit: String,
    /// Density in t/m³.
    #[serde(default = "default_compaction")]
    pub compaction: f64,
}

/// Validated disposal request.
#[derive(Debug, Clone, PartialEq)]
pub struct DisposalInput {
    /// Pickup point.
    pub pickup: Coordinate,
    /// Waste classification code.
    pub code: ClassificationCode,
    /// Cargo description.
    pub cargo: CargoSpec,
    /// Requested facility, if any.
    pub facility_id: Option<FacilityId>,
}

impl DisposalRequest {
    /// Validate every field without touching the network or the store.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Validation`] for the first malformed field.
    pub fn validate(&self) -> Result<DisposalInput, CalcError> {
        self.pickup_coords.validate("pickup")?;
        let code: ClassificationCode = self.fkko_code.parse()?;
        let unit: Unit = self.unit.parse()?;
        let cargo = CargoSpec::new(self.volume, unit, self.compaction)?;
        let facility_id = self
            .polygon_id
            .as_deref()
            .map(FacilityId::parse)
            .transpose()?;

        Ok(DisposalInput {
            pickup: self.pickup_coords,
            code,
            cargo,
            facility_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_request_parses_and_validates() {
        let body = r#"{
            "pickupCoords": { "lat": 55.75, "lon": 37.61 },
            "dropoffCoords": { "lat": 55.80, "lon": 37.50 },
            "volume": 10, "unit": "t", "compaction": 1
        }"#;
        let request: TransportRequest = serde_json::from_str(body).expect("body parses");
        let input = request.validate().expect("valid request");
        assert_eq!(input.cargo.unit(), Unit::Tonnes);
        assert!((input.cargo.volume_t() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn compaction_defaults_to_one() {
        let body = r#"{
            "pickupCoords": { "lat": 55.75, "lon": 37.61 },
            "dropoffCoords": { "lat": 55.80, "lon": 37.50 },
            "volume": 4, "unit": "m3"
        }"#;
        let request: TransportRequest = serde_json::from_str(body).expect("body parses");
        let input = request.validate().expect("valid request");
        assert!((input.cargo.volume_t() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn transport_request_rejects_unknown_unit() {
        let request = TransportRequest {
            pickup_coords: Coordinate::new(55.75, 37.61),
            dropoff_coords: Coordinate::new(55.80, 37.50),
            volume: 10.0,
            unit: "kg".to_owned(),
            compaction: 1.0,
        };
        assert!(matches!(request.validate(), Err(CalcError::Validation(_))));
    }

    #[test]
    fn disposal_request_checks_code_and_facility() {
        let mut request = DisposalRequest {
            pickup_coords: Coordinate::new(55.75, 37.61),
            fkko_code: "81110001494".to_owned(),
            polygon_id: Some("poly-7".to_owned()),
            volume: 3.0,
            unit: "m3".to_owned(),
            compaction: 1.2,
        };
        let input = request.validate().expect("valid request");
        assert_eq!(input.facility_id, Some(FacilityId("poly-7".to_owned())));

        request.polygon_id = Some("   ".to_owned());
        assert!(request.validate().is_err());

        request.polygon_id = None;
        request.fkko_code = "8111".to_owned();
        assert!(matches!(request.validate(), Err(CalcError::Validation(_))));
    }

    #[test]
    fn disposal_request_rejects_non_positive_volume() {
        let request = DisposalRequest {
            pickup_coords: Coordinate::new(55.75, 37.61),
            fkko_code: "81110001494".to_owned(),
            polygon_id: None,
            volume: 0.0,
            unit: "t".to_owned(),
            compaction: 1.0,
        };
        assert!(matches!(request.validate(), Err(CalcError::Validation(_))));
    }
}
