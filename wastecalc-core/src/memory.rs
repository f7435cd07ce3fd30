//! In-memory repositories and the JSON dataset format that seeds them.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::geo::haversine_distance_km;
use crate::model::{
    ClassificationCode, Coordinate, DisposalFacility, DisposalTariff, FacilityId,
    TransportTariffRow,
};
use crate::ports::{CalcError, FacilityRepository, TariffRepository};
use crate::tariff::TariffTableParams;

/// Transport tariff table kept in a sorted map.
#[derive(Default)]
pub struct InMemoryTariffRepository {
    rows: RwLock<BTreeMap<u32, TransportTariffRow>>,
}

impl InMemoryTariffRepository {
    /// Snapshot of all rows ordered by distance.
    pub async fn rows(&self) -> Vec<TransportTariffRow> {
        self.rows.read().await.values().copied().collect()
    }
}

#[async_trait]
impl TariffRepository for InMemoryTariffRepository {
    async fn transport_tariff(
        &self,
        distance_km: u32,
    ) -> Result<Option<TransportTariffRow>, CalcError> {
        Ok(self.rows.read().await.get(&distance_km).copied())
    }

    async fn max_distance_km(&self) -> Result<Option<u32>, CalcError> {
        Ok(self.rows.read().await.keys().next_back().copied())
    }

    async fn upsert_transport_tariffs(&self, rows: &[TransportTariffRow]) -> Result<(), CalcError> {
        let mut table = self.rows.write().await;
        for row in rows {
            table.insert(row.distance_km, *row);
        }
        Ok(())
    }
}

/// Facilities and disposal tariffs kept in maps.
#[derive(Default)]
pub struct InMemoryFacilityRepository {
    facilities: RwLock<BTreeMap<FacilityId, DisposalFacility>>,
    tariffs: RwLock<HashMap<(ClassificationCode, FacilityId), DisposalTariff>>,
}

impl InMemoryFacilityRepository {
    /// Build a repository from dataset records, validating every row.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Validation`] for malformed codes, ids, coordinates, or rates, and for
    /// an id that appears twice.
    pub async fn from_records(records: Vec<FacilityRecord>) -> Result<Self, CalcError> {
        let repository = Self::default();
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            let id = FacilityId::parse(&record.id)?;
            if !seen.insert(id.clone()) {
                return Err(CalcError::Validation(format!(
                    "facility {id} appears more than once in the dataset"
                )));
            }
            let coordinate = Coordinate::new(record.lat, record.lon);
            coordinate.validate(&format!("facility {id}"))?;

            for tariff in record.tariffs {
                let code: ClassificationCode = tariff.fkko_code.parse()?;
                repository
                    .insert_tariff(DisposalTariff::new(code, id.clone(), tariff.rub_per_ton)?)
                    .await;
            }

            repository
                .insert_facility(DisposalFacility {
                    id,
                    name: record.name,
                    address: record.address,
                    coordinate,
                    active: record.active,
                })
                .await;
        }
        Ok(repository)
    }

    /// Insert or replace a facility.
    pub async fn insert_facility(&self, facility: DisposalFacility) {
        self.facilities
            .write()
            .await
            .insert(facility.id.clone(), facility);
    }

    /// Insert or replace the tariff for its (code, facility) pair.
    pub async fn insert_tariff(&self, tariff: DisposalTariff) {
        let key = (tariff.code().clone(), tariff.facility_id().clone());
        self.tariffs.write().await.insert(key, tariff);
    }

    /// Number of stored facilities, active or not.
    pub async fn facility_count(&self) -> usize {
        self.facilities.read().await.len()
    }
}

#[async_trait]
impl FacilityRepository for InMemoryFacilityRepository {
    async fn facility(&self, id: &FacilityId) -> Result<Option<DisposalFacility>, CalcError> {
        Ok(self.facilities.read().await.get(id).cloned())
    }

    async fn disposal_tariff(
        &self,
        code: &ClassificationCode,
        facility: &FacilityId,
    ) -> Result<Option<DisposalTariff>, CalcError> {
        let key = (code.clone(), facility.clone());
        Ok(self.tariffs.read().await.get(&key).cloned())
    }

    async fn active_facilities_with_tariff(
        &self,
        code: &ClassificationCode,
    ) -> Result<Vec<(DisposalFacility, DisposalTariff)>, CalcError> {
        let facilities = self.facilities.read().await;
        let tariffs = self.tariffs.read().await;

        Ok(facilities
            .values()
            .filter(|facility| facility.active)
            .filter_map(|facility| {
                tariffs
                    .get(&(code.clone(), facility.id.clone()))
                    .map(|tariff| (facility.clone(), tariff.clone()))
            })
            .collect())
    }

    async fn active_facilities_near(
        &self,
        origin: Coordinate,
        limit: usize,
    ) -> Result<Vec<DisposalFacility>, CalcError> {
        let facilities = self.facilities.read().await;
        let mut ranked: Vec<(f64, &DisposalFacility)> = facilities
            .values()
            .filter(|facility| facility.active)
            .map(|facility| (haversine_distance_km(origin, facility.coordinate), facility))
            .collect();
        ranked.sort_by(|left, right| left.0.total_cmp(&right.0));

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(_, facility)| facility.clone())
            .collect())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Seed data for the in-memory repositories.
pub struct Dataset {
    /// Control points for generating the transport tariff table on load.
    #[serde(default)]
    pub tariff_table: Option<TariffTableParams>,
    /// Disposal facilities with their tariffs.
    #[serde(default)]
    pub facilities: Vec<FacilityRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Raw facility entry of a [`Dataset`].
pub struct FacilityRecord {
    /// External facility id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Postal address.
    #[serde(default)]
    pub address: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Defaults to active.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Disposal rates by classification code.
    #[serde(default)]
    pub tariffs: Vec<TariffRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Raw disposal tariff entry of a [`FacilityRecord`].
pub struct TariffRecord {
    /// Classification code, separators allowed.
    pub fkko_code: String,
    /// Rate in rubles per ton.
    pub rub_per_ton: f64,
}

fn default_active() -> bool {
    true
}
