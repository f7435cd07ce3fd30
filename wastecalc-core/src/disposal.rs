//! Disposal tariff and facility lookups.

use std::sync::Arc;

use crate::model::{ClassificationCode, Coordinate, DisposalFacility, DisposalTariff, FacilityId};
use crate::ports::{CalcError, FacilityRepository};

/// Resolves facilities and their per-code disposal tariffs.
pub struct DisposalTariffResolver {
    repository: Arc<dyn FacilityRepository>,
}

impl DisposalTariffResolver {
    /// Create a resolver on top of the given repository.
    #[must_use]
    pub fn new(repository: Arc<dyn FacilityRepository>) -> Self {
        Self { repository }
    }

    /// Disposal tariff for a code at a facility.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::TariffNotFound`] when the facility does not accept the code.
    pub async fn tariff_for(
        &self,
        code: &ClassificationCode,
        facility_id: &FacilityId,
    ) -> Result<DisposalTariff, CalcError> {
        self.repository
            .disposal_tariff(code, facility_id)
            .await?
            .ok_or_else(|| CalcError::TariffNotFound {
                code: code.clone(),
                facility: facility_id.clone(),
            })
    }

    /// Facility by id, only if it is active.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::FacilityNotFound`] for unknown and inactive facilities alike.
    pub async fn active_facility(
        &self,
        facility_id: &FacilityId,
    ) -> Result<DisposalFacility, CalcError> {
        match self.repository.facility(facility_id).await? {
            Some(facility) if facility.active => Ok(facility),
            _ => Err(CalcError::FacilityNotFound(facility_id.clone())),
        }
    }

    /// Active facilities near `origin` in the order the repository ranks them.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Repository`] when the store fails.
    pub async fn list_active_facilities_near(
        &self,
        origin: Coordinate,
        limit: usize,
    ) -> Result<Vec<DisposalFacility>, CalcError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.repository.active_facilities_near(origin, limit).await
    }

    /// Active facilities that have a tariff for `code`. Facilities without one are left out.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Repository`] when the store fails.
    pub async fn candidates(
        &self,
        code: &ClassificationCode,
    ) -> Result<Vec<(DisposalFacility, DisposalTariff)>, CalcError> {
        let candidates = self.repository.active_facilities_with_tariff(code).await?;
        Ok(candidates
            .into_iter()
            .filter(|(facility, tariff)| facility.active && tariff.facility_id() == &facility.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryFacilityRepository;

    fn code() -> ClassificationCode {
        "81110001494".parse().expect("valid code")
    }

    fn facility(id: &str, active: bool, lat: f64) -> DisposalFacility {
        DisposalFacility {
            id: FacilityId(id.to_owned()),
            name: format!("Polygon {id}"),
            address: String::new(),
            coordinate: Coordinate::new(lat, 37.6),
            active,
        }
    }

    async fn resolver() -> DisposalTariffResolver {
        let repository = InMemoryFacilityRepository::default();
        let entries = [
            ("north", true, 56.2),
            ("south", true, 55.1),
            ("closed", false, 55.8),
        ];
        for (id, active, lat) in entries {
            repository.insert_facility(facility(id, active, lat)).await;
            repository
                .insert_tariff(
                    DisposalTariff::new(code(), FacilityId(id.to_owned()), 420.0).expect("tariff"),
                )
                .await;
        }
        repository.insert_facility(facility("metal-only", true, 55.7)).await;
        DisposalTariffResolver::new(Arc::new(repository))
    }

    #[tokio::test]
    async fn tariff_lookup_and_missing_tariff() {
        let resolver = resolver().await;

        let tariff = resolver
            .tariff_for(&code(), &FacilityId("north".to_owned()))
            .await
            .expect("tariff");
        assert!((tariff.rub_per_ton() - 420.0).abs() < f64::EPSILON);

        let missing = resolver
            .tariff_for(&code(), &FacilityId("metal-only".to_owned()))
            .await;
        assert!(matches!(missing, Err(CalcError::TariffNotFound { .. })));
    }

    #[tokio::test]
    async fn inactive_facility_is_not_found() {
        let resolver = resolver().await;
        let closed = resolver.active_facility(&FacilityId("closed".to_owned())).await;
        assert!(matches!(closed, Err(CalcError::FacilityNotFound(_))));

        let unknown = resolver.active_facility(&FacilityId("nowhere".to_owned())).await;
        assert!(matches!(unknown, Err(CalcError::FacilityNotFound(_))));
    }

    #[tokio::test]
    async fn candidates_require_tariff_and_active_flag() {
        let resolver = resolver().await;
        let ids: Vec<String> = resolver
            .candidates(&code())
            .await
            .expect("candidates")
            .into_iter()
            .map(|(facility, _)| facility.id.0)
            .collect();
        assert_eq!(ids, vec!["north".to_owned(), "south".to_owned()]);
    }

    #[tokio::test]
    async fn nearby_facilities_are_ordered_by_distance() {
        let resolver = resolver().await;
        let nearby = resolver
            .list_active_facilities_near(Coordinate::new(55.2, 37.6), 2)
            .await
            .expect("nearby");
        let ids: Vec<&str> = nearby.iter().map(|facility| facility.id.0.as_str()).collect();
        assert_eq!(ids, vec!["south", "metal-only"]);
    }
}
