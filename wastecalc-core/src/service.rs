//! High-level calculator facade combining distances, transport tariffs, and disposal tariffs.

use std::sync::Arc;

use tracing::debug;

use crate::disposal::DisposalTariffResolver;
use crate::model::{
    CargoSpec, ClassificationCode, Coordinate, DisposalFacility, DisposalQuote, DisposalTariff,
    FacilityId, FacilitySummary, TransportQuote,
};
use crate::ports::{CalcError, DistancePort, FacilityRepository, TariffRepository};
use crate::tariff::{TariffTableParams, TransportTariffResolver, billable_km};

/// Maximum number of facilities returned by automatic disposal ranking.
pub const AUTO_DISPOSAL_LIMIT: usize = 5;

/// Public entry point for pricing transport and disposal orders.
pub struct CalculatorService {
    distances: Arc<dyn DistancePort>,
    transport: TransportTariffResolver,
    disposal: DisposalTariffResolver,
}

impl CalculatorService {
    /// Create a calculator bound to the given collaborators.
    #[must_use]
    pub fn new(
        distances: Arc<dyn DistancePort>,
        tariffs: Arc<dyn TariffRepository>,
        facilities: Arc<dyn FacilityRepository>,
    ) -> Self {
        Self {
            distances,
            transport: TransportTariffResolver::new(tariffs),
            disposal: DisposalTariffResolver::new(facilities),
        }
    }

    /// Price hauling `cargo` from `pickup` to `dropoff`.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Validation`] for bad coordinates, and the tariff lookup errors of
    /// [`TransportTariffResolver::price_for_distance`].
    pub async fn calculate_transport(
        &self,
        pickup: Coordinate,
        dropoff: Coordinate,
        cargo: &CargoSpec,
    ) -> Result<TransportQuote, CalcError> {
        pickup.validate("pickup")?;
        dropoff.validate("dropoff")?;

        let distance_km = self.distances.road_distance_km(pickup, dropoff).await;
        let transport = self
            .transport
            .price_for_distance(billable_km(distance_km), cargo)
            .await?;

        Ok(TransportQuote {
            distance_km,
            transport_tariff: transport.tariff_per_unit,
            transport_price: transport.price,
            total_price: transport.price,
            volume_t: cargo.volume_t(),
            volume_m3: cargo.volume_m3(),
        })
    }

    /// Price hauling waste to one facility and disposing of it there.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::FacilityNotFound`] for missing or inactive facilities,
    /// [`CalcError::TariffNotFound`] when the facility does not accept the code, and the
    /// transport tariff errors.
    pub async fn calculate_disposal_single(
        &self,
        pickup: Coordinate,
        code: &ClassificationCode,
        cargo: &CargoSpec,
        facility_id: &FacilityId,
    ) -> Result<DisposalQuote, CalcError> {
        pickup.validate("pickup")?;

        let facility = self.disposal.active_facility(facility_id).await?;
        let tariff = self.disposal.tariff_for(code, &facility.id).await?;
        self.quote_disposal(pickup, &facility, &tariff, cargo).await
    }

    /// Rank the cheapest facilities accepting `code`, at most [`AUTO_DISPOSAL_LIMIT`].
    ///
    /// Results are sorted by total price, ties broken by facility id. No qualifying facility
    /// yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Validation`] for bad coordinates, repository failures, and
    /// [`CalcError::DistanceOutOfRange`] when any candidate lies beyond the tariff table; no
    /// partial ranking is returned then.
    pub async fn calculate_disposal_auto(
        &self,
        pickup: Coordinate,
        code: &ClassificationCode,
        cargo: &CargoSpec,
    ) -> Result<Vec<DisposalQuote>, CalcError> {
        pickup.validate("pickup")?;

        let candidates = self.disposal.candidates(code).await?;
        debug!(%code, candidates = candidates.len(), "ranking disposal facilities");

        let mut quotes = Vec::with_capacity(candidates.len());
        for (facility, tariff) in &candidates {
            quotes.push(self.quote_disposal(pickup, facility, tariff, cargo).await?);
        }

        rank_quotes(&mut quotes);
        quotes.truncate(AUTO_DISPOSAL_LIMIT);
        Ok(quotes)
    }

    /// Regenerate the transport tariff table.
    ///
    /// # Errors
    ///
    /// See [`TransportTariffResolver::generate_tariff_table`].
    pub async fn generate_tariff_table(
        &self,
        params: &TariffTableParams,
    ) -> Result<usize, CalcError> {
        self.transport.generate_tariff_table(params).await
    }

    /// Active facilities around `origin`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Validation`] for bad coordinates and repository failures.
    pub async fn nearby_facilities(
        &self,
        origin: Coordinate,
        limit: usize,
    ) -> Result<Vec<DisposalFacility>, CalcError> {
        origin.validate("origin")?;
        self.disposal.list_active_facilities_near(origin, limit).await
    }

    async fn quote_disposal(
        &self,
        pickup: Coordinate,
        facility: &DisposalFacility,
        tariff: &DisposalTariff,
        cargo: &CargoSpec,
    ) -> Result<DisposalQuote, CalcError> {
        let distance_km = self
            .distances
            .road_distance_km(pickup, facility.coordinate)
            .await;
        let transport = self
            .transport
            .price_for_distance(billable_km(distance_km), cargo)
            .await?;

        let utilization_tariff = tariff.rub_per_ton();
        let utilization_price = utilization_tariff * cargo.volume_t();

        Ok(DisposalQuote {
            facility: FacilitySummary::from(facility),
            distance_km,
            transport_tariff: transport.tariff_per_unit,
            transport_price: transport.price,
            utilization_tariff,
            utilization_price,
            total_price: transport.price + utilization_price,
            volume_t: cargo.volume_t(),
            volume_m3: cargo.volume_m3(),
        })
    }
}

fn rank_quotes(quotes: &mut [DisposalQuote]) {
    quotes.sort_by(|left, right| {
        left.total_price
            .total_cmp(&right.total_price)
            .then_with(|| left.facility.id.cmp(&right.facility.id))
    });
}
