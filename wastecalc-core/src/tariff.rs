//! Per-kilometre transport tariff table: generation from control points and price lookup.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{CargoSpec, TransportTariffRow, Unit};
use crate::ports::{CalcError, TariffRepository};

/// Rows written per repository call while generating the table.
pub const TARIFF_BATCH_SIZE: usize = 100;

/// Largest `maxDistanceKm` accepted, about half the Earth's circumference.
pub const MAX_TABLE_DISTANCE_KM: u32 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Administrative input for regenerating the transport tariff table.
pub struct TariffTableParams {
    /// Distance where the start tariff applies.
    pub start_km: f64,
    /// Tariff per ton-kilometre at `start_km` and below.
    pub start_tariff: f64,
    /// Distance where the end tariff applies.
    pub end_km: f64,
    /// Tariff per ton-kilometre at `end_km` and beyond.
    pub end_tariff: f64,
    /// Cubic metres billed per ton.
    pub volume_coeff: f64,
    /// Share of the base tariff kept as margin, in percent.
    pub margin_percent: f64,
    /// Last kilometre the table covers.
    pub max_distance_km: u32,
}

impl TariffTableParams {
    /// Check the parameters before any row is written.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Validation`] describing the first offending parameter.
    pub fn validate(&self) -> Result<(), CalcError> {
        let positive = [
            ("startKm", self.start_km),
            ("startTariff", self.start_tariff),
            ("endKm", self.end_km),
            ("endTariff", self.end_tariff),
            ("volumeCoeff", self.volume_coeff),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(CalcError::Validation(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if self.end_km <= self.start_km {
            return Err(CalcError::Validation(format!(
                "endKm ({}) must be greater than startKm ({})",
                self.end_km, self.start_km
            )));
        }
        if !(0.0..=100.0).contains(&self.margin_percent) {
            return Err(CalcError::Validation(format!(
                "marginPercent must be within 0..=100, got {}",
                self.margin_percent
            )));
        }
        if !(1..=MAX_TABLE_DISTANCE_KM).contains(&self.max_distance_km) {
            return Err(CalcError::Validation(format!(
                "maxDistanceKm must be within 1..={MAX_TABLE_DISTANCE_KM}, got {}",
                self.max_distance_km
            )));
        }
        Ok(())
    }

    /// Interpolation curve described by the control points.
    #[must_use]
    pub fn curve(&self) -> TariffCurve {
        TariffCurve {
            start_km: self.start_km,
            start_tariff: self.start_tariff,
            end_km: self.end_km,
            end_tariff: self.end_tariff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Piecewise-linear tariff per ton-kilometre, flat outside the control points.
pub struct TariffCurve {
    start_km: f64,
    start_tariff: f64,
    end_km: f64,
    end_tariff: f64,
}

impl TariffCurve {
    /// Tariff per ton-kilometre at `km`.
    #[must_use]
    pub fn rate_at(&self, km: f64) -> f64 {
        if km <= self.start_km {
            self.start_tariff
        } else if km >= self.end_km {
            self.end_tariff
        } else {
            self.start_tariff
                + (self.end_tariff - self.start_tariff) * (km - self.start_km)
                    / (self.end_km - self.start_km)
        }
    }
}

/// Rows from 1 km up to `max_distance_km`, produced lazily in distance order.
pub fn tariff_rows(
    params: &TariffTableParams,
) -> impl Iterator<Item = TransportTariffRow> + use<> {
    let curve = params.curve();
    let volume_coeff = params.volume_coeff;
    let keep = 1.0 - params.margin_percent / 100.0;

    (1..=params.max_distance_km).map(move |distance_km| {
        let per_ton_km = curve.rate_at(f64::from(distance_km));
        let per_ton = per_ton_km * f64::from(distance_km);
        let per_m3 = per_ton * volume_coeff;
        let per_m3_km = per_ton_km * volume_coeff;

        let outgoing_per_ton = per_ton * keep;
        let outgoing_per_ton_km = per_ton_km * keep;
        let outgoing_per_m3 = per_m3 * keep;
        let outgoing_per_m3_km = per_m3_km * keep;

        TransportTariffRow {
            distance_km,
            base_tariff_per_ton: per_ton,
            base_tariff_per_ton_km: per_ton_km,
            base_tariff_per_m3: per_m3,
            base_tariff_per_m3_km: per_m3_km,
            outgoing_tariff_per_ton: outgoing_per_ton,
            outgoing_tariff_per_ton_km: outgoing_per_ton_km,
            outgoing_tariff_per_m3: outgoing_per_m3,
            outgoing_tariff_per_m3_km: outgoing_per_m3_km,
            margin_per_ton: per_ton - outgoing_per_ton,
            margin_per_ton_km: per_ton_km - outgoing_per_ton_km,
            margin_per_m3: per_m3 - outgoing_per_m3,
            margin_per_m3_km: per_m3_km - outgoing_per_m3_km,
        }
    })
}

/// Whole kilometres billed for a road distance. Partial kilometres round up, minimum 1.
#[must_use]
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is clamped into the u32 range first"
)]
pub fn billable_km(distance_km: f64) -> u32 {
    if distance_km.is_nan() {
        return 1;
    }
    distance_km.ceil().clamp(1.0, f64::from(u32::MAX)) as u32
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Result of a transport tariff lookup.
pub struct TransportPrice {
    /// Customer tariff per ton or per cubic metre, matching the cargo unit.
    pub tariff_per_unit: f64,
    /// `tariff_per_unit` times the cargo volume.
    pub price: f64,
}

/// Reads and (re)generates the transport tariff table.
pub struct TransportTariffResolver {
    repository: Arc<dyn TariffRepository>,
}

impl TransportTariffResolver {
    /// Create a resolver on top of the given repository.
    #[must_use]
    pub fn new(repository: Arc<dyn TariffRepository>) -> Self {
        Self { repository }
    }

    /// Regenerate the table and return how many rows were written.
    ///
    /// Rows are upserted by distance in batches of [`TARIFF_BATCH_SIZE`], so running it twice
    /// with the same parameters leaves the same table behind.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::Validation`] for bad parameters and [`CalcError::Repository`] when
    /// a batch fails; batches committed before the failure stay in place.
    pub async fn generate_tariff_table(
        &self,
        params: &TariffTableParams,
    ) -> Result<usize, CalcError> {
        params.validate()?;
        let total = params.max_distance_km;
        let mut rows = tariff_rows(params);
        let mut batch = Vec::with_capacity(TARIFF_BATCH_SIZE);
        let mut written = 0;

        loop {
            batch.clear();
            batch.extend(rows.by_ref().take(TARIFF_BATCH_SIZE));
            if batch.is_empty() {
                break;
            }
            self.repository
                .upsert_transport_tariffs(&batch)
                .await
                .map_err(|err| {
                    CalcError::Repository(format!(
                        "tariff generation stopped after {written} of {total} rows: {err}"
                    ))
                })?;
            written += batch.len();
            debug!(written, total, "transport tariff batch committed");
        }

        info!(
            records = written,
            max_distance_km = params.max_distance_km,
            margin_percent = params.margin_percent,
            "transport tariff table generated"
        );
        Ok(written)
    }

    /// Customer transport price for hauling `cargo` over `distance_km` whole kilometres.
    ///
    /// # Errors
    ///
    /// Returns [`CalcError::DistanceOutOfRange`] when the distance is beyond the table,
    /// [`CalcError::TransportTariffNotFound`] when the row is otherwise missing.
    pub async fn price_for_distance(
        &self,
        distance_km: u32,
        cargo: &CargoSpec,
    ) -> Result<TransportPrice, CalcError> {
        let distance_km = distance_km.max(1);

        let Some(row) = self.repository.transport_tariff(distance_km).await? else {
            return match self.repository.max_distance_km().await? {
                Some(max_km) if distance_km > max_km => Err(CalcError::DistanceOutOfRange {
                    distance_km,
                    max_km,
                }),
                _ => Err(CalcError::TransportTariffNotFound(distance_km)),
            };
        };

        let (tariff_per_unit, volume) = match cargo.unit() {
            Unit::Tonnes => (row.outgoing_tariff_per_ton, cargo.volume_t()),
            Unit::CubicMetres => (row.outgoing_tariff_per_m3, cargo.volume_m3()),
        };

        Ok(TransportPrice {
            tariff_per_unit,
            price: tariff_per_unit * volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::memory::InMemoryTariffRepository;

    fn params() -> TariffTableParams {
        TariffTableParams {
            start_km: 1.0,
            start_tariff: 100.0,
            end_km: 30.0,
            end_tariff: 50.0,
            volume_coeff: 0.8,
            margin_percent: 15.0,
            max_distance_km: 250,
        }
    }

    fn row(distance_km: u32) -> TransportTariffRow {
        tariff_rows(&params())
            .find(|row| row.distance_km == distance_km)
            .expect("row present")
    }

    #[test]
    fn curve_hits_control_points_and_interpolates() {
        let curve = params().curve();
        assert!((curve.rate_at(1.0) - 100.0).abs() < 1e-9);
        assert!((curve.rate_at(30.0) - 50.0).abs() < 1e-9);

        let expected = 100.0 + (50.0 - 100.0) * (15.0 - 1.0) / (30.0 - 1.0);
        assert!((curve.rate_at(15.0) - expected).abs() < 1e-9);
        assert!(curve.rate_at(15.0) < 100.0 && curve.rate_at(15.0) > 50.0);
    }

    #[test]
    fn curve_is_flat_outside_control_points() {
        let curve = params().curve();
        assert!((curve.rate_at(0.0) - 100.0).abs() < 1e-9);
        assert!((curve.rate_at(1000.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn rows_are_contiguous_from_one() {
        let rows: Vec<TransportTariffRow> = tariff_rows(&params()).collect();
        assert_eq!(rows.len(), 250);
        for (expected, row) in (1..=250).zip(&rows) {
            assert_eq!(row.distance_km, expected);
        }
    }

    #[test]
    fn rows_scale_rate_by_distance_and_volume() {
        let at_15 = row(15);
        let rate = params().curve().rate_at(15.0);

        assert!((at_15.base_tariff_per_ton_km - rate).abs() < 1e-9);
        assert!((at_15.base_tariff_per_ton - rate * 15.0).abs() < 1e-9);
        assert!((at_15.base_tariff_per_m3 - rate * 15.0 * 0.8).abs() < 1e-9);
        assert!((at_15.base_tariff_per_m3_km - rate * 0.8).abs() < 1e-9);

        let at_200 = row(200);
        assert!((at_200.base_tariff_per_ton_km - 50.0).abs() < 1e-9);
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "margin must match the formula exactly")]
    fn margin_arithmetic_holds_for_every_row() {
        let params = params();
        let keep = 1.0 - params.margin_percent / 100.0;
        for row in tariff_rows(&params) {
            let pairs = [
                (row.base_tariff_per_ton, row.outgoing_tariff_per_ton, row.margin_per_ton),
                (
                    row.base_tariff_per_ton_km,
                    row.outgoing_tariff_per_ton_km,
                    row.margin_per_ton_km,
                ),
                (row.base_tariff_per_m3, row.outgoing_tariff_per_m3, row.margin_per_m3),
                (
                    row.base_tariff_per_m3_km,
                    row.outgoing_tariff_per_m3_km,
                    row.margin_per_m3_km,
                ),
            ];
            for (base, outgoing, margin) in pairs {
                assert_eq!(outgoing, base * keep, "outgoing at {} km", row.distance_km);
                assert_eq!(margin, base - outgoing, "margin at {} km", row.distance_km);
            }
        }
    }

    #[test]
    fn params_validation() {
        assert!(params().validate().is_ok());

        let reversed = TariffTableParams {
            end_km: 1.0,
            ..params()
        };
        assert!(reversed.validate().is_err());

        let greedy = TariffTableParams {
            margin_percent: 120.0,
            ..params()
        };
        assert!(greedy.validate().is_err());

        let empty = TariffTableParams {
            max_distance_km: 0,
            ..params()
        };
        assert!(empty.validate().is_err());

        let free = TariffTableParams {
            start_tariff: 0.0,
            ..params()
        };
        assert!(free.validate().is_err());

        let longest = TariffTableParams {
            max_distance_km: MAX_TABLE_DISTANCE_KM,
            ..params()
        };
        assert!(longest.validate().is_ok());
    }

    #[tokio::test]
    async fn oversized_table_is_rejected_before_writing() {
        let repository = Arc::new(InMemoryTariffRepository::default());
        let resolver =
            TransportTariffResolver::new(Arc::clone(&repository) as Arc<dyn TariffRepository>);
        let huge = TariffTableParams {
            max_distance_km: 4_000_000_000,
            ..params()
        };

        let err = resolver
            .generate_tariff_table(&huge)
            .await
            .expect_err("too many rows");
        assert!(matches!(err, CalcError::Validation(_)));
        assert!(repository.rows().await.is_empty());
    }

    #[tokio::test]
    async fn generation_writes_partial_last_batch() {
        let repository = Arc::new(InMemoryTariffRepository::default());
        let resolver =
            TransportTariffResolver::new(Arc::clone(&repository) as Arc<dyn TariffRepository>);

        let written = resolver
            .generate_tariff_table(&params())
            .await
            .expect("generate");
        assert_eq!(written, 250);
        assert_eq!(repository.rows().await.len(), 250);
        assert_eq!(repository.max_distance_km().await.expect("max"), Some(250));
    }

    #[test]
    fn billable_km_rounds_up() {
        assert_eq!(billable_km(0.0), 1);
        assert_eq!(billable_km(0.2), 1);
        assert_eq!(billable_km(20.0), 20);
        assert_eq!(billable_km(20.01), 21);
        assert_eq!(billable_km(f64::NAN), 1);
    }

    #[tokio::test]
    async fn regeneration_is_idempotent() {
        let repository = Arc::new(InMemoryTariffRepository::default());
        let resolver =
            TransportTariffResolver::new(Arc::clone(&repository) as Arc<dyn TariffRepository>);

        let first = resolver.generate_tariff_table(&params()).await.expect("first run");
        let snapshot = repository.rows().await;
        let second = resolver.generate_tariff_table(&params()).await.expect("second run");

        assert_eq!(first, 250);
        assert_eq!(second, 250);
        assert_eq!(repository.rows().await, snapshot);
    }

    #[tokio::test]
    async fn regeneration_overwrites_previous_values() {
        let repository = Arc::new(InMemoryTariffRepository::default());
        let resolver =
            TransportTariffResolver::new(Arc::clone(&repository) as Arc<dyn TariffRepository>);

        resolver.generate_tariff_table(&params()).await.expect("first run");
        let cheaper = TariffTableParams {
            start_tariff: 60.0,
            end_tariff: 30.0,
            max_distance_km: 100,
            ..params()
        };
        resolver.generate_tariff_table(&cheaper).await.expect("second run");

        let at_1 = repository
            .transport_tariff(1)
            .await
            .expect("lookup")
            .expect("row");
        assert!((at_1.base_tariff_per_ton_km - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn price_uses_unit_specific_tariff() {
        let repository = Arc::new(InMemoryTariffRepository::default());
        let resolver =
            TransportTariffResolver::new(Arc::clone(&repository) as Arc<dyn TariffRepository>);
        resolver.generate_tariff_table(&params()).await.expect("generate");
        let row = repository
            .transport_tariff(40)
            .await
            .expect("lookup")
            .expect("row");

        let tons = CargoSpec::new(10.0, Unit::Tonnes, 1.0).expect("cargo");
        let by_mass = resolver.price_for_distance(40, &tons).await.expect("price");
        assert!((by_mass.tariff_per_unit - row.outgoing_tariff_per_ton).abs() < 1e-9);
        assert!((by_mass.price - row.outgoing_tariff_per_ton * 10.0).abs() < 1e-9);

        let cubes = CargoSpec::new(10.0, Unit::CubicMetres, 1.4).expect("cargo");
        let by_volume = resolver.price_for_distance(40, &cubes).await.expect("price");
        assert!((by_volume.tariff_per_unit - row.outgoing_tariff_per_m3).abs() < 1e-9);
        assert!((by_volume.price - row.outgoing_tariff_per_m3 * 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn distance_beyond_table_is_out_of_range() {
        let repository = Arc::new(InMemoryTariffRepository::default());
        let resolver = TransportTariffResolver::new(repository);
        resolver.generate_tariff_table(&params()).await.expect("generate");

        let cargo = CargoSpec::new(1.0, Unit::Tonnes, 1.0).expect("cargo");
        let err = resolver
            .price_for_distance(251, &cargo)
            .await
            .expect_err("out of range");
        assert!(matches!(
            err,
            CalcError::DistanceOutOfRange {
                distance_km: 251,
                max_km: 250
            }
        ));
    }

    #[tokio::test]
    async fn empty_table_is_not_found() {
        let resolver = TransportTariffResolver::new(Arc::new(InMemoryTariffRepository::default()));
        let cargo = CargoSpec::new(1.0, Unit::Tonnes, 1.0).expect("cargo");
        let err = resolver.price_for_distance(10, &cargo).await.expect_err("missing");
        assert!(matches!(err, CalcError::TransportTariffNotFound(10)));
    }

    struct FlakyRepository {
        inner: InMemoryTariffRepository,
        batches: AtomicUsize,
        fail_on: usize,
    }

    #[async_trait]
    impl TariffRepository for FlakyRepository {
        async fn transport_tariff(
            &self,
            distance_km: u32,
        ) -> Result<Option<TransportTariffRow>, CalcError> {
            self.inner.transport_tariff(distance_km).await
        }

        async fn max_distance_km(&self) -> Result<Option<u32>, CalcError> {
            self.inner.max_distance_km().await
        }

        async fn upsert_transport_tariffs(
            &self,
            rows: &[TransportTariffRow],
        ) -> Result<(), CalcError> {
            if self.batches.fetch_add(1, Ordering::SeqCst) == self.fail_on {
                return Err(CalcError::Repository("connection reset".to_owned()));
            }
            self.inner.upsert_transport_tariffs(rows).await
        }
    }

    #[tokio::test]
    async fn failing_batch_is_surfaced() {
        let repository = Arc::new(FlakyRepository {
            inner: InMemoryTariffRepository::default(),
            batches: AtomicUsize::new(0),
            fail_on: 1,
        });
        let resolver =
            TransportTariffResolver::new(Arc::clone(&repository) as Arc<dyn TariffRepository>);

        let err = resolver
            .generate_tariff_table(&params())
            .await
            .expect_err("second batch fails");
        match err {
            CalcError::Repository(message) => {
                assert!(message.contains("after 100 of 250"), "unexpected message: {message}");
            }
            other => panic!("expected repository error, got {other:?}"),
        }
        assert_eq!(repository.inner.max_distance_km().await.expect("max"), Some(100));
    }
}
