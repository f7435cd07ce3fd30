//! Command-line front end for wastecalc: prices transport and disposal orders from JSON requests.

mod args;
mod input;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wastecalc_core::{
    Coordinate,
    distance::RoadDistanceProvider,
    memory::{InMemoryFacilityRepository, InMemoryTariffRepository},
    request::{DisposalRequest, TransportRequest},
    service::CalculatorService,
    tariff::TariffTableParams,
};
use wastecalc_provider_openroute::{self as openroute, OpenRouteConfig};

use crate::args::{Args, Command};
use crate::input::{read_dataset, read_request, write_json};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationReport {
    records_generated: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    // Repositories + service setup
    let dataset = read_dataset(args.dataset.as_deref())?;
    let tariffs = Arc::new(InMemoryTariffRepository::default());
    let facilities = Arc::new(
        InMemoryFacilityRepository::from_records(dataset.facilities)
            .await
            .context("loading facilities from dataset")?,
    );

    let routing = openroute::routing_port(OpenRouteConfig::from_env())?;
    if routing.is_none() {
        info!(
            "{} is not set, road distances are estimated",
            openroute::API_KEY_ENV
        );
    }
    let distances = Arc::new(RoadDistanceProvider::new(routing));

    let service = CalculatorService::new(distances, tariffs, facilities);

    if let Some(params) = dataset.tariff_table {
        let records = service
            .generate_tariff_table(&params)
            .await
            .context("generating tariff table from dataset")?;
        info!(records, "transport tariff table loaded");
    }

    run(&service, args.command).await
}

async fn run(service: &CalculatorService, command: Command) -> Result<()> {
    match command {
        Command::Transport { request } => {
            let body: TransportRequest = read_request(request.as_deref())?;
            let input = body.validate()?;
            let quote = service
                .calculate_transport(input.pickup, input.dropoff, &input.cargo)
                .await
                .context("transport calculation failed")?;
            write_json(&quote)
        }
        Command::Disposal { request } => {
            let body: DisposalRequest = read_request(request.as_deref())?;
            let input = body.validate()?;
            let Some(facility_id) = input.facility_id else {
                bail!("polygonId is required; use disposal-auto to rank facilities");
            };
            let quote = service
                .calculate_disposal_single(input.pickup, &input.code, &input.cargo, &facility_id)
                .await
                .context("disposal calculation failed")?;
            write_json(&quote)
        }
        Command::DisposalAuto { request } => {
            let body: DisposalRequest = read_request(request.as_deref())?;
            let input = body.validate()?;
            let quotes = service
                .calculate_disposal_auto(input.pickup, &input.code, &input.cargo)
                .await
                .context("disposal ranking failed")?;
            if quotes.is_empty() {
                info!(code = %input.code, "no active facility accepts this waste code");
            }
            write_json(&quotes)
        }
        Command::GenerateTariffs { request } => {
            let params: TariffTableParams = read_request(request.as_deref())?;
            let records_generated = service
                .generate_tariff_table(&params)
                .await
                .context("tariff generation failed")?;
            write_json(&GenerationReport { records_generated })
        }
        Command::Nearby { lat, lon, limit } => {
            let facilities = service
                .nearby_facilities(Coordinate::new(lat, lon), limit)
                .await
                .context("facility lookup failed")?;
            write_json(&facilities)
        }
    }
}
