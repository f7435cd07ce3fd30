use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "wastecalc",
    about = "Price construction-waste transport and disposal",
    after_help = "Set ORS_API_KEY to use openrouteservice road distances; without it \
                  distances are estimated from the straight line."
)]
pub(crate) struct Args {
    /// JSON dataset with facilities, disposal tariffs, and tariff table parameters.
    #[arg(long, global = true)]
    pub dataset: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Price a transport-only order.
    Transport {
        /// Request body file; stdin when omitted.
        #[arg(long)]
        request: Option<PathBuf>,
    },
    /// Price disposal at the facility given as `polygonId`.
    Disposal {
        /// Request body file; stdin when omitted.
        #[arg(long)]
        request: Option<PathBuf>,
    },
    /// Rank the cheapest facilities accepting the waste code.
    DisposalAuto {
        /// Request body file; stdin when omitted.
        #[arg(long)]
        request: Option<PathBuf>,
    },
    /// Regenerate the transport tariff table and report the row count.
    GenerateTariffs {
        /// Tariff table parameters file; stdin when omitted.
        #[arg(long)]
        request: Option<PathBuf>,
    },
    /// List active facilities near a point.
    Nearby {
        /// Latitude in degrees.
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in degrees.
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Maximum number of facilities.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}
