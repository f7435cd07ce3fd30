use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use wastecalc_core::memory::Dataset;

/// Read a JSON request body from `path`, or from stdin when no path is given.
pub(crate) fn read_request<T: DeserializeOwned>(path: Option<&Path>) -> Result<T> {
    let raw = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading request from {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("reading request from stdin")?;
            buffer
        }
    };
    serde_json::from_str(&raw).context("request is not valid JSON for this command")
}

/// Load the facility/tariff dataset. No path means an empty dataset.
pub(crate) fn read_dataset(path: Option<&Path>) -> Result<Dataset> {
    let Some(path) = path else {
        return Ok(Dataset::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading dataset from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing dataset {}", path.display()))
}

/// Pretty-print `value` as JSON on stdout.
pub(crate) fn write_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("writing result")?;
    writeln!(stdout).context("writing result")?;
    Ok(())
}
