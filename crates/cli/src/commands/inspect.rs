//! `inspect` command implementation.

use std::fs::File;
use std::io::{BufReader, Read};

use anyhow::{Context, Result};
use contracts::SensorReading;
use ingestion::EnvelopeStream;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::InspectArgs;
use crate::error::CliError;

/// One entry of JSON output
#[derive(Serialize)]
struct InspectedEntry {
    sequence_number: i64,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reading: Option<SensorReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Execute the `inspect` command
pub fn run_inspect(args: &InspectArgs) -> Result<()> {
    if !args.path.exists() {
        return Err(CliError::input_not_found(&args.path).into());
    }
    let file = File::open(&args.path)
        .with_context(|| format!("Failed to open {}", args.path.display()))?;
    info!(path = %args.path.display(), "Inspecting container");

    let entries = collect_entries(BufReader::new(file), args.parse)?;

    for entry in &entries {
        if args.json {
            println!("{}", serde_json::to_string(entry)?);
        } else {
            print_entry(entry);
        }
    }

    info!(entries = entries.len(), "Inspection complete");
    Ok(())
}

/// Malformed envelopes are logged and left out; a corrupt container aborts
fn collect_entries<R: Read>(reader: R, parse: bool) -> Result<Vec<InspectedEntry>> {
    let mut entries = Vec::new();

    if !parse {
        for item in pipeline::inspect(reader)? {
            match item {
                Ok((sequence_number, body)) => entries.push(InspectedEntry {
                    sequence_number,
                    body,
                    reading: None,
                    error: None,
                }),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => warn!(error = %e, "malformed envelope"),
            }
        }
        return Ok(entries);
    }

    for item in EnvelopeStream::open(reader)? {
        let envelope = match item {
            Ok(envelope) => envelope,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "malformed envelope");
                continue;
            }
        };

        let (reading, error) = match telemetry_parser::parse_envelope(&envelope) {
            Ok(reading) => (Some(reading), None),
            Err(e) => (None, Some(e.to_string())),
        };
        entries.push(InspectedEntry {
            sequence_number: envelope.sequence_number,
            body: envelope.body_text(),
            reading,
            error,
        });
    }
    Ok(entries)
}

fn print_entry(entry: &InspectedEntry) {
    println!("{}: {}", entry.sequence_number, entry.body);
    if let Some(ref reading) = entry.reading {
        println!(
            "  -> {} at {} temperature={} humidity={} pressure={} battery_mv={}",
            reading.device_address,
            reading.captured_at.to_rfc3339(),
            reading.temperature_c,
            reading.humidity_pct,
            reading.pressure_pa,
            reading.battery_mv
        );
    }
    if let Some(ref error) = entry.error {
        println!("  !! {error}");
    }
}
