//! Build a terminology encoding for a value set and save it as JSON.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin fhir-tx-encode -- \
//!     --vs "http://snomed.info/sct?fhir_vs=isa/404684003" \
//!     --property inactive --output encoding.json
//! ```
//!
//! `FHIR_TX_URL`, `FHIR_TX_BATCH_SIZE` and `FHIR_TX_TIMEOUT_SECS` supply
//! defaults for the matching flags. Log verbosity follows `RUST_LOG`
//! (default `info`).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fhir_tx_encoder::{EncoderConfig, TerminologyEncoder};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "fhir-tx-encode")]
#[command(about = "Encode the codes of a FHIR value set with their subsumption relationships")]
struct Args {
    /// FHIR terminology server endpoint [default: $FHIR_TX_URL or the public Ontoserver].
    #[arg(long)]
    tx: Option<String>,

    /// FHIR value set URI defining the scope.
    #[arg(long)]
    vs: String,

    /// Codes per request [default: $FHIR_TX_BATCH_SIZE or 50000].
    #[arg(long)]
    batch_size: Option<usize>,

    /// Property to include in the encoding; repeat for more, `*` for all.
    #[arg(long = "property")]
    properties: Vec<String>,

    /// Per-request timeout in seconds [default: $FHIR_TX_TIMEOUT_SECS].
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Output JSON file.
    #[arg(long)]
    output: PathBuf,
}

/// Saved encoding: labels plus the nonzero `[row, col, value]` triplets.
#[derive(Serialize)]
struct EncodingDocument<'a> {
    scope: &'a str,
    codes: &'a [String],
    displays: &'a [Option<String>],
    feature_names: &'a [String],
    shape: (usize, usize),
    entries: Vec<(usize, usize, f64)>,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    // Flags win over FHIR_TX_* variables, which win over built-in defaults
    let mut config = EncoderConfig::from_env(&args.vs);
    if let Some(tx) = &args.tx {
        config = config.with_tx_url(tx);
    }
    if let Some(batch_size) = args.batch_size {
        config = config.with_batch_size(batch_size);
    }
    if !args.properties.is_empty() {
        config = config.with_properties(args.properties.iter().cloned());
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout_secs(secs);
    }

    let encoder = TerminologyEncoder::new(&config)
        .with_context(|| format!("failed to encode value set {}", args.vs))?;

    let entries = encoder
        .matrix()
        .csr()
        .iter()
        .map(|(&value, (row, col))| (row, col, value))
        .collect();
    let document = EncodingDocument {
        scope: &config.scope,
        codes: encoder.codes(),
        displays: encoder.displays(),
        feature_names: encoder.feature_names(),
        shape: encoder.shape(),
        entries,
    };

    info!(path = %args.output.display(), "saving encoding");
    let file = File::create(&args.output)
        .with_context(|| format!("cannot create {}", args.output.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &document)?;
    writer.flush()?;

    let size = std::fs::metadata(&args.output)?.len();
    info!(bytes = size, "encoding written");
    Ok(())
}
