//! # Artist Reconciler CLI (`arec`)
//!
//! Reads artist name/date rows from a CSV export, checks each person
//! against the registry, enriches the missing ones from the Getty
//! vocabulary and Wikidata, and writes three result files: new records
//! ready for import, records that already exist (with their registry
//! ids), and names no source could resolve.
//!
//! ```bash
//! arec process exhibition.csv --output import.csv
//! arec refresh import.csv       # recompute derived columns in place
//! ```
//!
//! The registry password is taken from `AREC_PASSWORD`, the platform
//! keyring, or an interactive prompt, in that order.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use artist_reconciler::authority::AuthorityLookup;
use artist_reconciler::config::{load_config, Config};
use artist_reconciler::engine;
use artist_reconciler::rows;
use artist_reconciler::session::SessionClient;
use artist_reconciler::source::ExternalSource;
use artist_reconciler::source_getty::GettySource;
use artist_reconciler::source_wikidata::WikidataSource;

#[derive(Parser)]
#[command(
    name = "arec",
    about = "Reconcile artist records against a museum registry, the Getty vocabulary, and Wikidata",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Compiled-in defaults apply
    /// when the file does not exist.
    #[arg(long, global = true, default_value = "./config/arec.toml")]
    config: PathBuf,

    /// Registry server address, overriding the configuration.
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Registry username, overriding the configuration.
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a CSV export against the registry and the external
    /// sources.
    Process {
        /// Input CSV with Name/Vor/Nach or Artist/Date columns.
        file: PathBuf,

        /// Output CSV for newly resolved records (default:
        /// `artist_output_<input>`).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output CSV for records that already exist in the registry
        /// (default: `existing_<server>.csv`).
        #[arg(short, long)]
        existing_out: Option<PathBuf>,
    },

    /// Recompute the derived columns of a previously written output
    /// file in place.
    Refresh {
        /// Output CSV written by a previous `process` run.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(server) = cli.server {
        config.registry.server = server;
    }
    if let Some(user) = cli.user {
        config.registry.username = user;
    }

    match cli.command {
        Commands::Process {
            file,
            output,
            existing_out,
        } => {
            let output = output.unwrap_or_else(|| prefixed(&file, "artist_output_"));
            let existing_out = existing_out.unwrap_or_else(|| default_existing_out(&config));
            process(&config, &file, &output, &existing_out).await
        }
        Commands::Refresh { file } => refresh(&file),
    }
}

async fn process(config: &Config, file: &Path, output: &Path, existing_out: &Path) -> Result<()> {
    let records = rows::read_records(file)?;
    println!("Creating dictionary ...");
    let candidates = engine::collect_candidates(&records, &config.input.unknown_placeholder);

    let mut session = SessionClient::new(&config.registry.server, &config.registry.username)?;
    session.open().await?;

    let sources: Vec<Box<dyn ExternalSource>> = vec![
        Box::new(GettySource::new(
            &config.sources.getty_endpoint,
            config.sources.getty_genders.clone(),
        )),
        Box::new(WikidataSource::new(
            &config.sources.wikidata_endpoint,
            config.sources.wikidata_genders.clone(),
        )),
    ];
    let http = reqwest::Client::builder()
        .user_agent(concat!("artist-reconciler/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(120))
        .build()
        .context("failed to build http client")?;
    let cooldown = Duration::from_secs(config.sources.cooldown_secs);

    println!("Processing artists ...");
    let outcome = {
        let mut lookup = AuthorityLookup::new(&session);
        engine::reconcile(&mut lookup, &sources, &http, candidates, cooldown).await
    };
    // The session key is released on every path, error or not.
    if let Err(e) = session.close().await {
        eprintln!("session release failed: {e:#}");
    }
    let mut report = outcome?;

    if !report.resolved.is_empty() {
        rows::write_candidates(output, &mut report.resolved, &rows::output_schema())?;
    }
    if !report.existing.is_empty() {
        rows::write_candidates(existing_out, &mut report.existing, &rows::existing_schema())?;
    }
    if !report.unresolved.is_empty() {
        rows::write_candidates(
            Path::new("unknown_artists.csv"),
            &mut report.unresolved,
            &rows::unknown_schema(),
        )?;
    }

    println!("resolved: {}", report.resolved.len());
    println!("existing: {}", report.existing.len());
    println!("unresolved: {}", report.unresolved.len());
    if let Some(name) = report.aborted_at {
        bail!("rate limit exhausted while processing {name}; resume from there");
    }
    Ok(())
}

fn refresh(file: &Path) -> Result<()> {
    let schema = rows::output_schema();
    println!("Reading file ...");
    let mut candidates: Vec<_> = rows::read_rows(file, &schema)?
        .iter()
        .map(|row| rows::from_row(row, &schema))
        .collect();
    rows::write_candidates(file, &mut candidates, &schema)?;
    println!("refreshed: {}", candidates.len());
    Ok(())
}

fn prefixed(file: &Path, prefix: &str) -> PathBuf {
    let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    file.with_file_name(format!("{prefix}{name}"))
}

fn default_existing_out(config: &Config) -> PathBuf {
    let host = config
        .registry
        .server
        .split("//")
        .nth(1)
        .unwrap_or(&config.registry.server)
        .replace('.', "-");
    PathBuf::from(format!("existing_{host}.csv"))
}
