//! Pekel Occurrence Export Pipeline
//!
//! Submits site locations to Earth Engine in bounded-size chunks for batch
//! extraction of the Pekel global surface-water occurrence layer, throttled
//! against the remote task queue, with a failure-report scan for runs that
//! have finished.
//!
//! # Architecture
//!
//! - **Locations**: CSV loading, deduplication and path-row scoping
//! - **EE**: feature model, extraction expressions and the REST client
//! - **Pipeline**: chunked submission, queue throttle, failure scanner
//!
//! The heavy lifting (buffering, reduction, task scheduling, storage) all
//! happens inside the remote service; submission here is strictly
//! sequential, one chunk at a time.
//!
//! # Usage
//!
//! ```no_run
//! use pekel_occurrence::{run_pipeline, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file(&"config.yaml".into())?;
//!     run_pipeline(config).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod ee;
pub mod locations;
pub mod pipeline;

pub use config::Config;
pub use ee::{EeClient, TaskService};
pub use locations::{LocationRecord, LocationSet};
pub use pipeline::{ChunkSubmitter, FailureScanner, RunStats, RunTag};

use anyhow::Result;
use std::sync::Arc;

/// Load, deduplicate and scope the location set for a run.
///
/// Returns the locations ready for chunking along with the resolved
/// path-row scope, if any.
pub fn prepare_locations(config: &Config) -> Result<(LocationSet, Option<String>)> {
    let pathrow = match (&config.locations.pathrow, &config.locations.pathrow_file) {
        (Some(pathrow), _) => Some(pathrow.clone()),
        (None, Some(marker)) => Some(locations::read_pathrow_marker(marker)?),
        (None, None) => None,
    };

    let mut set = LocationSet::from_csv_path(&config.locations.path)?.dedup_by_id();
    if let Some(pathrow) = &pathrow {
        tracing::info!("Scoping run to WRS path-row {}", pathrow);
        set = set.filter_pathrow(pathrow);
    }

    Ok((set, pathrow))
}

/// Run the full submission pipeline with the given configuration.
pub async fn run_pipeline(config: Config) -> Result<RunStats> {
    config.validate()?;

    let config = Arc::new(config);

    tracing::info!("Starting Pekel occurrence export");

    let (locations, pathrow) = prepare_locations(&config)?;
    if locations.is_empty() {
        anyhow::bail!("No locations to submit after deduplication and scoping");
    }

    tracing::info!(
        "Submitting {} locations in {} chunks of up to {}",
        locations.len(),
        locations.num_chunks(config.processing.chunk_size),
        config.processing.chunk_size
    );

    let service: Arc<dyn TaskService> =
        Arc::new(EeClient::new(&config.project.ee_project)?);
    let tag = RunTag::new(&config.export.run_date, pathrow.as_deref());

    let submitter = ChunkSubmitter::new(service, config.clone(), tag);
    let stats = submitter.submit_all(&locations).await?;

    tracing::info!("Submission complete: {}", stats);

    Ok(stats)
}

/// Scan remote tasks and append this run's failures to the report CSV.
pub async fn scan_failures(config: Config) -> Result<usize> {
    config.validate()?;

    let service: Arc<dyn TaskService> =
        Arc::new(EeClient::new(&config.project.ee_project)?);
    let tag = RunTag::new(&config.export.run_date, None);

    let scanner = FailureScanner::new(service, tag);
    scanner.scan_and_report(&config.export.report_dir).await
}

/// Build the Tokio runtime the pipeline runs on.
///
/// Submission is sequential, so a current-thread runtime is enough; the only
/// suspension points are the HTTP calls and the throttle sleep.
pub fn build_runtime() -> Result<tokio::runtime::Runtime> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime)
}
