//! Pekel Occurrence Export CLI
//!
//! Submit site locations to Earth Engine for surface-water occurrence
//! extraction, and report on failed export tasks.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pekel_occurrence::{build_runtime, prepare_locations, run_pipeline, scan_failures, Config, RunTag};

#[derive(Parser)]
#[command(name = "pekel-occurrence")]
#[command(about = "Batch-export Pekel occurrence summaries for site locations", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Override the locations-per-chunk limit
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Override the active task ceiling
    #[arg(long, global = true)]
    max_active_tasks: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit the export tasks (default if no command specified)
    Run,

    /// Print the submission plan without touching the remote service
    Analyze,

    /// Validate configuration
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Append this run's failed tasks to the report CSV
    ScanFailures,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => {
            run_command(&cli)?;
        }

        Some(Commands::Analyze) => {
            analyze_command(&cli)?;
        }

        Some(Commands::Validate) => {
            validate_command(&cli.config)?;
        }

        Some(Commands::GenerateConfig { ref output }) => {
            generate_config_command(output)?;
        }

        Some(Commands::ScanFailures) => {
            scan_failures_command(&cli.config)?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_file(&cli.config)?;

    // Apply overrides
    if let Some(chunk_size) = cli.chunk_size {
        config.processing.chunk_size = chunk_size;
    }
    if let Some(ceiling) = cli.max_active_tasks {
        config.processing.max_active_tasks = ceiling;
    }

    config.validate()?;
    Ok(config)
}

fn run_command(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    let runtime = build_runtime()?;
    runtime.block_on(async { run_pipeline(config).await })?;

    Ok(())
}

fn analyze_command(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    let (locations, pathrow) = prepare_locations(&config)?;
    let chunk_size = config.processing.chunk_size;
    let tag = RunTag::new(&config.export.run_date, pathrow.as_deref());

    println!("\n=== Submission Plan ===");
    println!("Locations: {}", locations.len());
    println!("Malformed rows skipped: {}", locations.skipped());
    if let Some(pathrow) = &pathrow {
        println!("Path-row scope: {}", pathrow);
    }
    println!("Chunk size: {}", chunk_size);
    println!("Export tasks: {}", locations.num_chunks(chunk_size));

    let sizes: Vec<String> = locations
        .chunks(chunk_size)
        .map(|c| c.len().to_string())
        .collect();
    println!("Chunk sizes: [{}]", sizes.join(", "));

    println!("\n=== Throttle ===");
    println!("Active task ceiling: {}", config.processing.max_active_tasks);
    println!("Poll interval: {}s", config.processing.poll_interval_secs);

    println!("\n=== Export ===");
    println!("Folder: {}", config.export.folder);
    println!("Format: {}", config.export.file_format);
    println!("First description: {}", tag.description(0));
    println!("=======================\n");

    Ok(())
}

fn validate_command(config_path: &PathBuf) -> Result<()> {
    let config = Config::from_file(config_path)?;
    config.validate()?;
    println!("Configuration is valid");
    Ok(())
}

fn scan_failures_command(config_path: &PathBuf) -> Result<()> {
    let config = Config::from_file(config_path)?;

    let runtime = build_runtime()?;
    let written = runtime.block_on(async { scan_failures(config).await })?;

    println!("Failure records written: {}", written);
    Ok(())
}

fn generate_config_command(output: &PathBuf) -> Result<()> {
    // Generate a commented YAML config
    let yaml = r#"# Pekel Occurrence Export Configuration

# === PROJECT: Earth Engine session ===
project:
  # Cloud project id; the bearer token comes from EARTHENGINE_TOKEN
  ee_project: "my-ee-project"

# === LOCATIONS: Where the site points come from ===
locations:
  # CSV with columns: id, Latitude, Longitude and optionally WRSPR
  path: "run/locs_with_WRS.csv"

  # CRS of the point coordinates
  location_crs: "EPSG:4326"

  # Scope the run to one WRS path-row (choose at most ONE of these)
  # pathrow: "034032"
  # pathrow_file: "run/current_pathrow.txt"

# === EXPORT: Where the result tables go ===
export:
  # Drive folder receiving the per-chunk CSVs
  folder: "pekel_v2024-01-01"

  # Run tag date; part of every task description
  run_date: "2024-01-01"

  # Export file format
  file_format: "CSV"

  # Directory for the local failure-report CSV
  report_dir: "out"

# === EXTRACTION: Remote per-feature summary ===
extraction:
  # Occurrence raster and band
  asset: "JRC/GSW1_4/GlobalSurfaceWater"
  band: "occurrence"

  # Buffer radius around each point, meters
  buffer_meters: 200.0

  # Reduction scale, meters
  scale_meters: 30.0

# === PROCESSING: Submission pacing ===
processing:
  # Locations per export task (service feature-collection limit)
  chunk_size: 5000

  # Ceiling on active (queued or running) remote tasks
  max_active_tasks: 20

  # Seconds between task-queue polls while at the ceiling
  poll_interval_secs: 60

# === EXTENT: Optional extent descriptor, parts joined with '+' ===
# extent: "conus+alaska"
"#;

    std::fs::write(output, yaml)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_default() {
        // No subcommand - should default to Run
        let cli = Cli::try_parse_from(["pekel-occurrence"]);
        assert!(cli.is_ok());
        assert!(cli.unwrap().command.is_none());
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::try_parse_from(["pekel-occurrence", "-c", "other.yaml"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_overrides() {
        let cli = Cli::try_parse_from([
            "pekel-occurrence",
            "run",
            "--chunk-size",
            "1000",
            "--max-active-tasks",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.chunk_size, Some(1000));
        assert_eq!(cli.max_active_tasks, Some(10));
    }

    #[test]
    fn test_cli_parse_scan_failures() {
        let cli = Cli::try_parse_from(["pekel-occurrence", "scan-failures", "-c", "test.json"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_generated_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        generate_config_command(&path).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.processing.chunk_size, 5000);
    }
}
