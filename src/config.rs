//! Configuration for the occurrence export pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Earth Engine project settings
    pub project: ProjectConfig,

    /// Location input configuration
    pub locations: LocationsConfig,

    /// Export destination configuration
    pub export: ExportConfig,

    /// Occurrence extraction parameters
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Submission and throttling configuration
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Optional extent descriptor, parts joined with '+'
    #[serde(default)]
    pub extent: Option<String>,
}

/// Earth Engine project settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Cloud project id used to initialize the Earth Engine session
    pub ee_project: String,
}

/// Location input configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationsConfig {
    /// Path to the location CSV (columns: id, Latitude, Longitude, optionally WRSPR)
    pub path: PathBuf,

    /// CRS of the point coordinates
    #[serde(default = "default_location_crs")]
    pub location_crs: String,

    /// Restrict the run to a single WRS path-row.
    /// Mutually exclusive with pathrow_file.
    #[serde(default)]
    pub pathrow: Option<String>,

    /// Marker file holding the current path-row, read at startup.
    /// Mutually exclusive with pathrow.
    #[serde(default)]
    pub pathrow_file: Option<PathBuf>,
}

/// Export destination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Destination folder for exported tables
    pub folder: String,

    /// Run date tag (YYYY-MM-DD); part of every task description
    pub run_date: String,

    /// Export file format
    #[serde(default = "default_file_format")]
    pub file_format: String,

    /// Directory receiving the local failure-report CSV
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

/// Occurrence extraction parameters, applied remotely per feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Raster asset holding the occurrence layer
    #[serde(default = "default_asset")]
    pub asset: String,

    /// Band to reduce
    #[serde(default = "default_band")]
    pub band: String,

    /// Buffer radius around each point, in meters
    #[serde(default = "default_buffer_meters")]
    pub buffer_meters: f64,

    /// Reduction scale, in meters
    #[serde(default = "default_scale_meters")]
    pub scale_meters: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            asset: default_asset(),
            band: default_band(),
            buffer_meters: default_buffer_meters(),
            scale_meters: default_scale_meters(),
        }
    }
}

/// Submission and throttling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Maximum locations per export job
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Ceiling on active (queued or running) remote tasks
    #[serde(default = "default_max_active_tasks")]
    pub max_active_tasks: usize,

    /// Seconds to sleep between task-queue polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_active_tasks: default_max_active_tasks(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => {
                // Try YAML first (it's a superset of JSON)
                serde_yaml::from_str(&contents)?
            }
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Extent descriptor parts, split on '+'.
    pub fn extent_parts(&self) -> Vec<&str> {
        self.extent
            .as_deref()
            .map(|e| e.split('+').collect())
            .unwrap_or_default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project.ee_project.is_empty() {
            anyhow::bail!("Earth Engine project id must not be empty");
        }

        if self.locations.pathrow.is_some() && self.locations.pathrow_file.is_some() {
            anyhow::bail!("Cannot specify both pathrow and pathrow_file");
        }

        if self.export.folder.is_empty() {
            anyhow::bail!("Export folder must not be empty");
        }
        if chrono::NaiveDate::parse_from_str(&self.export.run_date, "%Y-%m-%d").is_err() {
            anyhow::bail!(
                "Run date must be YYYY-MM-DD, got '{}'",
                self.export.run_date
            );
        }

        if self.extraction.buffer_meters <= 0.0 {
            anyhow::bail!("Buffer radius must be > 0");
        }
        if self.extraction.scale_meters <= 0.0 {
            anyhow::bail!("Reduction scale must be > 0");
        }

        if self.processing.chunk_size == 0 {
            anyhow::bail!("Chunk size must be > 0");
        }
        if self.processing.max_active_tasks == 0 {
            anyhow::bail!("Active task ceiling must be > 0");
        }
        if self.processing.poll_interval_secs == 0 {
            anyhow::bail!("Poll interval must be > 0");
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_location_crs() -> String { "EPSG:4326".to_string() }
fn default_file_format() -> String { "CSV".to_string() }
fn default_report_dir() -> PathBuf { PathBuf::from("out") }
fn default_asset() -> String { "JRC/GSW1_4/GlobalSurfaceWater".to_string() }
fn default_band() -> String { "occurrence".to_string() }
fn default_buffer_meters() -> f64 { 200.0 }
fn default_scale_meters() -> f64 { 30.0 }
fn default_chunk_size() -> usize { 5000 }
fn default_max_active_tasks() -> usize { 20 }
fn default_poll_interval_secs() -> u64 { 60 }
