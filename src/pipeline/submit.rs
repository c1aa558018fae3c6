//! Chunked submission of export jobs.

use crate::config::Config;
use crate::ee::{
    occurrence_expression, DriveDestination, ExportTableRequest, FeatureCollection,
    FileExportOptions, Task, TaskService,
};
use crate::locations::{LocationRecord, LocationSet};
use crate::pipeline::TaskThrottle;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Prefix shared by every task description this tool submits.
const DESCRIPTION_PREFIX: &str = "Pekel_Visibility";

/// Correlation tag for one run.
///
/// The run date embedded in every description is what the failure scanner
/// later matches on.
#[derive(Debug, Clone)]
pub struct RunTag {
    /// Run date (YYYY-MM-DD)
    run_date: String,

    /// Path-row scope, when the run covers a single path-row
    pathrow: Option<String>,
}

impl RunTag {
    /// Create a tag for the given run date and optional path-row scope.
    pub fn new(run_date: &str, pathrow: Option<&str>) -> Self {
        Self {
            run_date: run_date.to_string(),
            pathrow: pathrow.map(str::to_string),
        }
    }

    /// Task description for one chunk.
    pub fn description(&self, chunk_index: usize) -> String {
        match &self.pathrow {
            Some(pathrow) => format!(
                "{}_{}_{}_{}",
                DESCRIPTION_PREFIX, self.run_date, pathrow, chunk_index
            ),
            None => format!("{}_{}_{}", DESCRIPTION_PREFIX, self.run_date, chunk_index),
        }
    }

    /// Whether a task description belongs to this run.
    pub fn matches(&self, description: &str) -> bool {
        description.contains(&self.run_date)
    }

    /// The run date this tag was created with.
    pub fn run_date(&self) -> &str {
        &self.run_date
    }
}

/// Statistics from one submission run.
#[derive(Debug, Default)]
pub struct RunStats {
    /// Chunks submitted as export tasks
    pub chunks_submitted: usize,

    /// Locations covered by the submitted chunks
    pub locations_submitted: usize,

    /// Rows dropped at CSV load time
    pub rows_skipped: usize,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Submitted: {} chunks ({} locations), Skipped rows: {}",
            self.chunks_submitted, self.locations_submitted, self.rows_skipped
        )
    }
}

/// Submits one export task per location chunk, gated by the throttle.
pub struct ChunkSubmitter {
    /// Remote task service
    service: Arc<dyn TaskService>,

    /// Queue throttle applied before every submission
    throttle: TaskThrottle,

    /// Run configuration
    config: Arc<Config>,

    /// Correlation tag for descriptions
    tag: RunTag,
}

impl ChunkSubmitter {
    /// Create a submitter for one run.
    pub fn new(service: Arc<dyn TaskService>, config: Arc<Config>, tag: RunTag) -> Self {
        let throttle = TaskThrottle::new(
            config.processing.max_active_tasks,
            Duration::from_secs(config.processing.poll_interval_secs),
        );

        Self {
            service,
            throttle,
            config,
            tag,
        }
    }

    /// Submit every chunk of the location set, in order.
    ///
    /// Submission is strictly sequential: each chunk waits for queue
    /// capacity, is sent, and only then is the next chunk considered.
    /// A submission error aborts the run.
    pub async fn submit_all(&self, locations: &LocationSet) -> Result<RunStats> {
        let chunk_size = self.config.processing.chunk_size;
        let num_chunks = locations.num_chunks(chunk_size);

        let mut stats = RunStats {
            rows_skipped: locations.skipped(),
            ..RunStats::default()
        };

        for (index, chunk) in locations.chunks(chunk_size).enumerate() {
            self.submit_chunk(index, chunk).await?;

            stats.chunks_submitted += 1;
            stats.locations_submitted += chunk.len();
            tracing::info!("Sent chunk {}/{}", index + 1, num_chunks);
        }

        Ok(stats)
    }

    /// Build and submit the export task for one chunk.
    async fn submit_chunk(&self, index: usize, records: &[LocationRecord]) -> Result<Task> {
        let collection =
            FeatureCollection::from_records(records, &self.config.locations.location_crs);
        let expression = occurrence_expression(&collection, &self.config.extraction);

        let request = ExportTableRequest {
            expression,
            description: self.tag.description(index),
            file_export_options: FileExportOptions {
                file_format: self.config.export.file_format.clone(),
                drive_destination: DriveDestination {
                    folder: self.config.export.folder.clone(),
                },
            },
        };

        self.throttle.wait_for_capacity(self.service.as_ref()).await?;

        let task = self.service.export_table(request).await?;
        tracing::debug!("Started task {} ({})", task.name, task.description);

        Ok(task)
    }
}
