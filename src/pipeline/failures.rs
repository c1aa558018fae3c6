//! After-the-fact failure reporting.
//!
//! Failed exports are not retried; this scan surfaces them in a local CSV
//! for manual resubmission. Task records age out of the remote service, so
//! a scan long after a run may not see every failure.

use crate::ee::TaskService;
use crate::pipeline::RunTag;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Scans the remote task list and appends failures to a report CSV.
pub struct FailureScanner {
    /// Remote task service
    service: std::sync::Arc<dyn TaskService>,

    /// Tag identifying this run's tasks
    tag: RunTag,
}

impl FailureScanner {
    /// Create a scanner for one run.
    pub fn new(service: std::sync::Arc<dyn TaskService>, tag: RunTag) -> Self {
        Self { service, tag }
    }

    /// Report file name for this run.
    pub fn report_file_name(&self) -> String {
        format!("GEE_task_errors_v{}.csv", self.tag.run_date())
    }

    /// Report file path under the given directory.
    pub fn report_path(&self, report_dir: &Path) -> PathBuf {
        report_dir.join(self.report_file_name())
    }

    /// Scan all remote tasks and append one line per failed task of this run.
    ///
    /// Existing report content is preserved; the file is only created when
    /// at least one failure is found. Returns the number of lines written.
    pub async fn scan_and_report(&self, report_dir: &Path) -> Result<usize> {
        let tasks = self.service.list_tasks().await?;
        tracing::info!("Scanning {} remote tasks for failures", tasks.len());

        let failures: Vec<_> = tasks
            .iter()
            .filter(|t| t.state.is_failed() && self.tag.matches(&t.description))
            .collect();

        if failures.is_empty() {
            tracing::info!("No failed tasks for this run");
            return Ok(0);
        }

        let path = self.report_path(report_dir);
        std::fs::create_dir_all(report_dir).with_context(|| {
            format!("Failed to create report directory: {}", report_dir.display())
        })?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open failure report: {}", path.display()))?;

        for task in &failures {
            writeln!(file, "{}", task.description)?;
            tracing::warn!("Failed task: {}", task.description);
        }

        tracing::info!("Wrote {} failure records to {}", failures.len(), path.display());

        Ok(failures.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ee::{ExportTableRequest, Task, TaskState};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedTasks(Vec<Task>);

    #[async_trait]
    impl TaskService for FixedTasks {
        async fn list_tasks(&self) -> Result<Vec<Task>> {
            Ok(self.0.clone())
        }

        async fn export_table(&self, _request: ExportTableRequest) -> Result<Task> {
            unimplemented!("scanner never submits")
        }
    }

    fn task(state: TaskState, description: &str) -> Task {
        Task {
            name: format!("projects/p/operations/{}", description),
            state,
            description: description.to_string(),
        }
    }

    fn scanner(tasks: Vec<Task>) -> FailureScanner {
        FailureScanner::new(Arc::new(FixedTasks(tasks)), RunTag::new("2024-01-01", None))
    }

    #[tokio::test]
    async fn test_only_this_runs_failures_reported() {
        let scanner = scanner(vec![
            task(TaskState::Failed, "Pekel_Visibility_2024-01-01_3"),
            task(TaskState::Failed, "Pekel_Visibility_2023-06-15_0"),
            task(TaskState::Completed, "Pekel_Visibility_2024-01-01_0"),
            task(TaskState::Running, "Pekel_Visibility_2024-01-01_1"),
        ]);

        let dir = tempfile::tempdir().unwrap();
        let written = scanner.scan_and_report(dir.path()).await.unwrap();
        assert_eq!(written, 1);

        let report = dir.path().join("GEE_task_errors_v2024-01-01.csv");
        let contents = std::fs::read_to_string(report).unwrap();
        assert_eq!(contents, "Pekel_Visibility_2024-01-01_3\n");
    }

    #[tokio::test]
    async fn test_appends_to_existing_report() {
        let scanner = scanner(vec![task(
            TaskState::Failed,
            "Pekel_Visibility_2024-01-01_7",
        )]);

        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("GEE_task_errors_v2024-01-01.csv");
        std::fs::write(&report, "Pekel_Visibility_2024-01-01_2\n").unwrap();

        scanner.scan_and_report(dir.path()).await.unwrap();

        let contents = std::fs::read_to_string(report).unwrap();
        assert_eq!(
            contents,
            "Pekel_Visibility_2024-01-01_2\nPekel_Visibility_2024-01-01_7\n"
        );
    }

    #[tokio::test]
    async fn test_no_failures_no_file() {
        let scanner = scanner(vec![
            task(TaskState::Completed, "Pekel_Visibility_2024-01-01_0"),
            task(TaskState::Cancelled, "Pekel_Visibility_2024-01-01_1"),
        ]);

        let dir = tempfile::tempdir().unwrap();
        let written = scanner.scan_and_report(dir.path()).await.unwrap();
        assert_eq!(written, 0);
        assert!(!dir
            .path()
            .join("GEE_task_errors_v2024-01-01.csv")
            .exists());
    }
}
