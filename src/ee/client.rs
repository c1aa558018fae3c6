//! Thin client for the Earth Engine REST surface.
//!
//! Everything heavy (scheduling, raster storage, reduction) happens inside
//! the service; this client only starts table exports and lists task state.

use crate::ee::types::{ExportTableRequest, Task, TaskState};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Environment variable holding the bearer token for the session.
pub const TOKEN_ENV: &str = "EARTHENGINE_TOKEN";

const DEFAULT_BASE_URL: &str = "https://earthengine.googleapis.com/v1";

/// Remote task operations used by the pipeline.
///
/// Implemented by [`EeClient`] for the live service and by mocks in tests.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// List all tasks known to the service for this project.
    async fn list_tasks(&self) -> Result<Vec<Task>>;

    /// Start an asynchronous table export, returning its task handle.
    async fn export_table(&self, request: ExportTableRequest) -> Result<Task>;
}

/// HTTP client bound to one Earth Engine project.
pub struct EeClient {
    http: reqwest::Client,
    base_url: String,
    project: String,
    token: String,
}

impl EeClient {
    /// Initialize a session for the given project, reading the bearer token
    /// from the environment.
    pub fn new(project: &str) -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .with_context(|| format!("Missing {} in the environment", TOKEN_ENV))?;
        Self::with_token(project, &token)
    }

    /// Initialize a session with an explicit bearer token.
    pub fn with_token(project: &str, token: &str) -> Result<Self> {
        tracing::info!("Initializing Earth Engine session for project {}", project);

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            project: project.to_string(),
            token: token.to_string(),
        })
    }

    /// Point the client at a different service endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TaskService for EeClient {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let url = format!("{}/projects/{}/operations", self.base_url, self.project);

        let mut tasks = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(&url).bearer_auth(&self.token);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response: ListOperationsResponse = request
                .send()
                .await
                .context("Task list request failed")?
                .error_for_status()
                .context("Task list request rejected")?
                .json()
                .await
                .context("Malformed task list response")?;

            tasks.extend(response.operations.into_iter().map(Task::from));

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(tasks)
    }

    async fn export_table(&self, request: ExportTableRequest) -> Result<Task> {
        let url = format!("{}/projects/{}/table:export", self.base_url, self.project);
        let description = request.description.clone();

        let operation: Operation = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Export submission failed for '{}'", description))?
            .error_for_status()
            .with_context(|| format!("Export submission rejected for '{}'", description))?
            .json()
            .await
            .context("Malformed export response")?;

        let mut task = Task::from(operation);
        if task.description.is_empty() {
            task.description = description;
        }

        Ok(task)
    }
}

/// One page of the operations listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListOperationsResponse {
    #[serde(default)]
    operations: Vec<Operation>,

    #[serde(default)]
    next_page_token: Option<String>,
}

/// A long-running operation as the service reports it.
#[derive(Debug, Deserialize)]
struct Operation {
    name: String,

    #[serde(default)]
    metadata: Option<OperationMetadata>,
}

#[derive(Debug, Deserialize)]
struct OperationMetadata {
    #[serde(default = "pending")]
    state: TaskState,

    #[serde(default)]
    description: String,
}

fn pending() -> TaskState {
    TaskState::Pending
}

impl From<Operation> for Task {
    fn from(op: Operation) -> Self {
        let (state, description) = match op.metadata {
            Some(meta) => (meta.state, meta.description),
            None => (TaskState::Pending, String::new()),
        };

        Task {
            name: op.name,
            state,
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction() {
        let client = EeClient::with_token("my-ee-project", "token").unwrap();
        assert_eq!(client.project, "my-ee-project");
        assert_eq!(client.base_url, DEFAULT_BASE_URL);

        let client = client.with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_operation_to_task() {
        let json = r#"{
            "name": "projects/my-ee-project/operations/ABC123",
            "metadata": {
                "state": "RUNNING",
                "description": "Pekel_Visibility_2024-01-01_3"
            }
        }"#;

        let op: Operation = serde_json::from_str(json).unwrap();
        let task = Task::from(op);
        assert_eq!(task.name, "projects/my-ee-project/operations/ABC123");
        assert_eq!(task.state, TaskState::Running);
        assert_eq!(task.description, "Pekel_Visibility_2024-01-01_3");
    }

    #[test]
    fn test_operation_without_metadata() {
        let op: Operation =
            serde_json::from_str(r#"{"name": "projects/p/operations/X"}"#).unwrap();
        let task = Task::from(op);
        assert_eq!(task.state, TaskState::Pending);
        assert!(task.description.is_empty());
    }

    #[test]
    fn test_list_response_parsing() {
        let json = r#"{
            "operations": [
                {"name": "projects/p/operations/A", "metadata": {"state": "READY", "description": "d1"}},
                {"name": "projects/p/operations/B", "metadata": {"state": "FAILED", "description": "d2"}}
            ],
            "nextPageToken": "tok"
        }"#;

        let response: ListOperationsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.operations.len(), 2);
        assert_eq!(response.next_page_token.as_deref(), Some("tok"));
    }
}
