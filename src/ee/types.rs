//! Wire-facing types for the Earth Engine collaboration.

use crate::locations::LocationRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A point feature destined for a remote feature collection.
///
/// The site id rides along twice, as the service's `system:index` key and as
/// a visible `id` property, so exported rows can be joined back to the input.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    /// Site id, stringified for the property map
    pub id: String,

    /// [longitude, latitude] in the collection CRS
    pub coordinates: [f64; 2],
}

impl PointFeature {
    /// Property map carried by the feature.
    pub fn properties(&self) -> serde_json::Value {
        json!({
            "system:index": self.id,
            "id": self.id,
        })
    }
}

/// An ordered feature collection built from one submission chunk.
///
/// Transient: owned by the submission call and discarded once the export
/// request has been sent.
#[derive(Debug, Clone)]
pub struct FeatureCollection {
    /// Features in chunk order
    pub features: Vec<PointFeature>,

    /// CRS of the point coordinates
    pub crs: String,
}

impl FeatureCollection {
    /// Build a collection from location records.
    pub fn from_records(records: &[LocationRecord], crs: &str) -> Self {
        let features = records
            .iter()
            .map(|r| PointFeature {
                id: r.id.to_string(),
                coordinates: [r.longitude, r.latitude],
            })
            .collect();

        Self {
            features,
            crs: crs.to_string(),
        }
    }

    /// Number of features in the collection.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// State of a remote export task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Queued, not yet picked up
    Pending,
    /// Accepted and waiting for workers
    Ready,
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Any state this client does not know about
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Whether the task occupies a slot in the remote queue.
    pub fn is_active(self) -> bool {
        matches!(self, TaskState::Pending | TaskState::Ready | TaskState::Running)
    }

    /// Whether the task ended in failure.
    pub fn is_failed(self) -> bool {
        matches!(self, TaskState::Failed)
    }
}

/// Opaque handle to a remote export task.
///
/// The description is the only correlation key this side keeps; tasks are
/// never persisted locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Service-assigned task name
    pub name: String,

    /// Task state at the time of listing
    pub state: TaskState,

    /// Description supplied at submission, used to correlate runs
    #[serde(default)]
    pub description: String,
}

/// A table-export request, submitted once per chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTableRequest {
    /// Serialized expression producing the output table
    pub expression: serde_json::Value,

    /// Task description (run tag plus chunk index)
    pub description: String,

    /// Destination options for the exported file
    pub file_export_options: FileExportOptions,
}

/// Destination options for an exported table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileExportOptions {
    /// Export file format
    pub file_format: String,

    /// Drive folder receiving the file
    pub drive_destination: DriveDestination,
}

/// Drive destination for an exported table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveDestination {
    /// Folder name
    pub folder: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, lat: f64, lon: f64) -> LocationRecord {
        LocationRecord {
            id,
            latitude: lat,
            longitude: lon,
            pathrow: None,
        }
    }

    #[test]
    fn test_collection_from_records() {
        let records = vec![record(11, 40.0, -105.0), record(12, 41.0, -104.0)];
        let fc = FeatureCollection::from_records(&records, "EPSG:4326");

        assert_eq!(fc.len(), 2);
        assert_eq!(fc.crs, "EPSG:4326");
        assert_eq!(fc.features[0].id, "11");
        assert_eq!(fc.features[0].coordinates, [-105.0, 40.0]);
    }

    #[test]
    fn test_feature_properties_duplicate_id() {
        let feature = PointFeature {
            id: "42".to_string(),
            coordinates: [-105.0, 40.0],
        };

        let props = feature.properties();
        assert_eq!(props["system:index"], "42");
        assert_eq!(props["id"], "42");
    }

    #[test]
    fn test_task_state_active() {
        assert!(TaskState::Pending.is_active());
        assert!(TaskState::Ready.is_active());
        assert!(TaskState::Running.is_active());
        assert!(!TaskState::Completed.is_active());
        assert!(!TaskState::Failed.is_active());
        assert!(!TaskState::Cancelled.is_active());
    }

    #[test]
    fn test_task_state_failed() {
        assert!(TaskState::Failed.is_failed());
        assert!(!TaskState::Running.is_failed());
        assert!(!TaskState::Cancelled.is_failed());
    }

    #[test]
    fn test_task_state_wire_format() {
        let state: TaskState = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(state, TaskState::Running);

        let state: TaskState = serde_json::from_str("\"CANCELLING\"").unwrap();
        assert_eq!(state, TaskState::Unknown);
    }

    #[test]
    fn test_export_request_wire_format() {
        let request = ExportTableRequest {
            expression: serde_json::json!({}),
            description: "Pekel_Visibility_2024-01-01_0".to_string(),
            file_export_options: FileExportOptions {
                file_format: "CSV".to_string(),
                drive_destination: DriveDestination {
                    folder: "pekel_v2024-01-01".to_string(),
                },
            },
        };

        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["description"], "Pekel_Visibility_2024-01-01_0");
        assert_eq!(wire["fileExportOptions"]["fileFormat"], "CSV");
        assert_eq!(
            wire["fileExportOptions"]["driveDestination"]["folder"],
            "pekel_v2024-01-01"
        );
    }
}
