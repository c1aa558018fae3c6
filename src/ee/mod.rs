//! Earth Engine collaboration: feature model, extraction expressions, client.

mod client;
mod expression;
mod types;

pub use client::{EeClient, TaskService, TOKEN_ENV};
pub use expression::occurrence_expression;
pub use types::{
    DriveDestination, ExportTableRequest, FeatureCollection, FileExportOptions, PointFeature,
    Task, TaskState,
};
