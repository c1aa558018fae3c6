//! Load site locations from CSV and scope them for a run.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// A single site location from the input CSV.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationRecord {
    /// Site identifier, unique after deduplication
    pub id: i64,

    /// Latitude in the configured location CRS
    #[serde(rename = "Latitude")]
    pub latitude: f64,

    /// Longitude in the configured location CRS
    #[serde(rename = "Longitude")]
    pub longitude: f64,

    /// WRS path-row the site falls in, if the input carries one
    #[serde(rename = "WRSPR", default)]
    pub pathrow: Option<String>,
}

/// The location set for one run, in input order.
#[derive(Debug, Clone, Default)]
pub struct LocationSet {
    /// Well-formed records, in file order
    records: Vec<LocationRecord>,

    /// Rows dropped at load time because a required field was missing or unparsable
    skipped: usize,
}

impl LocationSet {
    /// Load locations from a CSV file.
    ///
    /// Rows missing a required field (or failing to parse one) are skipped
    /// with a warning; loading never aborts on a malformed row.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open location CSV: {}", path.display()))?;
        let set = Self::from_reader(file)?;

        tracing::info!(
            "Loaded {} locations from {} ({} malformed rows skipped)",
            set.len(),
            path.display(),
            set.skipped()
        );

        Ok(set)
    }

    /// Load locations from any CSV reader.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);

        let mut records = Vec::new();
        let mut skipped = 0;
        for (row, result) in csv_reader.deserialize::<LocationRecord>().enumerate() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Skipping malformed location row {}: {}", row + 1, e);
                    skipped += 1;
                }
            }
        }

        Ok(Self { records, skipped })
    }

    /// Number of locations in the set.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows dropped at load time.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// The records in input order.
    pub fn records(&self) -> &[LocationRecord] {
        &self.records
    }

    /// Drop duplicate ids, keeping the first occurrence.
    ///
    /// Inputs assembled from overlapping path-rows list the same site once
    /// per path-row; only one submission per site is wanted.
    pub fn dedup_by_id(self) -> Self {
        let mut seen = HashSet::new();
        let before = self.records.len();
        let records: Vec<_> = self
            .records
            .into_iter()
            .filter(|r| seen.insert(r.id))
            .collect();

        let dropped = before - records.len();
        if dropped > 0 {
            tracing::info!("Dropped {} duplicate locations", dropped);
        }

        Self {
            records,
            skipped: self.skipped,
        }
    }

    /// Keep only locations in the given WRS path-row.
    pub fn filter_pathrow(self, pathrow: &str) -> Self {
        let records: Vec<_> = self
            .records
            .into_iter()
            .filter(|r| r.pathrow.as_deref() == Some(pathrow))
            .collect();

        Self {
            records,
            skipped: self.skipped,
        }
    }

    /// Contiguous chunks of at most `chunk_size` records.
    ///
    /// Chunks partition the set exactly: every location appears in exactly
    /// one chunk, and only the last chunk may be short.
    pub fn chunks(&self, chunk_size: usize) -> std::slice::Chunks<'_, LocationRecord> {
        self.records.chunks(chunk_size)
    }

    /// Number of chunks a given chunk size produces.
    pub fn num_chunks(&self, chunk_size: usize) -> usize {
        self.records.len().div_ceil(chunk_size)
    }
}

/// Read the current path-row marker file written by the run preparation step.
pub fn read_pathrow_marker(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read path-row marker: {}", path.display()))?;

    let pathrow = contents.trim();
    if pathrow.is_empty() {
        anyhow::bail!("Path-row marker {} is empty", path.display());
    }

    Ok(pathrow.to_string())
}
