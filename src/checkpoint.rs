use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::AppResult;
use crate::record::RecordSet;

/// When to write: after every `every` finalized records, and once after the
/// last processed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointPolicy {
    every: usize,
}

impl CheckpointPolicy {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }

    pub fn every(&self) -> usize {
        self.every
    }

    pub fn is_due(&self, finalized: usize) -> bool {
        finalized > 0 && finalized % self.every == 0
    }
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Rewrites the whole table to one destination; each write replaces the last.
#[derive(Debug, Clone)]
pub struct CheckpointWriter {
    path: PathBuf,
}

impl CheckpointWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, records: &RecordSet) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = self.staging_path();
        if let Err(err) = write_csv(&staging, records) {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }
        fs::rename(&staging, &self.path)?;
        debug!(
            path = %self.path.display(),
            rows = records.len(),
            "checkpoint written"
        );
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".partial");
        self.path.with_file_name(name)
    }
}

fn write_csv(path: &Path, records: &RecordSet) -> AppResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(records.layout().headers())?;
    for row in records.rows() {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
