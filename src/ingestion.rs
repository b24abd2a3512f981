use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::record::{RecordSet, TableLayout};

pub fn load_records(path: &Path) -> AppResult<RecordSet> {
    let file = File::open(path).map_err(|err| {
        AppError::Config(format!(
            "unable to open input file {}: {err}",
            path.display()
        ))
    })?;
    let records = parse_records(file)?;
    info!(
        path = %path.display(),
        rows = records.len(),
        "loaded business records"
    );
    Ok(records)
}

pub fn parse_records<R: Read>(reader: R) -> AppResult<RecordSet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| unreadable_input("header row", err))?
        .iter()
        .map(str::to_string)
        .collect();
    let layout = TableLayout::from_headers(headers)?;

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.map_err(|err| unreadable_input(&format!("row {}", idx + 1), err))?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let cells = row.iter().map(str::to_string).collect();
        records.push(layout.record_from_cells(idx + 1, cells));
    }

    if records.is_empty() {
        return Err(AppError::Config("input file contains no data rows".into()));
    }

    Ok(RecordSet::new(layout, records))
}

/// A malformed input file is a configuration problem, not a run failure.
fn unreadable_input(location: &str, err: csv::Error) -> AppError {
    AppError::Config(format!("unable to read input {location}: {err}"))
}
