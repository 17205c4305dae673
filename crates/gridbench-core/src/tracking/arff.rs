//! Best-effort dataset statistics.
//!
//! Dataset rows record instance and attribute counts when they can be read
//! from the artifact file; any failure is non-fatal and yields `None`
//! (recorded as `-1`).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Count `(instances, attributes)` in a recorded dataset file. ARFF files
/// are scanned for `@attribute` declarations and data lines; CSV files use
/// the header width and data line count.
pub fn dataset_stats(path: &Path) -> Option<(i64, i64)> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => csv_stats(path),
        _ => arff_stats(path),
    }
}

fn arff_stats(path: &Path) -> Option<(i64, i64)> {
    let file = File::open(path).ok()?;
    let mut attributes = 0i64;
    let mut instances = 0i64;
    let mut in_data = false;
    for line in BufReader::new(file).lines() {
        let line = line.ok()?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        if in_data {
            instances += 1;
            continue;
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("@attribute") {
            attributes += 1;
        } else if lower.starts_with("@data") {
            in_data = true;
        }
    }
    // no @data section means this was not an ARFF document
    if !in_data {
        return None;
    }
    Some((instances, attributes))
}

fn csv_stats(path: &Path) -> Option<(i64, i64)> {
    let file = File::open(path).ok()?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));
    let attributes = reader.headers().ok()?.len() as i64;
    let mut instances = 0i64;
    for record in reader.records() {
        record.ok()?;
        instances += 1;
    }
    Some((instances, attributes))
}
