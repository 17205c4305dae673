//! Append-only delimited tables over flat files.
//!
//! Comma delimiter, double-quote quoting with doubled embedded quotes
//! (RFC 4180, which the `csv` crate speaks natively). The first physical
//! row of every file is the header, bootstrapped on first creation. Every
//! append serialises the full record into memory and lands it with one
//! `write_all` under an exclusive advisory lock, so concurrent orchestrator
//! processes never interleave half-written lines. The single in-place
//! mutation (`rewrite`) holds the same exclusive lock across its whole
//! read-modify-write span.

use fd_lock::RwLock;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Internal to the tracking subsystem; never crosses the tracker boundary.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("tracking io ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("tracking table ({path}): {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug)]
pub struct Table {
    path: PathBuf,
    columns: &'static [&'static str],
}

impl Table {
    pub fn new(path: PathBuf, columns: &'static [&'static str]) -> Self {
        Self { path, columns }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| *c == name)
    }

    fn io_err(&self, source: std::io::Error) -> TrackingError {
        TrackingError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_err(&self, source: csv::Error) -> TrackingError {
        TrackingError::Csv {
            path: self.path.clone(),
            source,
        }
    }

    /// Append one row, bootstrapping the header when the file is empty.
    pub fn append(&self, row: &[String]) -> Result<(), TrackingError> {
        debug_assert_eq!(row.len(), self.columns.len());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        let mut lock = RwLock::new(file);
        let mut guard = lock.write().map_err(|e| self.io_err(e))?;

        let needs_header = guard.metadata().map_err(|e| self.io_err(e))?.len() == 0;
        let mut buf: Vec<u8> = Vec::new();
        {
            let mut writer = csv::Writer::from_writer(&mut buf);
            if needs_header {
                writer.write_record(self.columns).map_err(|e| self.csv_err(e))?;
            }
            writer.write_record(row).map_err(|e| self.csv_err(e))?;
            writer.flush().map_err(|e| self.io_err(e))?;
        }
        guard.write_all(&buf).map_err(|e| self.io_err(e))?;
        Ok(())
    }

    /// All data rows (header excluded). A missing file is an empty table.
    pub fn read_rows(&self) -> Result<Vec<Vec<String>>, TrackingError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        let lock = RwLock::new(file);
        let guard = lock.read().map_err(|e| self.io_err(e))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(&*guard);
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| self.csv_err(e))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    /// Linear scan with an equality filter on one column.
    pub fn select(&self, column: &str, value: &str) -> Result<Vec<Vec<String>>, TrackingError> {
        let idx = match self.column_index(column) {
            Some(idx) => idx,
            None => return Ok(Vec::new()),
        };
        Ok(self
            .read_rows()?
            .into_iter()
            .filter(|row| row.get(idx).map(String::as_str) == Some(value))
            .collect())
    }

    /// Read-modify-write of the whole file under one exclusive lock. The
    /// mutator reports how many rows it changed.
    pub fn rewrite(
        &self,
        mutate: impl FnOnce(&mut Vec<Vec<String>>) -> usize,
    ) -> Result<usize, TrackingError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        let mut lock = RwLock::new(file);
        let mut guard = lock.write().map_err(|e| self.io_err(e))?;

        let mut text = String::new();
        guard.read_to_string(&mut text).map_err(|e| self.io_err(e))?;
        let mut rows = Vec::new();
        if !text.is_empty() {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .from_reader(text.as_bytes());
            for record in reader.records() {
                let record = record.map_err(|e| self.csv_err(e))?;
                rows.push(record.iter().map(str::to_string).collect::<Vec<String>>());
            }
        }

        let changed = mutate(&mut rows);

        let mut buf: Vec<u8> = Vec::new();
        {
            let mut writer = csv::Writer::from_writer(&mut buf);
            writer.write_record(self.columns).map_err(|e| self.csv_err(e))?;
            for row in &rows {
                writer.write_record(row).map_err(|e| self.csv_err(e))?;
            }
            writer.flush().map_err(|e| self.io_err(e))?;
        }
        guard.seek(SeekFrom::Start(0)).map_err(|e| self.io_err(e))?;
        guard.set_len(0).map_err(|e| self.io_err(e))?;
        guard.write_all(&buf).map_err(|e| self.io_err(e))?;
        Ok(changed)
    }
}
