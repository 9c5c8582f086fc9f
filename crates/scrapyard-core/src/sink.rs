use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// A row of extracted data ready to be written to an [`OutputSink`].
///
/// Wraps a flat list of optional cells: `None` marks a cell that matched a
/// configured sentinel. A row containing any `None` is dropped entirely at
/// write time, matching `extraction.py`'s `df.dropna()` behavior.
#[derive(Debug, Clone, Default)]
pub struct Row(pub Vec<Option<String>>);

impl Row {
    pub fn new(cells: Vec<Option<String>>) -> Self {
        Self(cells)
    }

    /// Whether every cell is present (no sentinel-mapped null).
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }
}

/// Where extracted rows are appended once an extraction completes.
///
/// The design names only one concrete sink ("append CSV"); the trait exists
/// so the write-side stays a real seam rather than a single hardcoded
/// function, the way the original's `output_writers` dict dispatched on
/// output type.
pub trait OutputSink {
    /// Appends valid rows to the sink. Invalid rows (containing a `None`
    /// cell) are silently dropped. Writing zero rows is a no-op: no file is
    /// created and no lines are written.
    fn append(&self, rows: &[Row]) -> Result<(), Error>;
}

/// Appends rows to a CSV file with no header, creating parent directories on
/// demand, mirroring `target.py::write_output`'s `mode='a', header=False`.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for CsvSink {
    fn append(&self, rows: &[Row]) -> Result<(), Error> {
        let valid: Vec<&Row> = rows.iter().filter(|r| r.is_valid()).collect();
        if valid.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        for row in valid {
            let record: Vec<&str> = row
                .0
                .iter()
                .map(|c| c.as_deref().unwrap_or_default())
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn appends_only_valid_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let sink = CsvSink::new(&path);

        let rows = vec![
            Row::new(vec![Some("alpha".into()), Some("06/01/2026".into())]),
            Row::new(vec![None, Some("06/01/2026".into())]),
            Row::new(vec![Some("beta".into()), Some("06/01/2026".into())]),
        ];
        sink.append(&rows).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "alpha,06/01/2026\nbeta,06/01/2026\n");
    }

    #[test]
    fn empty_rows_write_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let sink = CsvSink::new(&path);
        sink.append(&[]).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn all_invalid_rows_write_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let sink = CsvSink::new(&path);
        sink.append(&[Row::new(vec![None])]).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/out.csv");
        let sink = CsvSink::new(&path);
        sink.append(&[Row::new(vec![Some("x".into())])]).unwrap();
        assert!(path.exists());
    }
}
