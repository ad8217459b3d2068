//! In-memory CSV tables with a dynamic column set.
//!
//! Raw post files and persisted result files share this representation so
//! columns the pipeline does not know about pass through untouched. Writes
//! go to a temporary file in the destination directory which is then
//! renamed over the target, so a crash mid-write leaves the previous file
//! intact.

use crate::error::TableError;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row, padding missing trailing cells with empty strings.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    /// Index of `name`, adding it as an empty column if absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: String) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value;
        }
    }

    /// Values of one column in row order, or `None` if the column is absent.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// New table with the same headers holding the given rows, in order.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Append the rows of `other`, matching cells by column name.
    ///
    /// Columns only present in `other` are added to the end of this table;
    /// cells absent on either side are left empty.
    pub fn append(&mut self, other: &Table) {
        let mapping: Vec<usize> = other
            .headers
            .iter()
            .map(|h| self.ensure_column(h))
            .collect();

        for row in &other.rows {
            let mut aligned = vec![String::new(); self.headers.len()];
            for (src, &dst) in mapping.iter().enumerate() {
                if let Some(value) = row.get(src) {
                    aligned[dst] = value.clone();
                }
            }
            self.rows.push(aligned);
        }
    }

    /// Drop later rows whose `column` value repeats an earlier one.
    ///
    /// Returns the number of rows removed. A missing column removes nothing.
    pub fn dedupe_by(&mut self, column: &str) -> usize {
        let Some(idx) = self.column_index(column) else {
            return 0;
        };
        let before = self.rows.len();
        let mut seen = std::collections::HashSet::new();
        self.rows.retain(|row| seen.insert(row[idx].clone()));
        before - self.rows.len()
    }

    pub fn read(path: &Path) -> Result<Self, TableError> {
        let file = File::open(path).map_err(|e| TableError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_reader(file, &path.display().to_string())
    }

    /// Like [`Table::read`] but a missing file is `Ok(None)`.
    pub fn read_optional(path: &Path) -> Result<Option<Self>, TableError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::read(path).map(Some)
    }

    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self, TableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(|e| TableError::ReadFailed {
                path: source.to_string(),
                reason: e.to_string(),
            })?
            .iter()
            .map(str::to_string)
            .collect();

        let mut table = Table::new(headers);
        for result in csv_reader.records() {
            let record = result.map_err(|e| TableError::ReadFailed {
                path: source.to_string(),
                reason: e.to_string(),
            })?;
            if record.len() > table.headers.len() {
                return Err(TableError::MalformedRow {
                    path: source.to_string(),
                    line: record.position().map(|p| p.line()).unwrap_or_default(),
                    reason: format!(
                        "expected at most {} fields, found {}",
                        table.headers.len(),
                        record.len()
                    ),
                });
            }
            table.push_row(record.iter().map(str::to_string).collect());
        }

        Ok(table)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.headers)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Replace `path` with this table's contents via write-then-rename.
    pub fn write_atomic(&self, path: &Path) -> Result<(), TableError> {
        let write_failed = |reason: String| TableError::WriteFailed {
            path: path.display().to_string(),
            reason,
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| write_failed(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| write_failed(e.to_string()))?;
        self.to_writer(&mut tmp)
            .map_err(|e| write_failed(e.to_string()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| write_failed(e.to_string()))?;

        tmp.persist(path).map_err(|e| TableError::PersistFailed {
            path: path.display().to_string(),
            reason: e.error.to_string(),
        })?;
        Ok(())
    }
}
