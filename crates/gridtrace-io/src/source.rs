//! Where tables come from.
//!
//! A Sincal network database is a set of relational tables. [`CsvDirectory`]
//! reads a directory holding one `<Table>.csv` per table (the usual export of
//! the database); [`MemorySource`] serves tables built in code.

use crate::table::{Table, Value};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Provider of named tables.
///
/// Returns `Ok(None)` when the table does not exist; callers decide whether
/// that is an error.
pub trait RecordSource {
    fn table(&self, name: &str) -> Result<Option<Table>>;

    /// Human readable origin for log messages
    fn describe(&self) -> String;
}

/// Directory of CSV files, one per table, with a header row
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    root: PathBuf,
}

impl CsvDirectory {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let meta = std::fs::metadata(&root)
            .with_context(|| format!("opening table directory {}", root.display()))?;
        anyhow::ensure!(meta.is_dir(), "{} is not a directory", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.csv"))
    }
}

impl RecordSource for CsvDirectory {
    fn table(&self, name: &str) -> Result<Option<Table>> {
        let path = self.path_for(name);
        if !path.exists() {
            debug!(table = name, path = %path.display(), "table file not present");
            return Ok(None);
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        let columns = reader
            .headers()
            .with_context(|| format!("reading header of {}", path.display()))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("reading {} record {}", path.display(), idx + 1))?;
            rows.push(record.iter().map(Value::parse).collect());
        }
        debug!(table = name, rows = rows.len(), "read table");
        Ok(Some(Table {
            name: name.to_string(),
            columns,
            rows,
        }))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Tables held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<String, Table>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.insert(table);
        self
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }
}

impl RecordSource for MemorySource {
    fn table(&self, name: &str) -> Result<Option<Table>> {
        Ok(self.tables.get(name).cloned())
    }

    fn describe(&self) -> String {
        format!("memory ({} tables)", self.tables.len())
    }
}
