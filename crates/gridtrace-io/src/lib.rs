//! # gridtrace-io: Sincal Readers and Network Writers
//!
//! Reads the tables of a Sincal database (a CSV export or the SQLite file
//! itself), decodes them into typed records and materialises the raw
//! [`TopologyStore`]. Writers persist the reconstructed networks.
//!
//! ## Example
//!
//! ```no_run
//! use gridtrace_io::{load_directory, OutputWriter};
//!
//! let (store, diagnostics) = load_directory("export/")?;
//! let mut writer = OutputWriter::new("out/")?;
//! writer.write_network("feeder", &store)?;
//! writer.finish(&diagnostics)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{bail, Result};
use gridtrace_core::{Diagnostics, TopologyStore};
use std::path::Path;

pub mod loader;
pub mod sincal;
pub mod source;
pub mod sqlite;
pub mod table;
pub mod writer;

pub use loader::{build_store, LoadStats};
pub use sincal::SincalDatabase;
pub use source::{CsvDirectory, MemorySource, RecordSource};
pub use sqlite::{write_tables, SqliteDatabase, SINCAL_TABLES};
pub use table::{ColumnMap, Row, Table, Value};
pub use writer::{file_stem, ManifestEntry, OutputWriter};

/// Read any record source into a raw store
pub fn load_source(source: &dyn RecordSource) -> Result<(TopologyStore, Diagnostics)> {
    let db = SincalDatabase::open(source)?;
    let mut diagnostics = db.diagnostics().clone();
    let (store, _) = build_store(&db, &mut diagnostics);
    Ok((store, diagnostics))
}

/// Read a directory of `<Table>.csv` files into a raw store
pub fn load_directory(root: impl AsRef<Path>) -> Result<(TopologyStore, Diagnostics)> {
    let source = CsvDirectory::open(root.as_ref())?;
    load_source(&source)
}

/// Open a CSV directory or a SQLite database file, whichever `path` is
pub fn open_source(path: impl AsRef<Path>) -> Result<Box<dyn RecordSource>> {
    let path = path.as_ref();
    if path.is_dir() {
        Ok(Box::new(CsvDirectory::open(path)?))
    } else if path.is_file() {
        Ok(Box::new(SqliteDatabase::open(path)?))
    } else {
        bail!("{} is not a directory or a database file", path.display())
    }
}

/// Read a CSV directory or a SQLite database into a raw store
pub fn load_path(path: impl AsRef<Path>) -> Result<(TopologyStore, Diagnostics)> {
    let source = open_source(path)?;
    load_source(source.as_ref())
}
