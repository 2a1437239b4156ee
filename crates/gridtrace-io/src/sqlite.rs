//! Sincal network databases stored as SQLite files.
//!
//! The reader is synchronous like every other [`RecordSource`]; queries run on
//! a private current-thread runtime.

use crate::source::RecordSource;
use crate::table::{Table, Value};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use std::path::{Path, PathBuf};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

/// Tables a Sincal database is read from
pub const SINCAL_TABLES: &[&str] = &[
    "Element",
    "Terminal",
    "Line",
    "Breaker",
    "VoltageLevel",
    "TwoWindingTransformer",
    "Node",
    "Load",
    "DCInfeeder",
    "ShuntCondensator",
    "ShuntReactor",
    "Infeeder",
    "SynchronousMachine",
];

fn runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting database runtime")
}

fn quoted(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Read-only view of a SQLite network database
pub struct SqliteDatabase {
    path: PathBuf,
    runtime: Runtime,
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        anyhow::ensure!(path.is_file(), "{} is not a database file", path.display());
        let runtime = runtime()?;
        let options = SqliteConnectOptions::new().filename(&path).read_only(true);
        let pool = runtime
            .block_on(SqlitePoolOptions::new().max_connections(1).connect_with(options))
            .with_context(|| format!("opening database {}", path.display()))?;
        info!(path = %path.display(), "SQLite database opened");
        Ok(Self {
            path,
            runtime,
            pool,
        })
    }

    /// Column names in declaration order, empty when the table is missing
    fn columns(&self, name: &str) -> Result<Vec<String>> {
        let sql = format!("PRAGMA table_info({})", quoted(name));
        let rows = self
            .runtime
            .block_on(sqlx::query(&sql).fetch_all(&self.pool))
            .with_context(|| format!("reading columns of {name}"))?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }
}

fn cell(row: &SqliteRow, idx: usize) -> Result<Value> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();
    let value = match storage.as_str() {
        "INTEGER" => Value::Int(row.try_get::<i64, _>(idx)?),
        "REAL" => Value::Real(row.try_get::<f64, _>(idx)?),
        "TEXT" => Value::Text(row.try_get::<String, _>(idx)?),
        // BLOB
        _ => Value::parse(&String::from_utf8_lossy(&row.try_get::<Vec<u8>, _>(idx)?)),
    };
    Ok(value)
}

impl RecordSource for SqliteDatabase {
    fn table(&self, name: &str) -> Result<Option<Table>> {
        let columns = self.columns(name)?;
        if columns.is_empty() {
            debug!(table = name, "table not present");
            return Ok(None);
        }
        let select = columns
            .iter()
            .map(|c| quoted(c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {select} FROM {}", quoted(name));
        let fetched = self
            .runtime
            .block_on(sqlx::query(&sql).fetch_all(&self.pool))
            .with_context(|| format!("reading table {name}"))?;
        let mut rows = Vec::with_capacity(fetched.len());
        for (idx, row) in fetched.iter().enumerate() {
            let cells = (0..columns.len())
                .map(|col| cell(row, col))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("decoding {name} row {}", idx + 1))?;
            rows.push(cells);
        }
        debug!(table = name, rows = rows.len(), "read table");
        Ok(Some(Table {
            name: name.to_string(),
            columns,
            rows,
        }))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

impl Drop for SqliteDatabase {
    fn drop(&mut self) {
        self.runtime.block_on(self.pool.close());
    }
}

/// Write `tables` into a new SQLite file at `path`.
///
/// Columns are declared without a type so every cell keeps the storage class
/// of its [`Value`].
pub fn write_tables(path: impl AsRef<Path>, tables: &[Table]) -> Result<()> {
    let path = path.as_ref();
    anyhow::ensure!(!path.exists(), "{} already exists", path.display());
    let runtime = runtime()?;
    runtime.block_on(async {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("creating database {}", path.display()))?;
        let mut tx = pool.begin().await?;
        for table in tables {
            let columns = table
                .columns
                .iter()
                .map(|c| quoted(c))
                .collect::<Vec<_>>()
                .join(", ");
            sqlx::query(&format!("CREATE TABLE {} ({columns})", quoted(&table.name)))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("creating table {}", table.name))?;
            let params = vec!["?"; table.columns.len()].join(", ");
            let insert = format!("INSERT INTO {} VALUES ({params})", quoted(&table.name));
            for row in &table.rows {
                let mut query = sqlx::query(&insert);
                for col in 0..table.columns.len() {
                    query = match row.get(col).unwrap_or(&Value::Null) {
                        Value::Null => query.bind(None::<i64>),
                        Value::Int(i) => query.bind(*i),
                        Value::Real(f) => query.bind(*f),
                        Value::Text(s) => query.bind(s.clone()),
                    };
                }
                query
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("inserting into {}", table.name))?;
            }
        }
        tx.commit().await?;
        pool.close().await;
        info!(path = %path.display(), tables = tables.len(), "SQLite database written");
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reads_storage_classes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("net.db");
        let line = Table::new("Line", &["Element_ID", "l", "Name"])
            .with_row(vec![Value::Int(1), Value::Real(0.05), "Cable A".into()])
            .with_row(vec![Value::Int(2), Value::Null, Value::Null]);
        write_tables(&path, &[line.clone()]).unwrap();

        let db = SqliteDatabase::open(&path).unwrap();
        assert_eq!(db.table("Line").unwrap().unwrap(), line);
        assert!(db.table("Breaker").unwrap().is_none());
        assert!(db.describe().ends_with("net.db"));
    }

    #[test]
    fn test_quoted_table_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("odd.db");
        let odd = Table::new("Odd \"Name\"", &["a b"]).with_row(vec!["x".into()]);
        write_tables(&path, &[odd.clone()]).unwrap();
        let db = SqliteDatabase::open(&path).unwrap();
        assert_eq!(db.table("Odd \"Name\"").unwrap().unwrap(), odd);
    }

    #[test]
    fn test_open_rejects_directories_and_missing_files() {
        let dir = tempdir().unwrap();
        assert!(SqliteDatabase::open(dir.path()).is_err());
        assert!(SqliteDatabase::open(dir.path().join("missing.db")).is_err());
    }

    #[test]
    fn test_write_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("net.db");
        std::fs::write(&path, "").unwrap();
        assert!(write_tables(&path, &[]).is_err());
    }
}
