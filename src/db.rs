use std::path::Path;

use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::record::StandardRecord;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("dataset {0} has no rows")]
    EmptyDataset(String),
}

/// One failed insert, kept so a bad row never aborts the import.
#[derive(Debug, Clone)]
pub struct RowError {
    /// 1-indexed data row number in the source CSV
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub rows_imported: usize,
    pub errors: Vec<RowError>,
}

/// SQLite sink for merged datasets. Table reset is destructive by design
/// and only ever called behind an explicit flag plus confirmation.
pub struct Uploader {
    conn: Connection,
    table: String,
}

impl Uploader {
    /// Open (creating if needed) the database file. The table name must
    /// already be validated by config (alphanumeric/underscore only).
    pub fn open(path: &Path, table: &str) -> Result<Self, UploadError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    pub fn open_in_memory(table: &str) -> Result<Self, UploadError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            table: table.to_string(),
        })
    }

    /// Drop and recreate the destination table.
    pub fn create_or_reset_table(&self) -> Result<(), UploadError> {
        self.conn.execute_batch(&format!(
            r#"
            DROP TABLE IF EXISTS "{table}";
            CREATE TABLE "{table}" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                city TEXT NOT NULL CHECK (city <> ''),
                country TEXT,
                region TEXT,
                category TEXT NOT NULL,
                table_caption TEXT,
                imported_at TEXT NOT NULL,
                item TEXT NOT NULL CHECK (item <> ''),
                value TEXT,
                value2 TEXT,
                value3 TEXT,
                note TEXT,
                data_type TEXT,
                source_file TEXT
            );
            "#,
            table = self.table
        ))?;
        info!("Table '{}' dropped and recreated", self.table);
        Ok(())
    }

    pub fn table_exists(&self) -> Result<bool, UploadError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [&self.table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn row_count(&self) -> Result<i64, UploadError> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", self.table), [], |row| row.get(0))?;
        Ok(count)
    }

    /// Bulk-import a merged CSV. Insert-only; rows that fail a constraint
    /// are collected and reported while the rest of the import continues.
    pub fn import(&mut self, csv_path: &Path) -> Result<ImportSummary, UploadError> {
        let mut reader = csv::Reader::from_path(csv_path)?;
        let headers = reader.headers()?.clone();

        // The import schema is StandardRecord columns plus source_file;
        // columns absent from the CSV insert as empty.
        let mut columns: Vec<&str> = StandardRecord::COLUMNS.to_vec();
        columns.push("source_file");
        let index_of: Vec<Option<usize>> = columns
            .iter()
            .map(|col| headers.iter().position(|h| h == *col))
            .collect();

        let placeholders = (1..=columns.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let mut summary = ImportSummary::default();
        for (i, result) in reader.records().enumerate() {
            let row_number = i + 1;
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    warn!("Row {} unreadable: {}", row_number, e);
                    summary.errors.push(RowError {
                        row: row_number,
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            summary.rows_read += 1;

            let values: Vec<&str> = index_of
                .iter()
                .map(|idx| idx.and_then(|i| row.get(i)).unwrap_or(""))
                .collect();

            match stmt.execute(rusqlite::params_from_iter(values.iter())) {
                Ok(_) => summary.rows_imported += 1,
                Err(e) => {
                    debug!("Insert failed for row {}: {}", row_number, e);
                    summary.errors.push(RowError {
                        row: row_number,
                        message: e.to_string(),
                    });
                }
            }
        }

        if summary.rows_read == 0 && summary.errors.is_empty() {
            return Err(UploadError::EmptyDataset(csv_path.display().to_string()));
        }

        info!(
            "Imported {} of {} rows into '{}' ({} errors)",
            summary.rows_imported,
            summary.rows_read,
            self.table,
            summary.errors.len()
        );
        Ok(summary)
    }
}
