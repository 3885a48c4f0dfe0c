//! Bulk movement of data between tables and files.
//!
//! Delimited transfers stream in batches of `chunk_size` rows so peak memory
//! is bounded by the batch, not the dataset. The structured (JSON) and
//! spreadsheet paths read the whole document or table: the formats need the
//! full structure before anything can be written.
//!
//! There is no rollback across a job. Chunks committed before a failure stay
//! committed, and a failed export may leave a partial file behind.

pub mod delimited;
pub mod spreadsheet;
pub mod structured;

use std::fmt;
use std::path::Path;

use rusqlite::Connection;

use crate::error::DbdeskError;
use crate::result::{CellValue, ColumnMeta};
use crate::session::{quote_ident, table_exists};
use crate::verbose::Verbose;

/// Default number of rows per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Row cap for spreadsheet exports.
pub const SPREADSHEET_ROW_CAP: usize = 1_000_000;

/// Outcome of a finished transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub direction: Direction,
    pub table: String,
    pub file: String,
    pub rows: usize,
    pub chunks: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Import,
    Export,
}

impl TransferReport {
    /// Success text for the caller to display.
    pub fn message(&self) -> String {
        match self.direction {
            Direction::Import => format!(
                "imported {} rows into table {}",
                self.rows, self.table
            ),
            Direction::Export if self.truncated => format!(
                "table {} exported to {} (truncated at {} rows)",
                self.table, self.file, self.rows
            ),
            Direction::Export => format!(
                "table {} exported to {} ({} rows)",
                self.table, self.file, self.rows
            ),
        }
    }
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Import/export driver carrying the batch size for streamed formats.
#[derive(Debug, Clone)]
pub struct ChunkedTransfer {
    chunk_size: usize,
    verbose: Verbose,
}

impl Default for ChunkedTransfer {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            verbose: Verbose::default(),
        }
    }
}

impl ChunkedTransfer {
    /// A driver with the given batch size. Zero is rejected.
    pub fn new(chunk_size: usize) -> Result<Self, DbdeskError> {
        if chunk_size == 0 {
            return Err(DbdeskError::Config {
                message: "chunk size must be at least 1".to_string(),
            });
        }
        Ok(Self {
            chunk_size,
            verbose: Verbose::default(),
        })
    }

    pub fn with_verbose(mut self, verbose: Verbose) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn import_delimited(
        &self,
        file_path: &Path,
        conn: &Connection,
    ) -> Result<TransferReport, DbdeskError> {
        delimited::import(file_path, conn, self.chunk_size, self.verbose)
    }

    pub fn import_structured(
        &self,
        file_path: &Path,
        conn: &Connection,
    ) -> Result<TransferReport, DbdeskError> {
        structured::import(file_path, conn, self.verbose)
    }

    pub fn export_delimited(
        &self,
        table: &str,
        file_path: &Path,
        conn: &Connection,
    ) -> Result<TransferReport, DbdeskError> {
        delimited::export(table, file_path, conn, self.chunk_size, self.verbose)
    }

    pub fn export_structured(
        &self,
        table: &str,
        file_path: &Path,
        conn: &Connection,
    ) -> Result<TransferReport, DbdeskError> {
        structured::export(table, file_path, conn, self.verbose)
    }

    pub fn export_spreadsheet(
        &self,
        table: &str,
        file_path: &Path,
        conn: &Connection,
    ) -> Result<TransferReport, DbdeskError> {
        spreadsheet::export(table, file_path, conn, SPREADSHEET_ROW_CAP, self.verbose)
    }
}

/// Target table name for an import: the file's base name without extension.
pub fn derive_table_name(file_path: &Path) -> Result<String, DbdeskError> {
    file_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| DbdeskError::Import {
            file: file_path.display().to_string(),
            message: "cannot derive a table name from the file name".to_string(),
            chunks_committed: 0,
        })
}

/// File name for messages: base name when there is one.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Drop `table` if present and create it with the given declared types.
pub(crate) fn replace_table(
    conn: &Connection,
    table: &str,
    columns: &[ColumnMeta],
) -> rusqlite::Result<()> {
    let definitions = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.type_name))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({definitions});",
        table = quote_ident(table),
    ))
}

/// Insert rows through one prepared statement.
pub(crate) fn insert_rows(
    conn: &Connection,
    table: &str,
    width: usize,
    rows: impl IntoIterator<Item = Vec<CellValue>>,
) -> rusqlite::Result<usize> {
    let placeholders = vec!["?"; width].join(", ");
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} VALUES ({placeholders})",
        quote_ident(table)
    ))?;
    let mut inserted = 0;
    for row in rows {
        stmt.execute(rusqlite::params_from_iter(row.iter()))?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Prepare `SELECT *` over an existing table, failing with an export error
/// when the table is missing.
pub(crate) fn select_all<'c>(
    conn: &'c Connection,
    table: &str,
    file_path: &Path,
    limit: Option<usize>,
) -> Result<rusqlite::Statement<'c>, DbdeskError> {
    let export_error = |message: String| DbdeskError::Export {
        table: table.to_string(),
        file: display_name(file_path),
        message,
    };
    if !table_exists(conn, table)? {
        return Err(export_error("no such table".to_string()));
    }
    let mut sql = format!("SELECT * FROM {}", quote_ident(table));
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    conn.prepare(&sql).map_err(|e| export_error(e.to_string()))
}
