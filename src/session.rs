//! Ownership of the single live database connection.
//!
//! Every other component borrows the connection through
//! [`Session::connection`]; closing or reopening is reserved to the session,
//! so a borrowed handle can never outlive the connection it came from.

use std::path::{Path, PathBuf};

use chrono::Local;
use rusqlite::{Connection, OpenFlags};

use crate::error::DbdeskError;
use crate::history::QueryHistory;

/// A table name plus its exact row count at listing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHandle {
    pub name: String,
    pub row_count: u64,
}

/// Quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Default)]
pub struct Session {
    path: Option<PathBuf>,
    connection: Option<Connection>,
    history: QueryHistory,
}

impl Session {
    /// An empty session with no database open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an existing database file. Missing files are not created.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), DbdeskError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DbdeskError::Connection {
                message: format!("cannot open {}: no such database file", path.display()),
            });
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        self.attach(path, flags)
    }

    /// Open `path`, creating the file if needed. An existing file is opened
    /// as-is, never truncated.
    pub fn create(&mut self, path: impl AsRef<Path>) -> Result<(), DbdeskError> {
        let path = path.as_ref();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        self.attach(path, flags)
    }

    fn attach(&mut self, path: &Path, flags: OpenFlags) -> Result<(), DbdeskError> {
        let connection_error = |e: rusqlite::Error| DbdeskError::Connection {
            message: format!("cannot open {}: {}", path.display(), e),
        };

        let conn = Connection::open_with_flags(path, flags).map_err(connection_error)?;
        // The first pragma touches the file header, so corrupt or foreign
        // files are rejected here rather than on the first query.
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
            .map_err(connection_error)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(connection_error)?;

        // Replacing a live connection closes the old one first.
        self.close()?;
        self.connection = Some(conn);
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Release the connection. Closing an already-closed session is a no-op.
    pub fn close(&mut self) -> Result<(), DbdeskError> {
        self.path = None;
        match self.connection.take() {
            Some(conn) => conn.close().map_err(|(_, e)| DbdeskError::Connection {
                message: format!("error while closing database: {e}"),
            }),
            None => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Borrow the live connection.
    pub fn connection(&self) -> Result<&Connection, DbdeskError> {
        self.connection.as_ref().ok_or(DbdeskError::NoConnection)
    }

    pub fn history(&self) -> &QueryHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut QueryHistory {
        &mut self.history
    }

    /// Tables ordered by name with exact row counts. Empty when closed.
    pub fn list_tables(&self) -> Result<Vec<TableHandle>, DbdeskError> {
        let Some(conn) = self.connection.as_ref() else {
            return Ok(Vec::new());
        };
        table_names(conn)?
            .into_iter()
            .map(|name| {
                let row_count = count_rows(conn, &name)?;
                Ok(TableHandle { name, row_count })
            })
            .collect()
    }

    /// Table names ordered by name, without counting rows. Empty when closed.
    pub fn table_names(&self) -> Result<Vec<String>, DbdeskError> {
        match self.connection.as_ref() {
            Some(conn) => table_names(conn),
            None => Ok(Vec::new()),
        }
    }

    /// Size of the database file on disk.
    pub fn file_size(&self) -> Result<u64, DbdeskError> {
        let path = self.path.as_ref().ok_or(DbdeskError::NoConnection)?;
        Ok(std::fs::metadata(path)?.len())
    }

    /// Write a snapshot of the database to `<path>.backup_<YYYYMMDD_HHMMSS>`.
    ///
    /// The snapshot comes from `VACUUM INTO`, so it is consistent even while
    /// other connections hold read transactions that keep the WAL from being
    /// checkpointed. It lands under a `.partial` name and is renamed into
    /// place once complete.
    pub fn backup(&self) -> Result<PathBuf, DbdeskError> {
        let conn = self.connection()?;
        let path = self.path.as_ref().ok_or(DbdeskError::NoConnection)?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let mut target = path.clone().into_os_string();
        target.push(format!(".backup_{stamp}"));
        let target = PathBuf::from(target);

        let mut partial = target.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);
        let partial_name = partial.to_str().ok_or_else(|| DbdeskError::Query {
            message: format!("backup path is not valid UTF-8: {}", partial.display()),
        })?;

        // VACUUM INTO refuses to overwrite an existing file.
        if partial.exists() {
            std::fs::remove_file(&partial)?;
        }
        if let Err(e) = conn.execute("VACUUM INTO ?1", [partial_name]) {
            let _ = std::fs::remove_file(&partial);
            return Err(DbdeskError::query(e));
        }
        std::fs::rename(&partial, &target)?;
        Ok(target)
    }

    /// Rebuild the database file without free pages. Needs exclusive use of
    /// the connection for its duration.
    pub fn compact(&self) -> Result<(), DbdeskError> {
        let conn = self.connection()?;
        conn.execute_batch("VACUUM;").map_err(DbdeskError::query)
    }
}

fn table_names(conn: &Connection) -> Result<Vec<String>, DbdeskError> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .map_err(DbdeskError::query)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(DbdeskError::query)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(DbdeskError::query)?;
    Ok(names)
}

pub(crate) fn count_rows(conn: &Connection, table: &str) -> Result<u64, DbdeskError> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
    conn.query_row(&sql, [], |row| row.get::<_, i64>(0))
        .map(|n| n.max(0) as u64)
        .map_err(DbdeskError::query)
}

/// Whether `table` exists in the database.
pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool, DbdeskError> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
    .map_err(DbdeskError::query)
}
