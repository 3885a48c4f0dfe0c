//! Ad-hoc statement execution against the session's connection.
//!
//! Statement text is opaque. The only inspection is the lexical read/write
//! split in [`classify`]: text starting with `SELECT` (after trimming,
//! case-insensitive) is a read, anything else is a write. `WITH ... SELECT`
//! and `EXPLAIN SELECT` therefore run on the write path; their rows are
//! stepped through and discarded.

use rusqlite::Connection;

use crate::error::DbdeskError;
use crate::result::ResultSet;
use crate::session::Session;

/// Maximum number of rows a read materializes.
pub const MAX_RESULT_ROWS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

/// Classify statement text. `None` for blank or whitespace-only input.
pub fn classify(sql: &str) -> Option<StatementKind> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return None;
    }
    let is_select = trimmed
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("SELECT"));
    Some(if is_select {
        StatementKind::Read
    } else {
        StatementKind::Write
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Rows from a read, capped at `row_cap`.
    Read {
        result: ResultSet,
        truncated: bool,
        row_cap: usize,
    },
    /// A committed write.
    Write { affected_rows: u64 },
    /// Blank input: neither recorded nor executed.
    Skipped,
}

impl QueryOutcome {
    pub fn is_read(&self) -> bool {
        matches!(self, QueryOutcome::Read { .. })
    }

    pub fn truncated(&self) -> bool {
        matches!(self, QueryOutcome::Read { truncated: true, .. })
    }

    pub fn affected_rows(&self) -> u64 {
        match self {
            QueryOutcome::Write { affected_rows } => *affected_rows,
            _ => 0,
        }
    }

    pub fn result(&self) -> Option<&ResultSet> {
        match self {
            QueryOutcome::Read { result, .. } => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryExecutor {
    row_cap: usize,
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self {
            row_cap: MAX_RESULT_ROWS,
        }
    }
}

impl QueryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_cap(&self) -> usize {
        self.row_cap
    }

    /// Run one statement.
    ///
    /// Non-blank text is appended to the session history before it runs, so
    /// failed attempts stay recorded.
    pub fn execute(&self, session: &mut Session, sql: &str) -> Result<QueryOutcome, DbdeskError> {
        session.connection()?;
        let Some(kind) = classify(sql) else {
            return Ok(QueryOutcome::Skipped);
        };
        session.history_mut().record(sql);

        let conn = session.connection()?;
        match kind {
            StatementKind::Read => self.read(conn, sql),
            StatementKind::Write => write(conn, sql),
        }
    }

    fn read(&self, conn: &Connection, sql: &str) -> Result<QueryOutcome, DbdeskError> {
        let mut stmt = conn.prepare(sql).map_err(DbdeskError::query)?;
        let mut result = ResultSet::new(ResultSet::columns_of(&stmt));
        let width = result.columns.len();

        let mut rows = stmt.query([]).map_err(DbdeskError::query)?;
        while result.rows.len() < self.row_cap {
            match rows.next().map_err(DbdeskError::query)? {
                Some(row) => result
                    .rows
                    .push(ResultSet::read_row(row, width).map_err(DbdeskError::query)?),
                None => break,
            }
        }

        // Reaching the cap counts as truncated; rows past it are never fetched.
        let truncated = result.rows.len() >= self.row_cap;
        Ok(QueryOutcome::Read {
            result,
            truncated,
            row_cap: self.row_cap,
        })
    }
}

fn write(conn: &Connection, sql: &str) -> Result<QueryOutcome, DbdeskError> {
    let before = total_changes(conn)?;
    {
        let mut stmt = conn.prepare(sql).map_err(DbdeskError::query)?;
        let mut rows = stmt.query([]).map_err(DbdeskError::query)?;
        while rows.next().map_err(DbdeskError::query)?.is_some() {}
    }
    if !conn.is_autocommit() {
        conn.execute_batch("COMMIT;").map_err(DbdeskError::query)?;
    }
    let after = total_changes(conn)?;
    Ok(QueryOutcome::Write {
        affected_rows: after.saturating_sub(before),
    })
}

fn total_changes(conn: &Connection) -> Result<u64, DbdeskError> {
    conn.query_row("SELECT total_changes()", [], |row| row.get::<_, i64>(0))
        .map(|n| n.max(0) as u64)
        .map_err(DbdeskError::query)
}
