//! Paged, filterable snapshot of a table, independent of any renderer.

use rusqlite::Connection;

use crate::error::DbdeskError;
use crate::result::{CellValue, ColumnMeta, ResultSet};
use crate::session::{count_rows, quote_ident};

/// Default number of rows loaded per browse.
pub const DEFAULT_VIEW_LIMIT: usize = 1000;

/// How many rows `load` pulls from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLimit {
    Limited(usize),
    All,
}

impl Default for RowLimit {
    fn default() -> Self {
        RowLimit::Limited(DEFAULT_VIEW_LIMIT)
    }
}

#[derive(Debug, Default)]
pub struct ResultView {
    table: Option<String>,
    limit: RowLimit,
    data: ResultSet,
    total_count: u64,
    filter: String,
    visible: Vec<usize>,
}

impl ResultView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the table, then load at most `limit` rows of it, replacing the
    /// held data. The current filter is re-applied to the new rows.
    pub fn load(
        &mut self,
        conn: &Connection,
        table: &str,
        limit: RowLimit,
    ) -> Result<(), DbdeskError> {
        let total_count = count_rows(conn, table)?;

        let mut sql = format!("SELECT * FROM {}", quote_ident(table));
        if let RowLimit::Limited(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        let mut stmt = conn.prepare(&sql).map_err(DbdeskError::query)?;
        let mut data = ResultSet::new(ResultSet::columns_of(&stmt));
        let width = data.columns.len();
        let mut rows = stmt.query([]).map_err(DbdeskError::query)?;
        while let Some(row) = rows.next().map_err(DbdeskError::query)? {
            data.rows
                .push(ResultSet::read_row(row, width).map_err(DbdeskError::query)?);
        }

        self.table = Some(table.to_string());
        self.limit = limit;
        self.data = data;
        self.total_count = total_count;
        self.apply_filter();
        Ok(())
    }

    /// Reload the tracked table with the current limit. No-op before the
    /// first `load`.
    pub fn refresh(&mut self, conn: &Connection) -> Result<(), DbdeskError> {
        match self.table.clone() {
            Some(table) => self.load(conn, &table, self.limit),
            None => Ok(()),
        }
    }

    /// Show only rows with a cell containing `text`, case-insensitively.
    /// Works on loaded rows only; the database is not touched.
    pub fn set_filter(&mut self, text: &str) {
        self.filter = text.to_string();
        self.apply_filter();
    }

    /// Limit for the next `load`/`refresh`. Held rows are unchanged.
    pub fn set_limit(&mut self, limit: RowLimit) {
        self.limit = limit;
    }

    /// Drop all held rows and counts, e.g. after the connection closed.
    pub fn clear(&mut self) {
        self.table = None;
        self.data = ResultSet::default();
        self.total_count = 0;
        self.visible.clear();
    }

    fn apply_filter(&mut self) {
        let needle = self.filter.to_lowercase();
        self.visible = self
            .data
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| needle.is_empty() || row_matches(row, &needle))
            .map(|(idx, _)| idx)
            .collect();
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn limit(&self) -> RowLimit {
        self.limit
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.data.columns
    }

    /// Every loaded row, ignoring the filter.
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.data.rows
    }

    /// Loaded rows that pass the filter, in load order.
    pub fn visible_rows(&self) -> impl Iterator<Item = &Vec<CellValue>> {
        self.visible.iter().map(|&idx| &self.data.rows[idx])
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn loaded_count(&self) -> usize {
        self.data.rows.len()
    }

    /// Row count of the whole table at the last load.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Whether the held rows are a prefix of a larger table.
    pub fn is_truncated(&self) -> bool {
        self.total_count > self.loaded_count() as u64
    }

    /// One-line status for display.
    pub fn summary(&self) -> String {
        if !self.filter.is_empty() {
            format!("shown: {} of {}", self.visible_count(), self.loaded_count())
        } else if self.is_truncated() {
            format!("showing {} of {}", self.loaded_count(), self.total_count)
        } else {
            format!("total rows: {}", self.loaded_count())
        }
    }
}

fn row_matches(row: &[CellValue], needle: &str) -> bool {
    row.iter()
        .any(|cell| cell.to_string().to_lowercase().contains(needle))
}
