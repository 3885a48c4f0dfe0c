use std::fmt;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

/// Metadata for a single result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// Declared SQL type, empty when the engine reports none (expressions, views).
    pub type_name: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A single cell value, mirroring the engine's storage classes.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl From<ValueRef<'_>> for CellValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => CellValue::Integer(i),
            ValueRef::Real(f) => CellValue::Real(f),
            ValueRef::Text(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => CellValue::Blob(bytes.to_vec()),
        }
    }
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self {
            CellValue::Null => ValueRef::Null,
            CellValue::Integer(i) => ValueRef::Integer(*i),
            CellValue::Real(f) => ValueRef::Real(*f),
            CellValue::Text(s) => ValueRef::Text(s.as_bytes()),
            CellValue::Blob(b) => ValueRef::Blob(b),
        }))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str("NULL"),
            CellValue::Integer(i) => write!(f, "{i}"),
            // Whole reals keep a fractional digit so they read as REAL.
            CellValue::Real(r) if r.is_finite() && r.fract() == 0.0 => write!(f, "{r:.1}"),
            CellValue::Real(r) => write!(f, "{r}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Blob(b) => f.write_str(&hex_encode(b)),
        }
    }
}

/// Lowercase hex with a `0x` prefix, the text form used for BLOBs in every export.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Materialized rows plus their column metadata.
///
/// Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Columns and declared types of a prepared statement.
    pub fn columns_of(stmt: &rusqlite::Statement<'_>) -> Vec<ColumnMeta> {
        stmt.columns()
            .iter()
            .map(|c| ColumnMeta::new(c.name(), c.decl_type().unwrap_or("")))
            .collect()
    }

    /// Copy one engine row into owned cells.
    pub fn read_row(row: &rusqlite::Row<'_>, width: usize) -> rusqlite::Result<Vec<CellValue>> {
        (0..width)
            .map(|i| row.get_ref(i).map(CellValue::from))
            .collect()
    }
}
