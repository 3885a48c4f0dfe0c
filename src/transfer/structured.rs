//! JSON array-of-records import and export.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rusqlite::Connection;
use serde_json::{Map, Number, Value};

use crate::error::DbdeskError;
use crate::format_columnar::sql_type_to_arrow;
use crate::result::{CellValue, ColumnMeta, ResultSet, hex_encode};
use crate::transfer::{
    Direction, TransferReport, derive_table_name, display_name, insert_rows, replace_table,
    select_all,
};
use crate::verbose::{Timer, Verbose};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonKind {
    Boolean,
    Integer,
    Real,
    Text,
}

impl JsonKind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(JsonKind::Boolean),
            Value::Number(n) if n.as_i64().is_some() => Some(JsonKind::Integer),
            Value::Number(_) => Some(JsonKind::Real),
            _ => Some(JsonKind::Text),
        }
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (JsonKind::Integer, JsonKind::Real) | (JsonKind::Real, JsonKind::Integer) => JsonKind::Real,
            _ => JsonKind::Text,
        }
    }

    fn sql_type(self) -> &'static str {
        match self {
            JsonKind::Boolean => "BOOLEAN",
            JsonKind::Integer => "INTEGER",
            JsonKind::Real => "REAL",
            JsonKind::Text => "TEXT",
        }
    }

    fn cell(self, value: &Value) -> CellValue {
        match (self, value) {
            (_, Value::Null) => CellValue::Null,
            (JsonKind::Boolean, Value::Bool(b)) => CellValue::Integer(i64::from(*b)),
            (JsonKind::Integer, Value::Number(n)) => n
                .as_i64()
                .map(CellValue::Integer)
                .unwrap_or_else(|| CellValue::Text(n.to_string())),
            (JsonKind::Real, Value::Number(n)) => n
                .as_f64()
                .map(CellValue::Real)
                .unwrap_or_else(|| CellValue::Text(n.to_string())),
            (_, Value::String(s)) => CellValue::Text(s.clone()),
            (_, other) => CellValue::Text(other.to_string()),
        }
    }
}

/// Import a JSON array of records into the table named after the file,
/// replacing any existing table in one transaction.
///
/// Columns appear in first-seen key order across all records; a record
/// missing a key gets NULL there.
pub fn import(
    file_path: &Path,
    conn: &Connection,
    verbose: Verbose,
) -> Result<TransferReport, DbdeskError> {
    let table = derive_table_name(file_path)?;
    let file_label = display_name(file_path);
    let import_error = |message: String| DbdeskError::Import {
        file: file_label.clone(),
        message,
        chunks_committed: 0,
    };

    let timer = Timer::start();
    let file = File::open(file_path).map_err(|e| import_error(e.to_string()))?;
    let document: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| import_error(e.to_string()))?;

    let Value::Array(items) = document else {
        return Err(import_error("expected a top-level array of records".to_string()));
    };
    let records = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object()
                .ok_or_else(|| import_error(format!("element {i} is not an object")))
        })
        .collect::<Result<Vec<&Map<String, Value>>, _>>()?;

    let mut names: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();
    for record in &records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                names.push(key.as_str());
            }
        }
    }
    if names.is_empty() {
        return Err(import_error("no fields to infer columns from".to_string()));
    }

    let kinds: Vec<JsonKind> = names
        .iter()
        .map(|name| {
            records
                .iter()
                .filter_map(|r| r.get(*name).and_then(JsonKind::of))
                .reduce(JsonKind::merge)
                .unwrap_or(JsonKind::Text)
        })
        .collect();
    let columns: Vec<ColumnMeta> = names
        .iter()
        .zip(&kinds)
        .map(|(name, kind)| ColumnMeta::new(*name, kind.sql_type()))
        .collect();

    let rows = records.iter().map(|record| {
        names
            .iter()
            .zip(&kinds)
            .map(|(name, kind)| kind.cell(record.get(*name).unwrap_or(&Value::Null)))
            .collect::<Vec<_>>()
    });

    let written =
        write_table(conn, &table, &columns, rows).map_err(|e| import_error(e.to_string()))?;
    verbose.finished("import complete", &timer, written);

    Ok(TransferReport {
        direction: Direction::Import,
        table,
        file: file_label,
        rows: written,
        chunks: 1,
        truncated: false,
    })
}

fn write_table(
    conn: &Connection,
    table: &str,
    columns: &[ColumnMeta],
    rows: impl IntoIterator<Item = Vec<CellValue>>,
) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    replace_table(&tx, table, columns)?;
    let written = insert_rows(&tx, table, columns.len(), rows)?;
    tx.commit()?;
    Ok(written)
}

/// Write the whole table as a pretty-printed JSON array of records, fields
/// in column order.
pub fn export(
    table: &str,
    file_path: &Path,
    conn: &Connection,
    verbose: Verbose,
) -> Result<TransferReport, DbdeskError> {
    let file_label = display_name(file_path);
    let export_error = |message: String| DbdeskError::Export {
        table: table.to_string(),
        file: file_label.clone(),
        message,
    };

    let timer = Timer::start();
    let mut stmt = select_all(conn, table, file_path, None)?;
    let columns = ResultSet::columns_of(&stmt);
    let boolean: Vec<bool> = columns
        .iter()
        .map(|c| sql_type_to_arrow(&c.type_name) == arrow::datatypes::DataType::Boolean)
        .collect();

    let mut records = Vec::new();
    let mut rows = stmt.query([]).map_err(|e| export_error(e.to_string()))?;
    while let Some(row) = rows.next().map_err(|e| export_error(e.to_string()))? {
        let cells = ResultSet::read_row(row, columns.len()).map_err(|e| export_error(e.to_string()))?;
        let record: Map<String, Value> = columns
            .iter()
            .zip(cells)
            .zip(&boolean)
            .map(|((col, cell), is_bool)| (col.name.clone(), json_value(cell, *is_bool)))
            .collect();
        records.push(Value::Object(record));
    }
    let count = records.len();

    let file = File::create(file_path).map_err(|e| export_error(e.to_string()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &Value::Array(records))
        .map_err(|e| export_error(e.to_string()))?;
    out.flush().map_err(|e| export_error(e.to_string()))?;
    verbose.finished("export complete", &timer, count);

    Ok(TransferReport {
        direction: Direction::Export,
        table: table.to_string(),
        file: file_label,
        rows: count,
        chunks: 1,
        truncated: false,
    })
}

fn json_value(cell: CellValue, is_bool: bool) -> Value {
    match cell {
        CellValue::Null => Value::Null,
        CellValue::Integer(i @ (0 | 1)) if is_bool => Value::Bool(i == 1),
        CellValue::Integer(i) => Value::Number(i.into()),
        CellValue::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        CellValue::Text(s) => Value::String(s),
        CellValue::Blob(b) => Value::String(hex_encode(&b)),
    }
}
