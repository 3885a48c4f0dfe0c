use serde_json::{Map, Number, Value};

use crate::error::DbdeskError;
use crate::result::{CellValue, ResultSet, hex_encode};
use crate::session::TableHandle;

/// JSON form of one cell, as fed to the TOON encoder.
pub fn cell_to_json(value: &CellValue) -> Value {
    match value {
        CellValue::Null => Value::Null,
        CellValue::Integer(i) => Value::Number((*i).into()),
        CellValue::Real(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        CellValue::Text(s) => Value::String(s.clone()),
        CellValue::Blob(b) => Value::String(hex_encode(b)),
    }
}

/// Convert a ResultSet to a TOON-formatted string.
pub fn to_toon(result: &ResultSet) -> Result<String, DbdeskError> {
    // toon_format can't infer columns from an empty array, so the header is
    // produced by hand.
    if result.rows.is_empty() && !result.columns.is_empty() {
        return Ok(format!("[0]{{{}}}:\n", result.column_names().join(",")));
    }

    let rows = result.rows.iter().map(|row| {
        result
            .columns
            .iter()
            .zip(row)
            .map(|(col, cell)| (col.name.clone(), cell_to_json(cell)))
            .collect::<Map<String, Value>>()
    });
    encode_records(rows)
}

/// Render a table listing as TOON with `name` and `rows` fields.
pub fn tables_to_toon(tables: &[TableHandle]) -> Result<String, DbdeskError> {
    if tables.is_empty() {
        return Ok("[0]{name,rows}:\n".to_string());
    }
    let rows = tables.iter().map(|t| {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(t.name.clone()));
        map.insert("rows".to_string(), Value::Number(t.row_count.into()));
        map
    });
    encode_records(rows)
}

fn encode_records(rows: impl Iterator<Item = Map<String, Value>>) -> Result<String, DbdeskError> {
    let array = Value::Array(rows.map(Value::Object).collect());
    toon_format::encode_default(&array).map_err(|e| DbdeskError::Format {
        message: e.to_string(),
    })
}

/// Convert key-value pairs to TOON format (status lines such as `info`).
pub fn to_toon_kv(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}
