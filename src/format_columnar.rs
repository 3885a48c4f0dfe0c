use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};

use crate::error::DbdeskError;
use crate::result::{CellValue, ColumnMeta};

/// Map a declared SQLite column type to an Arrow DataType, following the
/// engine's affinity rules. Unknown and empty types map to Utf8.
pub fn sql_type_to_arrow(type_name: &str) -> DataType {
    let normalized = type_name.trim().to_uppercase();

    if normalized.contains("BOOL") {
        DataType::Boolean
    } else if normalized.contains("INT") {
        DataType::Int64
    } else if normalized.contains("CHAR") || normalized.contains("CLOB") || normalized.contains("TEXT") {
        DataType::Utf8
    } else if normalized.contains("REAL") || normalized.contains("FLOA") || normalized.contains("DOUB") {
        DataType::Float64
    } else if normalized.starts_with("NUMERIC") || normalized.starts_with("DECIMAL") {
        // NUMERIC affinity stores integers when it can; try that first.
        DataType::Int64
    } else {
        DataType::Utf8
    }
}

/// Declared SQLite type for a column inferred by the Arrow CSV reader.
pub fn arrow_to_sql_type(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::Boolean => "BOOLEAN",
        t if t.is_integer() => "INTEGER",
        t if t.is_floating() => "REAL",
        _ => "TEXT",
    }
}

/// Build an Arrow RecordBatch from one chunk of engine rows.
///
/// Each column is typed from its declared SQL type. A column whose values do
/// not fit that type falls back to Utf8 for this chunk; NUMERIC columns try
/// Float64 before giving up.
pub fn build_record_batch(
    columns: &[ColumnMeta],
    rows: &[Vec<CellValue>],
) -> Result<RecordBatch, DbdeskError> {
    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());

    for (col_idx, col_meta) in columns.iter().enumerate() {
        let values: Vec<&CellValue> = rows.iter().map(|row| &row[col_idx]).collect();
        let target_type = sql_type_to_arrow(&col_meta.type_name);

        let (final_type, array) = build_typed_array(&target_type, &values)
            .or_else(|| {
                (target_type == DataType::Int64)
                    .then(|| build_typed_array(&DataType::Float64, &values))
                    .flatten()
            })
            .unwrap_or_else(|| (DataType::Utf8, text_array(&values)));

        fields.push(Field::new(&col_meta.name, final_type, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, arrays).map_err(|e| DbdeskError::Format {
        message: format!("failed to build record batch: {e}"),
    })
}

/// Attempt to build a typed Arrow array from cell values.
/// Returns None if any non-null value does not fit (triggering column-level fallback).
fn build_typed_array(target_type: &DataType, values: &[&CellValue]) -> Option<(DataType, ArrayRef)> {
    let array: ArrayRef = match target_type {
        DataType::Int64 => {
            let parsed: Option<Vec<Option<i64>>> = values
                .iter()
                .map(|v| match v {
                    CellValue::Null => Some(None),
                    CellValue::Integer(i) => Some(Some(*i)),
                    _ => None,
                })
                .collect();
            Arc::new(Int64Array::from(parsed?))
        }
        DataType::Float64 => {
            let parsed: Option<Vec<Option<f64>>> = values
                .iter()
                .map(|v| match v {
                    CellValue::Null => Some(None),
                    CellValue::Integer(i) => Some(Some(*i as f64)),
                    CellValue::Real(f) => Some(Some(*f)),
                    _ => None,
                })
                .collect();
            Arc::new(Float64Array::from(parsed?))
        }
        DataType::Boolean => {
            let parsed: Option<Vec<Option<bool>>> = values
                .iter()
                .map(|v| match v {
                    CellValue::Null => Some(None),
                    CellValue::Integer(0) => Some(Some(false)),
                    CellValue::Integer(1) => Some(Some(true)),
                    CellValue::Text(s) => parse_bool(s).map(Some),
                    _ => None,
                })
                .collect();
            Arc::new(BooleanArray::from(parsed?))
        }
        _ => text_array(values),
    };

    Some((target_type.clone(), array))
}

fn text_array(values: &[&CellValue]) -> ArrayRef {
    let strings: Vec<Option<String>> = values
        .iter()
        .map(|v| (!v.is_null()).then(|| v.to_string()))
        .collect();
    Arc::new(StringArray::from(strings))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Convert one Arrow column into engine cells.
///
/// Integers and floats keep their numeric class, booleans become 0/1, and
/// every other type is stored as its display text.
pub fn array_to_cells(array: &ArrayRef) -> Result<Vec<CellValue>, DbdeskError> {
    let format_error = |e: arrow::error::ArrowError| DbdeskError::Format {
        message: format!("failed to convert column: {e}"),
    };
    let data_type = array.data_type();

    let cells = if *data_type == DataType::Null {
        vec![CellValue::Null; array.len()]
    } else if data_type.is_integer() {
        let ints = cast(array.as_ref(), &DataType::Int64).map_err(format_error)?;
        let ints = ints.as_primitive::<Int64Type>();
        (0..ints.len())
            .map(|i| if ints.is_null(i) { CellValue::Null } else { CellValue::Integer(ints.value(i)) })
            .collect()
    } else if data_type.is_floating() {
        let floats = cast(array.as_ref(), &DataType::Float64).map_err(format_error)?;
        let floats = floats.as_primitive::<Float64Type>();
        (0..floats.len())
            .map(|i| if floats.is_null(i) { CellValue::Null } else { CellValue::Real(floats.value(i)) })
            .collect()
    } else if *data_type == DataType::Boolean {
        let bools = array.as_boolean();
        (0..bools.len())
            .map(|i| {
                if bools.is_null(i) {
                    CellValue::Null
                } else {
                    CellValue::Integer(i64::from(bools.value(i)))
                }
            })
            .collect()
    } else if *data_type == DataType::Utf8 {
        let strings = array.as_string::<i32>();
        (0..strings.len())
            .map(|i| {
                if strings.is_null(i) {
                    CellValue::Null
                } else {
                    CellValue::Text(strings.value(i).to_string())
                }
            })
            .collect()
    } else {
        let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())
            .map_err(format_error)?;
        let nulls = array.logical_nulls();
        (0..array.len())
            .map(|i| {
                if nulls.as_ref().is_some_and(|n| n.is_null(i)) {
                    CellValue::Null
                } else {
                    CellValue::Text(formatter.value(i).to_string())
                }
            })
            .collect()
    };

    Ok(cells)
}
