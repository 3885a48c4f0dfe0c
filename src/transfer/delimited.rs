//! Streamed CSV import and export through the Arrow CSV reader and writer.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use arrow::csv::reader::{Format, ReaderBuilder};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rusqlite::Connection;

use crate::error::DbdeskError;
use crate::format_columnar::{array_to_cells, arrow_to_sql_type, build_record_batch};
use crate::result::{CellValue, ColumnMeta, ResultSet};
use crate::transfer::{
    Direction, TransferReport, derive_table_name, display_name, insert_rows, replace_table,
    select_all,
};
use crate::verbose::{Timer, Verbose};

/// Import a CSV file into the table named after it.
///
/// The schema is inferred from the first `chunk_size` records. The first
/// chunk replaces any existing table; later chunks append. Each chunk commits
/// on its own, so a failure leaves earlier chunks in place and reports how
/// many were committed.
pub fn import(
    file_path: &Path,
    conn: &Connection,
    chunk_size: usize,
    verbose: Verbose,
) -> Result<TransferReport, DbdeskError> {
    let table = derive_table_name(file_path)?;
    let file_label = display_name(file_path);
    let import_error = |message: String, chunks_committed: usize| DbdeskError::Import {
        file: file_label.clone(),
        message,
        chunks_committed,
    };

    let timer = Timer::start();
    let format = Format::default().with_header(true);
    let sample = File::open(file_path).map_err(|e| import_error(e.to_string(), 0))?;
    let (schema, _) = format
        .infer_schema(BufReader::new(sample), Some(chunk_size))
        .map_err(|e| import_error(e.to_string(), 0))?;
    if schema.fields().is_empty() {
        return Err(import_error("no header row found".to_string(), 0));
    }
    let schema = widen_null_columns(&schema);

    let columns: Vec<ColumnMeta> = schema
        .fields()
        .iter()
        .map(|f| ColumnMeta::new(f.name(), arrow_to_sql_type(f.data_type())))
        .collect();
    verbose.emit(&format!(
        "importing {file_label} into {table} ({} columns, chunks of {chunk_size})",
        columns.len()
    ));

    let source = File::open(file_path).map_err(|e| import_error(e.to_string(), 0))?;
    let reader = ReaderBuilder::new(Arc::new(schema))
        .with_format(format)
        .with_batch_size(chunk_size)
        .build(BufReader::new(source))
        .map_err(|e| import_error(e.to_string(), 0))?;

    let mut chunks = 0;
    let mut rows = 0;
    for batch in reader {
        let batch = batch.map_err(|e| import_error(e.to_string(), chunks))?;
        let written = commit_chunk(conn, &table, &columns, &batch, chunks == 0)
            .map_err(|e| import_error(e.to_string(), chunks))?;
        chunks += 1;
        rows += written;
        verbose.emit(&format!("chunk {chunks} committed ({written} rows)"));
    }

    if chunks == 0 {
        // Header only: the table still exists, empty.
        replace_table(conn, &table, &columns).map_err(|e| import_error(e.to_string(), 0))?;
    }
    verbose.finished("import complete", &timer, rows);

    Ok(TransferReport {
        direction: Direction::Import,
        table,
        file: file_label,
        rows,
        chunks,
        truncated: false,
    })
}

/// A column that is empty throughout the sample infers as `Null`, which
/// would discard any values in later chunks. Read such columns as text.
fn widen_null_columns(schema: &Schema) -> Schema {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| {
            if *f.data_type() == DataType::Null {
                f.as_ref().clone().with_data_type(DataType::Utf8).with_nullable(true)
            } else {
                f.as_ref().clone()
            }
        })
        .collect();
    Schema::new(fields)
}

fn commit_chunk(
    conn: &Connection,
    table: &str,
    columns: &[ColumnMeta],
    batch: &RecordBatch,
    first: bool,
) -> Result<usize, DbdeskError> {
    let by_column = batch
        .columns()
        .iter()
        .map(array_to_cells)
        .collect::<Result<Vec<_>, _>>()?;
    let rows = (0..batch.num_rows()).map(|row_idx| {
        by_column
            .iter()
            .map(|cells| cells[row_idx].clone())
            .collect::<Vec<CellValue>>()
    });

    let tx = conn.unchecked_transaction().map_err(DbdeskError::query)?;
    if first {
        replace_table(&tx, table, columns).map_err(DbdeskError::query)?;
    }
    let written = insert_rows(&tx, table, columns.len(), rows).map_err(DbdeskError::query)?;
    tx.commit().map_err(DbdeskError::query)?;
    Ok(written)
}

/// Stream a table to CSV, `chunk_size` rows at a time.
///
/// The header is written with the first chunk only. An empty table still
/// produces a header line.
pub fn export(
    table: &str,
    file_path: &Path,
    conn: &Connection,
    chunk_size: usize,
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
    let width = columns.len();

    let file = File::create(file_path).map_err(|e| export_error(e.to_string()))?;
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .build(BufWriter::new(file));

    let mut chunks = 0;
    let mut rows_written = 0;
    let mut buffer: Vec<Vec<CellValue>> = Vec::with_capacity(chunk_size);
    let mut rows = stmt.query([]).map_err(|e| export_error(e.to_string()))?;

    loop {
        let next = rows.next().map_err(|e| export_error(e.to_string()))?;
        if let Some(row) = next {
            buffer.push(ResultSet::read_row(row, width).map_err(|e| export_error(e.to_string()))?);
            if buffer.len() < chunk_size {
                continue;
            }
        } else if buffer.is_empty() && chunks > 0 {
            break;
        }

        let batch = build_record_batch(&columns, &buffer)?;
        writer
            .write(&batch)
            .map_err(|e| export_error(e.to_string()))?;
        chunks += 1;
        rows_written += buffer.len();
        verbose.emit(&format!("chunk {chunks} written ({} rows)", buffer.len()));
        buffer.clear();

        if next.is_none() {
            break;
        }
    }

    writer
        .into_inner()
        .flush()
        .map_err(|e| export_error(e.to_string()))?;
    verbose.finished("export complete", &timer, rows_written);

    Ok(TransferReport {
        direction: Direction::Export,
        table: table.to_string(),
        file: file_label,
        rows: rows_written,
        chunks,
        truncated: false,
    })
}
