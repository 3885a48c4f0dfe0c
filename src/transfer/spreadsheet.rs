//! Single-sheet XLSX export.

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use rusqlite::Connection;

use crate::error::DbdeskError;
use crate::format_columnar::sql_type_to_arrow;
use crate::result::{CellValue, ResultSet};
use crate::transfer::{Direction, TransferReport, display_name, select_all};
use crate::verbose::{Timer, Verbose};

/// Longest sheet name the format accepts.
const MAX_SHEET_NAME: usize = 31;

/// Sheet name for a table: forbidden characters replaced with `_`, cut to 31
/// characters.
pub fn sheet_name(table: &str) -> String {
    let cleaned: String = table
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .take(MAX_SHEET_NAME)
        .collect();
    let cleaned = cleaned.trim_matches('\'');
    if cleaned.is_empty() {
        "Sheet1".to_string()
    } else if cleaned.eq_ignore_ascii_case("history") {
        // Reserved by spreadsheet applications.
        format!("{cleaned}_")
    } else {
        cleaned.to_string()
    }
}

/// Export up to `row_cap` rows of `table` to one sheet with a bold header.
///
/// The report is marked truncated when the cap was reached.
pub fn export(
    table: &str,
    file_path: &Path,
    conn: &Connection,
    row_cap: usize,
    verbose: Verbose,
) -> Result<TransferReport, DbdeskError> {
    let file_label = display_name(file_path);
    let export_error = |message: String| DbdeskError::Export {
        table: table.to_string(),
        file: file_label.clone(),
        message,
    };
    let xlsx_error = |e: XlsxError| export_error(e.to_string());

    let timer = Timer::start();
    let mut stmt = select_all(conn, table, file_path, Some(row_cap))?;
    let columns = ResultSet::columns_of(&stmt);
    let boolean: Vec<bool> = columns
        .iter()
        .map(|c| sql_type_to_arrow(&c.type_name) == arrow::datatypes::DataType::Boolean)
        .collect();
    if u16::try_from(columns.len()).is_err() {
        return Err(export_error(format!("too many columns ({})", columns.len())));
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name(table)).map_err(xlsx_error)?;

    let bold = Format::new().set_bold();
    for (col, meta) in columns.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, &meta.name, &bold)
            .map_err(xlsx_error)?;
    }

    let mut written: usize = 0;
    let mut rows = stmt.query([]).map_err(|e| export_error(e.to_string()))?;
    while let Some(row) = rows.next().map_err(|e| export_error(e.to_string()))? {
        let cells = ResultSet::read_row(row, columns.len()).map_err(|e| export_error(e.to_string()))?;
        let sheet_row = (written + 1) as u32;
        for (col, cell) in cells.iter().enumerate() {
            write_cell(sheet, sheet_row, col as u16, cell, boolean[col]).map_err(xlsx_error)?;
        }
        written += 1;
    }

    workbook.save(file_path).map_err(xlsx_error)?;
    verbose.finished("export complete", &timer, written);

    Ok(TransferReport {
        direction: Direction::Export,
        table: table.to_string(),
        file: file_label,
        rows: written,
        chunks: 1,
        truncated: written >= row_cap,
    })
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    is_bool: bool,
) -> Result<(), XlsxError> {
    match cell {
        CellValue::Null => {}
        CellValue::Integer(i @ (0 | 1)) if is_bool => {
            sheet.write_boolean(row, col, *i == 1)?;
        }
        CellValue::Integer(i) => {
            sheet.write_number(row, col, *i as f64)?;
        }
        CellValue::Real(f) => {
            sheet.write_number(row, col, *f)?;
        }
        CellValue::Text(_) | CellValue::Blob(_) => {
            sheet.write_string(row, col, cell.to_string())?;
        }
    }
    Ok(())
}
