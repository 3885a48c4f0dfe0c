use std::path::{Path, PathBuf};

use crate::error::DbdeskError;

/// File formats the transfer engine reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFormat {
    /// Comma-separated values, streamed in chunks.
    Delimited,
    /// JSON array of records.
    Structured,
    /// XLSX workbook, export only.
    Spreadsheet,
}

impl TransferFormat {
    pub fn label(self) -> &'static str {
        match self {
            TransferFormat::Delimited => "CSV",
            TransferFormat::Structured => "JSON",
            TransferFormat::Spreadsheet => "XLSX",
        }
    }
}

/// Detect the transfer format from a file path extension.
/// Returns the format and the (possibly normalized) path.
///
/// - `.csv` → Delimited
/// - `.json` → Structured
/// - `.xlsx` → Spreadsheet
/// - No extension → appends `.csv`, returns Delimited
/// - Unrecognized → error with supported format list
pub fn detect_format(path: &Path) -> Result<(TransferFormat, PathBuf), DbdeskError> {
    let ext = match path.extension() {
        Some(e) => e.to_ascii_lowercase(),
        None => {
            let mut p = path.to_path_buf();
            p.set_extension("csv");
            return Ok((TransferFormat::Delimited, p));
        }
    };

    let format = match ext.to_str().unwrap_or("") {
        "csv" => TransferFormat::Delimited,
        "json" => TransferFormat::Structured,
        "xlsx" => TransferFormat::Spreadsheet,
        other => {
            return Err(DbdeskError::Format {
                message: format!(
                    "unsupported file format \".{other}\"; supported: .csv, .json, .xlsx"
                ),
            });
        }
    };

    Ok((format, path.to_path_buf()))
}

/// Like [`detect_format`], restricted to formats that can be imported.
pub fn detect_import_format(path: &Path) -> Result<TransferFormat, DbdeskError> {
    match detect_format(path)? {
        (TransferFormat::Spreadsheet, _) => Err(DbdeskError::Format {
            message: "XLSX files can be exported but not imported; use .csv or .json".to_string(),
        }),
        _ if path.extension().is_none() => Err(DbdeskError::Format {
            message: format!(
                "cannot import {}: no file extension (expected .csv or .json)",
                path.display()
            ),
        }),
        (format, _) => Ok(format),
    }
}
