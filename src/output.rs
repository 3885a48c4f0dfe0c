use serde_json::json;

use crate::error::DbdeskError;
use crate::transfer::TransferReport;

/// Write rendered output to stdout as-is.
pub fn print_result(text: &str) {
    print!("{text}");
}

/// Report a failure on stderr as `error: <category>: <message>`.
pub fn print_error(err: &DbdeskError) {
    eprintln!("error: {err}");
}

/// Print a transfer summary to stdout as a TOON object.
pub fn print_summary(report: &TransferReport) -> Result<(), DbdeskError> {
    print!("{}", summary_toon(report)?);
    Ok(())
}

/// TOON text for a finished transfer: `rows_written`, `file`, `truncated`
/// and the report's `message`, in that order.
pub fn summary_toon(report: &TransferReport) -> Result<String, DbdeskError> {
    let summary = json!({
        "rows_written": report.rows,
        "file": report.file,
        "truncated": report.truncated,
        "message": report.message(),
    });
    toon_format::encode_default(&summary).map_err(|e| DbdeskError::Format {
        message: e.to_string(),
    })
}

/// `warning: <message>` on stderr.
pub fn print_truncation_warning(message: &str) {
    eprintln!("warning: {message}");
}

/// Human-readable byte size with one decimal: "512.0 B", "1.5 KB".
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}
