use std::time::Instant;

/// Stderr diagnostics switch, threaded through long-running operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verbose(pub bool);

impl Verbose {
    pub fn enabled(self) -> bool {
        self.0
    }

    /// Emit a diagnostic line when enabled.
    pub fn emit(self, msg: &str) {
        emit(self.0, msg);
    }

    /// Emit "<label> (Nms, K rows)" for a finished step.
    pub fn finished(self, label: &str, timer: &Timer, rows: usize) {
        if self.0 {
            emit(
                true,
                &format!("{label} ({}ms, {rows} rows)", timer.elapsed_ms()),
            );
        }
    }
}

/// Emit a verbose diagnostic message to stderr.
pub fn emit(verbose: bool, msg: &str) {
    if verbose {
        eprintln!("[dbdesk] {}", msg);
    }
}

/// Wall-clock timer for verbose step durations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}
