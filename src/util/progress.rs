use std::io::{self, Write};

const BAR_WIDTH: usize = 60;

/// Carriage-return progress bar on stderr, fed by the scan progress callback.
pub struct ProgressBar;

impl ProgressBar {
    pub fn new() -> Self {
        Self
    }

    pub fn update(&self, current: usize, total: usize) {
        if total == 0 {
            return;
        }
        let filled = (current * BAR_WIDTH / total).min(BAR_WIDTH);
        let percent = current * 100 / total;

        let mut stderr = io::stderr();
        let _ = write!(stderr, "\r[{}{}] {percent}% [{current}/{total}]", ".".repeat(filled), " ".repeat(BAR_WIDTH - filled));
        let _ = stderr.flush();
    }

    pub fn finish(&self) {
        let _ = writeln!(io::stderr());
    }
}
