//! Utility functions for the CLI.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

/// Shown when the literal context and position bits exceed their joint limit.
pub const LC_LP_MESSAGE: &str =
    "The sum of lc (Literal Context Bits) and lp (Literal Position Bits) must be at most 4.";

/// Text compressed when neither a file nor `--text` is given.
pub const DEFAULT_TEXT: &str = "Hello, LZMA! This is a compression test.";

/// Create a progress bar with standard styling.
pub fn create_progress_bar(len: u64, enable: bool) -> ProgressBar {
    if !enable {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░ "),
    );
    pb
}

/// Read the bytes to compress: a file, stdin for "-", the given text, or
/// the default sample text.
pub fn read_input(file: Option<&Path>, text: Option<&str>) -> io::Result<Vec<u8>> {
    match (file, text) {
        (Some(path), _) if path == Path::new("-") => {
            let mut data = Vec::new();
            io::stdin().lock().read_to_end(&mut data)?;
            Ok(data)
        }
        (Some(path), _) => std::fs::read(path),
        (None, Some(text)) => Ok(text.as_bytes().to_vec()),
        (None, None) => Ok(DEFAULT_TEXT.as_bytes().to_vec()),
    }
}

/// Format a byte count with a binary unit.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Seconds with four decimals, as the summary prints them.
pub fn format_seconds(elapsed: Duration) -> String {
    format!("{:.4}", elapsed.as_secs_f64())
}
