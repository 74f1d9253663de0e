//! Offline log analysis: parse the simulator's event log (§6.6) and compute
//! the delivery/delay/collision report of §6.7.
//!
//! This module never touches a live simulation — it only ever sees lines of
//! text, which is the entire contract between the two binaries (Design
//! Notes, "Analyzer is a separate process").

mod metrics;
mod parser;
mod report;

pub use metrics::{Metrics, PacketKey};
pub use parser::parse_line;
pub use report::format_report;

use std::io::BufRead;

/// Read every line of `reader`, tally it into [`Metrics`], and return the
/// accumulated totals. Unknown kinds and malformed lines are skipped, not
/// fatal (§6.6, §7).
pub fn analyze(reader: impl BufRead) -> Metrics {
    let mut metrics = Metrics::default();
    for line in reader.lines() {
        let Ok(line) = line else { continue };
        if let Some(event) = parser::parse_line(&line) {
            metrics.record(event);
        }
    }
    metrics
}

/// Open an analyzer input, transparently un-gzipping when `zip` is set.
pub fn open_input(path: Option<&str>, zip: bool) -> anyhow::Result<Box<dyn BufRead>> {
    use anyhow::Context;
    use std::io::BufReader;

    let raw: Box<dyn std::io::Read> = match path {
        Some(p) => Box::new(std::fs::File::open(p).with_context(|| format!("opening log {p}"))?),
        None => Box::new(std::io::stdin()),
    };
    if zip {
        Ok(Box::new(BufReader::new(flate2::read::GzDecoder::new(raw))))
    } else {
        Ok(Box::new(BufReader::new(raw)))
    }
}

