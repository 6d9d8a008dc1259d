use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::query::{QueryMode, QueryPlan};
use crate::report::Report;
use crate::stats::Aggregation;

/// Default BIND syslog destination.
pub const DEFAULT_LOG_PATH: &str = "/var/log/syslog";

/// Which part of the log one scan covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Only analyze the last N lines of the log.
    pub last_lines: Option<usize>,
}

/// Scan the log at `path` once and report on `mode`.
///
/// Failing to open or read the file is the only error; odd lines are absorbed.
pub fn analyze_log_file(path: &Path, mode: &QueryMode, options: &ScanOptions) -> Result<Report> {
    info!(
        action = "open",
        component = "log_file",
        file_path = ?path,
        mode = mode.label(),
        "Opening DNS log"
    );

    let file = File::open(path).with_context(|| format!("Failed to open log file {:?}", path))?;
    analyze_reader(BufReader::new(file), mode, options)
        .with_context(|| format!("Failed to analyze log file {:?}", path))
}

/// Fold every line of `reader` (or only its last lines) through the plan for `mode`.
pub fn analyze_reader<R: BufRead>(
    mut reader: R,
    mode: &QueryMode,
    options: &ScanOptions,
) -> Result<Report> {
    let start_time = Instant::now();
    let plan = mode.plan()?;
    let mut aggregation = plan.new_aggregation();

    info!(
        action = "start",
        component = "log_scan",
        mode = mode.label(),
        subject = %mode.subject(),
        last_lines = ?options.last_lines,
        "Starting log scan"
    );

    let mut buffer = Vec::new();
    let mut window: VecDeque<Vec<u8>> = VecDeque::new();
    let mut lines_read: u64 = 0;
    loop {
        buffer.clear();
        let read = reader
            .read_until(b'\n', &mut buffer)
            .context("Failed to read log line")?;
        if read == 0 {
            break;
        }
        lines_read += 1;

        match options.last_lines {
            Some(limit) => {
                window.push_back(buffer.clone());
                while window.len() > limit {
                    window.pop_front();
                }
            }
            None => observe_bytes(&plan, &buffer, &mut aggregation),
        }
    }

    if options.last_lines.is_some() {
        debug!(
            action = "window",
            component = "log_scan",
            lines_read,
            lines_kept = window.len(),
            "Analyzing trailing lines"
        );
        for line in &window {
            observe_bytes(&plan, line, &mut aggregation);
        }
    }

    info!(
        action = "scan",
        component = "log_scan",
        lines_read,
        matched = aggregation.matched,
        malformed = aggregation.malformed,
        duration_ms = start_time.elapsed().as_millis(),
        "Log scan completed"
    );

    Ok(Report::build(mode, &plan, aggregation, start_time))
}

fn observe_bytes(plan: &QueryPlan, bytes: &[u8], aggregation: &mut Aggregation) {
    // Syslog may carry stray binary; decode lossily rather than abort
    let line = String::from_utf8_lossy(bytes);
    plan.observe(&line, aggregation);
}
