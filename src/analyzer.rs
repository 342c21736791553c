use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::locator;
use crate::parser::{build_pattern, LogParser};
use crate::report;
use crate::source;
use crate::stats::StatsAggregator;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No log matching the naming convention was found
    NoLog,
    /// A report for the latest log's date already exists
    AlreadyReported(PathBuf),
    Written { path: PathBuf, urls: usize, records: usize },
}

pub fn analyze_latest_log(config: &Config, force: bool) -> Result<Outcome> {
    let total_start_time = Instant::now();
    info!(action = "start", component = "analyzer", "Starting log analysis");

    let pattern = build_pattern(&config.field_patterns)?;
    let mut aggregator =
        StatsAggregator::new(config.report_size)?.with_precision(config.round_precision);
    let template = report::load_template(config.report_template.as_deref())?;

    let Some(candidate) = locator::locate_in_dir(&config.log_dir)
        .with_context(|| format!("Failed to scan log directory {:?}", config.log_dir))?
    else {
        return Ok(Outcome::NoLog);
    };

    let report_path = report::report_path(&config.report_dir, candidate.date);
    if report_path.exists() {
        if !force {
            info!(action = "skip", component = "analyzer", path = ?report_path, "Report already exists");
            return Ok(Outcome::AlreadyReported(report_path));
        }
        warn!(action = "overwrite", component = "analyzer", path = ?report_path, "Rebuilding existing report");
    }

    let log_path = candidate.path_in(&config.log_dir);
    let lines = source::open_lines(&log_path, candidate.compression)
        .with_context(|| format!("Failed to open log {:?}", log_path))?;

    let parse_start_time = Instant::now();
    let parser = LogParser::new(lines, &pattern, config.parse_threshold)?;
    for record in parser {
        aggregator.record(&record?);
    }
    let records = aggregator.total_count();
    info!(
        action = "parsed",
        component = "analyzer",
        records = records,
        duration_ms = parse_start_time.elapsed().as_millis(),
        "Log parsed"
    );

    let stats = aggregator.finish();
    let rendered = report::render(&template, &stats)?;
    report::write_report(&report_path, &rendered)?;

    info!(
        action = "complete",
        component = "analyzer",
        duration_ms = total_start_time.elapsed().as_millis(),
        "Analysis completed successfully"
    );

    Ok(Outcome::Written {
        path: report_path,
        urls: stats.len(),
        records,
    })
}

pub fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::NoLog => println!("No log to process"),
        Outcome::AlreadyReported(path) => println!("Report already exists: {}", path.display()),
        Outcome::Written { path, urls, records } => {
            println!("Wrote {} ({} URLs from {} requests)", path.display(), urls, records)
        }
    }
}
