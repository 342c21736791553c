//! Line parsing for the `ui_short` nginx access log format:
//!
//! ```text
//! $remote_addr  $remote_user $http_x_real_ip [$time_local] "$request"
//! $status $body_bytes_sent "$http_referer" "$http_user_agent"
//! "$http_x_forwarded_for" "$http_X_REQUEST_ID" "$http_X_RB_USER" $request_time
//! ```
//!
//! The pattern is assembled from one sub-pattern per column. Any column can be
//! overridden through [`FieldOverrides`] without touching the others.

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::io;
use tracing::{debug, info};

use crate::error::{AnalyzerError, Result};

pub const DEFAULT_THRESHOLD: f64 = 0.6;

const DEFAULT_REMOTE_ADDR: &str = r"\S+";
const DEFAULT_REMOTE_USER: &str = r"\S+";
const DEFAULT_REAL_IP: &str = r"\S+";
const DEFAULT_TIME_LOCAL: &str = r"[0-9]{2}/[a-z]{3}/[0-9]{4}:[0-9]{2}:[0-9]{2}:[0-9]{2} [+-][0-9]{4}";
const DEFAULT_REQUEST: &str = r#"(?P<method>[a-z]+) (?P<url>\S+) (?P<protocol>[^\s"]+)"#;
const DEFAULT_STATUS: &str = r"[0-9]{3}";
const DEFAULT_BODY_BYTES_SENT: &str = r"[0-9]+";
const DEFAULT_QUOTED: &str = r#"[^"]*"#;
const DEFAULT_REQUEST_TIME: &str = r"[0-9]+(?:\.[0-9]+)?";

/// Per-column replacements for the default sub-patterns. A sub-pattern is
/// wrapped in a capture group named after its column, so it must not
/// define that group itself. An overridden `request` must still capture `url`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldOverrides {
    pub remote_addr: Option<String>,
    pub remote_user: Option<String>,
    pub http_x_real_ip: Option<String>,
    pub time_local: Option<String>,
    pub request: Option<String>,
    pub status: Option<String>,
    pub body_bytes_sent: Option<String>,
    pub http_referer: Option<String>,
    pub http_user_agent: Option<String>,
    pub http_x_forwarded_for: Option<String>,
    pub http_x_request_id: Option<String>,
    pub http_x_rb_user: Option<String>,
    pub request_time: Option<String>,
}

/// One successfully matched log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub remote_addr: String,
    pub remote_user: String,
    pub http_x_real_ip: String,
    pub time_local: String,
    pub request: String,
    pub url: String,
    pub status: u16,
    pub body_bytes_sent: u64,
    pub http_referer: String,
    pub http_user_agent: String,
    pub http_x_forwarded_for: String,
    pub http_x_request_id: String,
    pub http_x_rb_user: String,
    pub request_time: f64,
}

/// Compiled, case-insensitive line pattern.
#[derive(Debug, Clone)]
pub struct LinePattern {
    regex: Regex,
}

fn field(name: &str, custom: &Option<String>, default: &str) -> String {
    format!("(?P<{}>{})", name, custom.as_deref().unwrap_or(default))
}

pub fn build_pattern(overrides: &FieldOverrides) -> Result<LinePattern> {
    let o = overrides;
    let source = format!(
        r#"^{}\s+{}\s+{}\s+\[{}\]\s+"{}"\s+{}\s+{}\s+"{}"\s+"{}"\s+"{}"\s+"{}"\s+"{}"\s+{}$"#,
        field("remote_addr", &o.remote_addr, DEFAULT_REMOTE_ADDR),
        field("remote_user", &o.remote_user, DEFAULT_REMOTE_USER),
        field("http_x_real_ip", &o.http_x_real_ip, DEFAULT_REAL_IP),
        field("time_local", &o.time_local, DEFAULT_TIME_LOCAL),
        field("request", &o.request, DEFAULT_REQUEST),
        field("status", &o.status, DEFAULT_STATUS),
        field("body_bytes_sent", &o.body_bytes_sent, DEFAULT_BODY_BYTES_SENT),
        field("http_referer", &o.http_referer, DEFAULT_QUOTED),
        field("http_user_agent", &o.http_user_agent, DEFAULT_QUOTED),
        field("http_x_forwarded_for", &o.http_x_forwarded_for, DEFAULT_QUOTED),
        field("http_x_request_id", &o.http_x_request_id, DEFAULT_QUOTED),
        field("http_x_rb_user", &o.http_x_rb_user, DEFAULT_QUOTED),
        field("request_time", &o.request_time, DEFAULT_REQUEST_TIME),
    );

    let regex = RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|e| AnalyzerError::InvalidPattern(e.to_string()))?;

    if !regex.capture_names().flatten().any(|name| name == "url") {
        return Err(AnalyzerError::InvalidPattern(
            "request pattern must capture a `url` group".to_string(),
        ));
    }

    debug!(action = "compiled", component = "line_pattern", pattern = %source, "Line pattern compiled");
    Ok(LinePattern { regex })
}

impl LinePattern {
    pub fn standard() -> Result<Self> {
        build_pattern(&FieldOverrides::default())
    }

    /// Matches a single line. Lines whose numeric columns do not parse are
    /// treated as non-matching.
    pub fn parse_line(&self, line: &str) -> Option<LogRecord> {
        let caps = self.regex.captures(line)?;
        let text = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

        Some(LogRecord {
            remote_addr: text("remote_addr")?,
            remote_user: text("remote_user")?,
            http_x_real_ip: text("http_x_real_ip")?,
            time_local: text("time_local")?,
            request: text("request")?,
            url: text("url")?,
            status: caps.name("status")?.as_str().parse().ok()?,
            body_bytes_sent: caps.name("body_bytes_sent")?.as_str().parse().ok()?,
            http_referer: text("http_referer")?,
            http_user_agent: text("http_user_agent")?,
            http_x_forwarded_for: text("http_x_forwarded_for")?,
            http_x_request_id: text("http_x_request_id")?,
            http_x_rb_user: text("http_x_rb_user")?,
            request_time: caps.name("request_time")?.as_str().parse().ok()?,
        })
    }
}

/// Streams [`LogRecord`]s out of a line source, one per matching line.
///
/// Non-matching lines are dropped and counted. Once the source is exhausted
/// the matched ratio is checked against the threshold; when it falls short
/// the final item is `Err(AnalyzerError::LowParseQuality)`. Callers that stop
/// early never reach that check. An empty source passes.
///
/// A read error from the source is yielded once and ends the stream.
pub struct LogParser<'p, I> {
    lines: I,
    pattern: &'p LinePattern,
    threshold: f64,
    total: usize,
    matched: usize,
    finished: bool,
}

impl<'p, I> LogParser<'p, I>
where
    I: Iterator<Item = io::Result<String>>,
{
    pub fn new(lines: I, pattern: &'p LinePattern, threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AnalyzerError::InvalidThreshold(threshold));
        }
        Ok(Self {
            lines,
            pattern,
            threshold,
            total: 0,
            matched: 0,
            finished: false,
        })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn matched(&self) -> usize {
        self.matched
    }

    fn check_quality(&self) -> Result<()> {
        if self.total == 0 {
            info!(action = "complete", component = "log_parser", "Log was empty");
            return Ok(());
        }

        let ratio = self.matched as f64 / self.total as f64;
        info!(
            action = "complete",
            component = "log_parser",
            matched = self.matched,
            total = self.total,
            ratio = ratio,
            "Finished parsing log"
        );

        if ratio < self.threshold {
            return Err(AnalyzerError::LowParseQuality {
                matched: self.matched,
                total: self.total,
                threshold: self.threshold,
            });
        }
        Ok(())
    }
}

impl<I> Iterator for LogParser<'_, I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.lines.next() {
                Some(Ok(line)) => {
                    self.total += 1;
                    match self.pattern.parse_line(&line) {
                        Some(record) => {
                            self.matched += 1;
                            return Some(Ok(record));
                        }
                        None => {
                            debug!(action = "skip", component = "log_parser", line_number = self.total, "Unparsed line");
                        }
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.finished = true;
                    return self.check_quality().err().map(Err);
                }
            }
        }
    }
}

/// Convenience wrapper over [`LogParser::new`].
pub fn parse<I>(lines: I, pattern: &LinePattern, threshold: f64) -> Result<LogParser<'_, I::IntoIter>>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    LogParser::new(lines.into_iter(), pattern, threshold)
}
