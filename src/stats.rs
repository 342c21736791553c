use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use tracing::info;

use crate::error::{AnalyzerError, Result};
use crate::parser::LogRecord;

pub const DEFAULT_PRECISION: u32 = 3;
/// Beyond this an f64 has no more decimal digits to keep.
pub const MAX_PRECISION: u32 = 15;

/// Timing statistics for one URL. Field names are the keys the report
/// template reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlStats {
    pub url: String,
    pub count: usize,
    pub count_perc: f64,
    pub time_sum: f64,
    pub time_perc: f64,
    pub time_avg: f64,
    pub time_max: f64,
    pub time_med: f64,
}

/// URL statistics ordered by `time_sum`, largest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Report {
    entries: Vec<UrlStats>,
}

impl Report {
    pub fn entries(&self) -> &[UrlStats] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn into_entries(self) -> Vec<UrlStats> {
        self.entries
    }
}

/// Accepts a report size given as an integer, an integral float or a numeric
/// string. `null` means no limit.
pub fn coerce_limit(value: &Value) -> Result<Option<i64>> {
    let invalid = || AnalyzerError::InvalidLimit(value.to_string());
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Some(i))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
                    _ => Err(invalid()),
                }
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Two-phase per-URL aggregation. Records are pushed one at a time, keeping
/// every duration per URL; [`StatsAggregator::finish`] computes the report
/// once grand totals are known.
#[derive(Debug)]
pub struct StatsAggregator {
    limit: Option<usize>,
    precision: u32,
    index: HashMap<String, usize>,
    durations: Vec<(String, Vec<f64>)>,
    total_count: usize,
    total_time: f64,
}

impl StatsAggregator {
    pub fn new(limit: Option<i64>) -> Result<Self> {
        let limit = match limit {
            Some(n) if n < 0 => return Err(AnalyzerError::InvalidLimit(n.to_string())),
            Some(n) => Some(usize::try_from(n).map_err(|_| AnalyzerError::InvalidLimit(n.to_string()))?),
            None => None,
        };

        Ok(Self {
            limit,
            precision: DEFAULT_PRECISION,
            index: HashMap::new(),
            durations: Vec::new(),
            total_count: 0,
            total_time: 0.0,
        })
    }

    /// Values above [`MAX_PRECISION`] are clamped to it.
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision.min(MAX_PRECISION);
        self
    }

    pub fn push(&mut self, url: &str, request_time: f64) {
        let slot = match self.index.get(url) {
            Some(&slot) => slot,
            None => {
                self.durations.push((url.to_string(), Vec::new()));
                self.index.insert(url.to_string(), self.durations.len() - 1);
                self.durations.len() - 1
            }
        };
        self.durations[slot].1.push(request_time);
        self.total_count += 1;
        self.total_time += request_time;
    }

    pub fn record(&mut self, record: &LogRecord) {
        self.push(&record.url, record.request_time);
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn finish(self) -> Report {
        let start_time = Instant::now();
        let precision = self.precision;
        let total_count = self.total_count;
        let total_time = self.total_time;
        let distinct_urls = self.durations.len();

        let mut ranked: Vec<(f64, UrlStats)> = self
            .durations
            .into_iter()
            .map(|(url, mut times)| {
                times.sort_by(f64::total_cmp);
                let count = times.len();
                let time_sum: f64 = times.iter().sum();
                let time_max = times.last().copied().unwrap_or(0.0);
                let time_perc = if total_time > 0.0 {
                    time_sum / total_time * 100.0
                } else {
                    0.0
                };

                let stats = UrlStats {
                    count,
                    count_perc: round_to(count as f64 / total_count as f64 * 100.0, precision),
                    time_sum: round_to(time_sum, precision),
                    time_perc: round_to(time_perc, precision),
                    time_avg: round_to(time_sum / count as f64, precision),
                    time_max: round_to(time_max, precision),
                    time_med: round_to(median(&times), precision),
                    url,
                };
                (time_sum, stats)
            })
            .collect();

        // Stable: equal sums keep first-seen order.
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        if let Some(limit) = self.limit {
            ranked.truncate(limit);
        }

        let entries: Vec<UrlStats> = ranked.into_iter().map(|(_, stats)| stats).collect();
        info!(
            action = "complete",
            component = "stats_aggregator",
            records = total_count,
            distinct_urls = distinct_urls,
            reported_urls = entries.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Aggregated URL statistics"
        );

        Report { entries }
    }
}

pub fn aggregate<I>(records: I, limit: Option<i64>) -> Result<Report>
where
    I: IntoIterator<Item = LogRecord>,
{
    let mut aggregator = StatsAggregator::new(limit)?;
    for record in records {
        aggregator.record(&record);
    }
    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> StatsAggregator {
        let mut agg = StatsAggregator::new(None).unwrap();
        for (url, time) in [("A", 0.5), ("A", 1.5), ("A", 0.1), ("B", 2.1), ("C", 0.0)] {
            agg.push(url, time);
        }
        agg
    }

    fn sample_with_limit(limit: i64) -> Report {
        let mut agg = StatsAggregator::new(Some(limit)).unwrap();
        for (url, time) in [("A", 0.5), ("A", 1.5), ("A", 0.1), ("B", 2.1), ("C", 0.0)] {
            agg.push(url, time);
        }
        agg.finish()
    }

    #[test]
    fn test_aggregates_per_url() {
        let report = sample().finish();
        assert_eq!(report.len(), 3);

        let a = report.entries().iter().find(|s| s.url == "A").unwrap();
        assert_eq!(a.count, 3);
        assert_eq!(a.time_sum, 2.1);
        assert_eq!(a.count_perc, 60.0);
        assert_eq!(a.time_perc, 50.0);
        assert_eq!(a.time_max, 1.5);
        assert_eq!(a.time_med, 0.5);
        assert_eq!(a.time_avg, 0.7);
    }

    #[test]
    fn test_orders_by_time_sum_with_stable_ties() {
        let report = sample().finish();
        let urls: Vec<&str> = report.entries().iter().map(|s| s.url.as_str()).collect();
        // A and B both sum to 2.1; A was seen first.
        assert_eq!(urls, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_limit_truncates() {
        let report = sample_with_limit(2);
        let urls: Vec<&str> = report.entries().iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["A", "B"]);

        assert!(sample_with_limit(0).is_empty());
        assert_eq!(sample_with_limit(50).len(), 3);
    }

    #[test]
    fn test_negative_limit_rejected() {
        assert!(matches!(
            StatsAggregator::new(Some(-1)),
            Err(AnalyzerError::InvalidLimit(_))
        ));
    }

    #[test]
    fn test_empty_input_yields_empty_report() {
        let report = aggregate(Vec::<LogRecord>::new(), Some(10)).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.to_json().unwrap(), "[]");
    }

    #[test]
    fn test_counts_sum_to_records() {
        let agg = sample();
        let fed = agg.total_count();
        let report = agg.finish();
        let counted: usize = report.entries().iter().map(|s| s.count).sum();
        assert_eq!(counted, fed);
        assert_eq!(counted, 5);
    }

    #[test]
    fn test_even_count_median() {
        let mut agg = StatsAggregator::new(None).unwrap();
        for time in [4.0, 1.0, 3.0, 2.0] {
            agg.push("/x", time);
        }
        let report = agg.finish();
        assert_eq!(report.entries()[0].time_med, 2.5);
    }

    #[test]
    fn test_rounding_precision() {
        let mut agg = StatsAggregator::new(None).unwrap().with_precision(1);
        agg.push("/a", 0.123);
        agg.push("/b", 0.246);
        let report = agg.finish();
        assert_eq!(report.entries()[0].time_sum, 0.2);
        assert_eq!(report.entries()[0].time_perc, 66.7);
        assert_eq!(report.entries()[1].count_perc, 50.0);
    }

    #[test]
    fn test_oversized_precision_stays_finite() {
        let mut agg = StatsAggregator::new(None).unwrap().with_precision(400);
        agg.push("/a", 0.25);
        agg.push("/a", 0.5);
        let report = agg.finish();

        let entry = &report.entries()[0];
        assert_eq!(entry.time_sum, 0.75);
        assert_eq!(entry.count_perc, 100.0);
        assert!(!report.to_json().unwrap().contains("null"));

        let clamped = StatsAggregator::new(None).unwrap().with_precision(u32::MAX);
        assert_eq!(clamped.precision, MAX_PRECISION);
    }

    #[test]
    fn test_zero_total_time() {
        let mut agg = StatsAggregator::new(None).unwrap();
        agg.push("/a", 0.0);
        let report = agg.finish();
        assert_eq!(report.entries()[0].time_perc, 0.0);
        assert_eq!(report.entries()[0].count_perc, 100.0);
    }

    #[test]
    fn test_json_keys() {
        let mut agg = StatsAggregator::new(None).unwrap();
        agg.push("/a", 1.0);
        let value = serde_json::to_value(agg.finish()).unwrap();
        let entry = value.as_array().unwrap()[0].as_object().unwrap();

        let mut keys: Vec<&str> = entry.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["count", "count_perc", "time_avg", "time_max", "time_med", "time_perc", "time_sum", "url"]
        );
    }

    #[test]
    fn test_coerce_limit() {
        assert_eq!(coerce_limit(&json!(null)).unwrap(), None);
        assert_eq!(coerce_limit(&json!(10)).unwrap(), Some(10));
        assert_eq!(coerce_limit(&json!(10.0)).unwrap(), Some(10));
        assert_eq!(coerce_limit(&json!(" 25 ")).unwrap(), Some(25));
        assert_eq!(coerce_limit(&json!(-3)).unwrap(), Some(-3));
        assert!(coerce_limit(&json!(2.5)).is_err());
        assert!(coerce_limit(&json!("ten")).is_err());
        assert!(coerce_limit(&json!([1])).is_err());
    }
}
