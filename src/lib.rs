pub mod analyzer;
pub mod args;
pub mod config;
pub mod error;
pub mod locator;
pub mod parser;
pub mod report;
pub mod source;
pub mod stats;
pub mod utils;

pub use analyzer::{analyze_latest_log, print_outcome, Outcome};
pub use args::Args;
pub use config::Config;
pub use error::AnalyzerError;
pub use locator::{locate, CandidateFile, Compression};
pub use parser::{build_pattern, parse, FieldOverrides, LinePattern, LogParser, LogRecord};
pub use stats::{aggregate, Report, StatsAggregator, UrlStats};
pub use utils::{setup_logging, validate_args};
