use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Failed to read log: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "Parse quality too low: {matched} of {total} lines matched (threshold {threshold})"
    )]
    LowParseQuality {
        matched: usize,
        total: usize,
        threshold: f64,
    },

    #[error("Invalid report size limit: {0}")]
    InvalidLimit(String),

    #[error("Parse threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Invalid line pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid report template: {0}")]
    Template(String),

    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
