use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "log-analyzer",
    about = "Build a URL latency report from the latest nginx access log",
    version,
    long_about = None
)]
pub struct Args {
    /// Path to a JSON config file overriding the defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Rebuild the report even if one already exists for the log date
    #[arg(short, long)]
    pub force: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
