use clap::Parser;
use std::process::ExitCode;
use tracing::error;

use log_analyzer::error::AnalyzerError;
use log_analyzer::{analyze_latest_log, print_outcome, setup_logging, validate_args, Args, Config};

const EXIT_SETUP_FAILED: u8 = 1;
const EXIT_LOW_PARSE_QUALITY: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match validate_args(&args).and_then(|_| Config::load(args.config.as_deref())) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("App init failed: {:#}", e);
            return ExitCode::from(EXIT_SETUP_FAILED);
        }
    };

    if let Err(e) = setup_logging(args.verbose, config.analyzer_log.as_deref()) {
        eprintln!("App init failed: {:#}", e);
        return ExitCode::from(EXIT_SETUP_FAILED);
    }

    match analyze_latest_log(&config, args.force) {
        Ok(outcome) => {
            print_outcome(&outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Analysis failed");
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<AnalyzerError>() {
                Some(AnalyzerError::LowParseQuality { .. }) => ExitCode::from(EXIT_LOW_PARSE_QUALITY),
                _ => ExitCode::from(EXIT_SETUP_FAILED),
            }
        }
    }
}
