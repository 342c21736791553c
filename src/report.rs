use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{AnalyzerError, Result};
use crate::stats::Report;

pub const PLACEHOLDER: &str = "$table_json";

// Embedded so the binary works without a template on disk
const DEFAULT_TEMPLATE: &str = include_str!("../templates/report.html");

pub fn report_path(report_dir: &Path, date: NaiveDate) -> PathBuf {
    report_dir.join(format!("report-{}.html", date.format("%Y.%m.%d")))
}

pub fn load_template(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            info!(action = "load", component = "report_template", file_path = ?path, "Loading report template");
            Ok(fs::read_to_string(path)?)
        }
        None => {
            debug!(action = "load", component = "report_template", "Using embedded report template");
            Ok(DEFAULT_TEMPLATE.to_string())
        }
    }
}

/// JSON for inline `<script>` use: `<`, `>` and `&` become unicode escapes so
/// a logged URL cannot close the script element.
fn script_safe_json(report: &Report) -> Result<String> {
    Ok(report
        .to_json()?
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

/// Substitutes the JSON-encoded report for every placeholder in the template.
pub fn render(template: &str, report: &Report) -> Result<String> {
    if !template.contains(PLACEHOLDER) {
        return Err(AnalyzerError::Template(format!(
            "missing `{}` placeholder",
            PLACEHOLDER
        )));
    }
    Ok(template.replace(PLACEHOLDER, &script_safe_json(report)?))
}

/// Writes through a temporary sibling and renames it into place, so an
/// interrupted run never leaves a partial report behind.
pub fn write_report(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, contents)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    info!(action = "write", component = "report_writer", path = ?path, bytes = contents.len(), "Report written");
    Ok(())
}
