use chrono::NaiveDate;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::error::Result;

pub const LOG_PREFIX: &str = "nginx-access-ui.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

/// A log file recognised by name, with the date embedded in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub name: String,
    pub date: NaiveDate,
    pub compression: Compression,
}

impl CandidateFile {
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.name)
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let pattern = format!(r"^{}-([0-9]{{8}})(\.gz)?$", regex::escape(LOG_PREFIX));
        Regex::new(&pattern).expect("log name pattern is valid")
    })
}

/// Recognises a single file name. Names that match the shape but carry an
/// impossible date are logged and rejected.
pub fn parse_candidate(name: &str) -> Option<CandidateFile> {
    let captures = name_pattern().captures(name)?;
    let token = captures.get(1)?.as_str();

    let date = match NaiveDate::parse_from_str(token, "%Y%m%d") {
        Ok(date) => date,
        Err(e) => {
            warn!(action = "skip", component = "log_locator", file = name, error = %e, "Invalid log date");
            return None;
        }
    };

    let compression = if captures.get(2).is_some() {
        Compression::Gzip
    } else {
        Compression::None
    };

    Some(CandidateFile {
        name: name.to_string(),
        date,
        compression,
    })
}

/// Picks the most recent log by calendar date. On equal dates the first
/// candidate seen wins. `None` means there is nothing to process.
pub fn locate<I, S>(filenames: I) -> Option<CandidateFile>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    filenames
        .into_iter()
        .filter_map(|name| parse_candidate(name.as_ref()))
        .fold(None, |best: Option<CandidateFile>, candidate| match best {
            Some(current) if current.date >= candidate.date => Some(current),
            _ => Some(candidate),
        })
}

/// Lists `dir` and runs [`locate`] over its file names, sorted so the
/// result does not depend on directory iteration order.
pub fn locate_in_dir(dir: &Path) -> Result<Option<CandidateFile>> {
    info!(action = "scan", component = "log_locator", dir = ?dir, "Scanning log directory");

    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        // Follows symlinks; a dangling link is skipped, not fatal
        match fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => continue,
            Err(e) => {
                debug!(action = "skip", component = "log_locator", path = ?entry.path(), error = %e, "Unreadable directory entry");
                continue;
            }
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    debug!(action = "listed", component = "log_locator", file_count = names.len(), "Directory listed");

    let found = locate(&names);
    match &found {
        Some(candidate) => info!(
            action = "found",
            component = "log_locator",
            file = %candidate.name,
            date = %candidate.date,
            "Selected latest log"
        ),
        None => info!(action = "found", component = "log_locator", "No log to process"),
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_picks_latest_by_calendar_date() {
        let files = [
            "nginx-access-ui.log-20170630",
            "nginx-access-ui.log-20170630.gz",
            "nginx-access-ui.log-20170629",
            "nginx-access-ui.log-20170531",
            "nginx-access-ui.log-20150630",
            "nginx-ui.log-20190630",
            "aaaaa",
            "",
            "nginx-access-ui.log-20190530.bzz",
            "nginx-access-ui.log-390630.bz",
            "nginx-access-ui.log-201907301111.bz",
        ];

        let found = locate(files).unwrap();
        assert_eq!(
            found,
            CandidateFile {
                name: "nginx-access-ui.log-20170630".to_string(),
                date: date(2017, 6, 30),
                compression: Compression::None,
            }
        );
    }

    #[test]
    fn test_empty_input_is_absent() {
        let files: [&str; 0] = [];
        assert_eq!(locate(files), None);
    }

    #[test]
    fn test_no_matching_names_is_absent() {
        let files = ["access.log", "nginx-access-ui.log-2017063", "nginx-access-ui.log-20170630.bz2"];
        assert_eq!(locate(files), None);
    }

    #[test]
    fn test_invalid_calendar_date_is_skipped() {
        let files = [
            "nginx-access-ui.log-20211301",
            "nginx-access-ui.log-20210230",
            "nginx-access-ui.log-20200101.gz",
        ];

        let found = locate(files).unwrap();
        assert_eq!(found.date, date(2020, 1, 1));
        assert_eq!(found.compression, Compression::Gzip);
    }

    #[test]
    fn test_only_invalid_dates_is_absent() {
        assert_eq!(locate(["nginx-access-ui.log-20211301"]), None);
    }

    #[test]
    fn test_gzip_wins_when_newer() {
        let found = locate([
            "nginx-access-ui.log-20170630",
            "nginx-access-ui.log-20170701.gz",
        ])
        .unwrap();
        assert_eq!(found.name, "nginx-access-ui.log-20170701.gz");
        assert_eq!(found.compression, Compression::Gzip);
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_in_dir_follows_symlinks() {
        let data = tempfile::tempdir().unwrap();
        let logs = tempfile::tempdir().unwrap();
        let target = data.path().join("access.log");
        fs::write(&target, "").unwrap();

        std::os::unix::fs::symlink(&target, logs.path().join("nginx-access-ui.log-20170630")).unwrap();
        std::os::unix::fs::symlink(
            data.path().join("gone"),
            logs.path().join("nginx-access-ui.log-20170701"),
        )
        .unwrap();
        fs::create_dir(logs.path().join("nginx-access-ui.log-20170702")).unwrap();
        fs::write(logs.path().join("nginx-access-ui.log-20170601"), "").unwrap();

        let found = locate_in_dir(logs.path()).unwrap().unwrap();
        assert_eq!(found.name, "nginx-access-ui.log-20170630");
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let found = locate([
            "nginx-access-ui.log-20170630.gz",
            "nginx-access-ui.log-20170630",
        ])
        .unwrap();
        assert_eq!(found.name, "nginx-access-ui.log-20170630.gz");
    }
}
