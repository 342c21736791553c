use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::Path;
use tracing::info;

use crate::locator::Compression;

/// Lazy line stream over a plain or gzip-compressed log. The underlying
/// file is owned by the iterator and closed when it is dropped.
pub struct LogLines {
    inner: Lines<Box<dyn BufRead>>,
}

impl Iterator for LogLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

pub fn open_lines(path: &Path, compression: Compression) -> io::Result<LogLines> {
    info!(action = "open", component = "log_source", path = ?path, compression = ?compression, "Opening log");

    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = match compression {
        Compression::None => Box::new(BufReader::new(file)),
        // Appended logs (`gzip >>`) carry several members
        Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(file))),
    };

    Ok(LogLines {
        inner: reader.lines(),
    })
}
