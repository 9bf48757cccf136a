//! Reading of query logs.
//!
//! A log holds one statement per line. Carriage returns are dropped so that logs written on
//! Windows read the same, and blank lines are ignored.

use std::path::Path;

use crate::error::{ErrorKind, ExtractResult};
use crate::extract_error;

/// One non-blank line of a query log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Line number in the log, starting at 1.
    pub line: usize,
    /// The statement, trimmed.
    pub statement: String,
}

impl LogEntry {
    pub fn new(line: usize, statement: impl Into<String>) -> Self {
        Self {
            line,
            statement: statement.into(),
        }
    }
}

/// Splits log `contents` into entries.
pub fn parse_log(contents: &str) -> Vec<LogEntry> {
    contents
        .split('\n')
        .enumerate()
        .filter_map(|(index, line)| {
            let statement = line.replace('\r', "");
            let statement = statement.trim();
            if statement.is_empty() {
                return None;
            }

            Some(LogEntry::new(index + 1, statement))
        })
        .collect()
}

/// Reads the log at `path` and splits it into entries.
pub async fn read_log(path: &Path) -> ExtractResult<Vec<LogEntry>> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|err| {
        extract_error!(
            ErrorKind::IoError,
            "Query log could not be read",
            format!("{}: {err}", path.display()),
            source: err
        )
    })?;

    Ok(parse_log(&contents))
}
