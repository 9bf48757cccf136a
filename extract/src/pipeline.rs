//! Replays a query log entry by entry.
//!
//! Each entry goes through [`EntryPhase::Parsing`], [`EntryPhase::TableResolution`],
//! [`EntryPhase::IdentityFetch`] and [`EntryPhase::RowReplication`]. Failures are classified by
//! [`classify_failure`]: statements that are not SELECTs are ignored, recoverable failures skip
//! the entry and everything else aborts the run.

use std::fmt;

use extract_config::shared::{ErrorPolicyConfig, ExtractorConfig};
use metrics::counter;
use tracing::{debug, error, info, warn};

use crate::bail;
use crate::concurrency::shutdown::{
    ShutdownRx, ShutdownTx, create_shutdown_channel, is_shutdown_requested,
};
use crate::database::{DestinationDatabase, SourceDatabase};
use crate::error::{ErrorKind, ExtractError, ExtractResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{PIPELINE__BEFORE_ENTRY, extract_fail_point};
use crate::identity::IdentityResolver;
use crate::locator::{augment, decompose};
use crate::log::LogEntry;
use crate::metrics::{
    ERROR_KIND_LABEL, EXTRACT_ENTRY_ERRORS_TOTAL, EXTRACT_LOG_ENTRIES_TOTAL, EXTRACT_ROWS_TOTAL,
    OUTCOME_LABEL,
};
use crate::replication::{DatabaseMapping, ReplicationOutcome, replicate};
use crate::statement::{extract_tables, parse};

/// Settings of one extraction run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Database of tables referenced without a database qualifier.
    pub default_database: String,
    /// Destination database resolution and the corruption guard.
    pub mapping: DatabaseMapping,
    /// Reaction to recoverable per-entry failures.
    pub errors: ErrorPolicyConfig,
}

impl PipelineConfig {
    pub fn from_extractor_config(config: &ExtractorConfig) -> Self {
        Self {
            default_database: config.source.name.clone(),
            mapping: DatabaseMapping::new(config.database_mapping.clone(), config.same_server()),
            errors: config.errors,
        }
    }
}

/// Processing stage of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPhase {
    Parsing,
    TableResolution,
    IdentityFetch,
    RowReplication,
    Done,
}

impl EntryPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryPhase::Parsing => "parsing",
            EntryPhase::TableResolution => "table_resolution",
            EntryPhase::IdentityFetch => "identity_fetch",
            EntryPhase::RowReplication => "row_replication",
            EntryPhase::Done => "done",
        }
    }
}

impl fmt::Display for EntryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an entry was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InvalidStatement,
    UnsupportedNestedQuery,
    MissingIdentityColumns,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::InvalidStatement => "invalid statement",
            SkipReason::UnsupportedNestedQuery => "nested query",
            SkipReason::MissingIdentityColumns => "missing identity columns",
        };

        f.write_str(reason)
    }
}

/// What the pipeline does with a failed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Not a SELECT: dropped without a report.
    Ignore,
    /// Reported and skipped.
    Skip(SkipReason),
    /// The run stops.
    Abort,
}

/// Decides how a failure of `kind` is handled under `policy`.
pub fn classify_failure(kind: ErrorKind, policy: &ErrorPolicyConfig) -> FailureAction {
    match kind {
        ErrorKind::NotASelect => FailureAction::Ignore,
        ErrorKind::InvalidStatement => FailureAction::Skip(SkipReason::InvalidStatement),
        ErrorKind::UnsupportedNestedQuery if !policy.stop_on_unsupported_nested_query => {
            FailureAction::Skip(SkipReason::UnsupportedNestedQuery)
        }
        ErrorKind::MissingIdentityColumns if !policy.stop_on_missing_identity_columns => {
            FailureAction::Skip(SkipReason::MissingIdentityColumns)
        }
        _ => FailureAction::Abort,
    }
}

/// A skipped log entry and the reason it was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub line: usize,
    pub statement: String,
    pub reason: SkipReason,
    /// Description of the failure, with its detail when there is one.
    pub message: String,
}

/// Counts gathered over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Non-blank entries processed.
    pub entries: usize,
    /// Entries starting with `SELECT`, skipped ones included.
    pub select_statements: usize,
    /// Entries ignored because they are not SELECTs.
    pub non_select_entries: usize,
    /// Result rows of the augmented statements.
    pub rows_located: usize,
    pub rows_inserted: usize,
    pub rows_already_present: usize,
    pub rows_missing_at_source: usize,
    /// Occurrences left NULL by an outer join.
    pub rows_without_match: usize,
    /// Identities matching several source rows.
    pub rows_ambiguous: usize,
    pub skipped: Vec<SkippedEntry>,
    /// Whether the run stopped early on a shutdown signal.
    pub cancelled: bool,
}

impl PipelineReport {
    fn record_outcome(&mut self, outcome: ReplicationOutcome) {
        match outcome {
            ReplicationOutcome::Inserted => self.rows_inserted += 1,
            ReplicationOutcome::AlreadyPresent => self.rows_already_present += 1,
            ReplicationOutcome::SourceRowMissing => self.rows_missing_at_source += 1,
            ReplicationOutcome::NoContributingRow => self.rows_without_match += 1,
            ReplicationOutcome::AmbiguousIdentity => self.rows_ambiguous += 1,
        }
    }
}

fn outcome_label(outcome: ReplicationOutcome) -> &'static str {
    match outcome {
        ReplicationOutcome::Inserted => "inserted",
        ReplicationOutcome::AlreadyPresent => "already_present",
        ReplicationOutcome::SourceRowMissing => "missing_at_source",
        ReplicationOutcome::NoContributingRow => "without_match",
        ReplicationOutcome::AmbiguousIdentity => "ambiguous",
    }
}

fn failure_message(err: &ExtractError) -> String {
    match err.detail() {
        Some(detail) => format!("{}: {detail}", err.description()),
        None => err.description().to_owned(),
    }
}

/// Replays log entries against a source and copies the rows they read into a destination.
#[derive(Debug)]
pub struct Pipeline<S, D> {
    config: PipelineConfig,
    source: S,
    destination: D,
    resolver: IdentityResolver,
    shutdown_tx: ShutdownTx,
    shutdown_rx: ShutdownRx,
}

impl<S, D> Pipeline<S, D>
where
    S: SourceDatabase,
    D: DestinationDatabase,
{
    pub fn new(config: PipelineConfig, source: S, destination: D) -> Self {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        Self {
            config,
            source,
            destination,
            resolver: IdentityResolver::new(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Returns a handle that stops the run before its next entry.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Processes `entries` in order.
    ///
    /// Fails with [`ErrorKind::EmptyLog`] when there is nothing to process, and with
    /// [`ErrorKind::NoSelectStatements`] when no entry was a SELECT. A shutdown signal stops the
    /// run between entries and returns a report marked as cancelled.
    pub async fn run(&mut self, entries: &[LogEntry]) -> ExtractResult<PipelineReport> {
        if entries.is_empty() {
            bail!(ErrorKind::EmptyLog, "Query log has no entries");
        }

        info!(entries = entries.len(), "replaying query log");

        let mut report = PipelineReport::default();
        for entry in entries {
            if is_shutdown_requested(&self.shutdown_rx) {
                info!(line = entry.line, "shutdown requested, stopping before entry");
                report.cancelled = true;
                break;
            }

            #[cfg(feature = "failpoints")]
            extract_fail_point(PIPELINE__BEFORE_ENTRY)
                .map_err(|err| err.with_statement(entry.line, &entry.statement))?;

            report.entries += 1;
            self.run_entry(entry, &mut report).await?;
        }

        if !report.cancelled && report.select_statements == 0 {
            bail!(
                ErrorKind::NoSelectStatements,
                "Query log holds no SELECT statement",
                format!("{} entries read", report.entries)
            );
        }

        info!(
            entries = report.entries,
            rows_inserted = report.rows_inserted,
            rows_already_present = report.rows_already_present,
            rows_missing_at_source = report.rows_missing_at_source,
            rows_without_match = report.rows_without_match,
            rows_ambiguous = report.rows_ambiguous,
            skipped = report.skipped.len(),
            cancelled = report.cancelled,
            "query log replayed"
        );

        Ok(report)
    }

    async fn run_entry(
        &mut self,
        entry: &LogEntry,
        report: &mut PipelineReport,
    ) -> ExtractResult<()> {
        let mut phase = EntryPhase::Parsing;
        let result = self.process_entry(entry, &mut phase, report).await;

        let Err(err) = result else {
            report.select_statements += 1;
            counter!(EXTRACT_LOG_ENTRIES_TOTAL, OUTCOME_LABEL => "replicated").increment(1);
            return Ok(());
        };

        match classify_failure(err.kind(), &self.config.errors) {
            FailureAction::Ignore => {
                debug!(line = entry.line, "ignoring statement that is not a SELECT");
                report.non_select_entries += 1;
                counter!(EXTRACT_LOG_ENTRIES_TOTAL, OUTCOME_LABEL => "ignored").increment(1);

                Ok(())
            }
            FailureAction::Skip(reason) => {
                warn!(
                    line = entry.line,
                    statement = %entry.statement,
                    %phase,
                    %reason,
                    error = %failure_message(&err),
                    "skipping entry"
                );

                report.select_statements += 1;
                report.skipped.push(SkippedEntry {
                    line: entry.line,
                    statement: entry.statement.clone(),
                    reason,
                    message: failure_message(&err),
                });
                counter!(EXTRACT_LOG_ENTRIES_TOTAL, OUTCOME_LABEL => "skipped").increment(1);
                counter!(EXTRACT_ENTRY_ERRORS_TOTAL, ERROR_KIND_LABEL => format!("{:?}", err.kind()))
                    .increment(1);

                Ok(())
            }
            FailureAction::Abort => {
                error!(
                    line = entry.line,
                    statement = %entry.statement,
                    %phase,
                    "aborting run"
                );

                counter!(EXTRACT_LOG_ENTRIES_TOTAL, OUTCOME_LABEL => "failed").increment(1);
                counter!(EXTRACT_ENTRY_ERRORS_TOTAL, ERROR_KIND_LABEL => format!("{:?}", err.kind()))
                    .increment(1);

                Err(err.with_statement(entry.line, &entry.statement))
            }
        }
    }

    async fn process_entry(
        &mut self,
        entry: &LogEntry,
        phase: &mut EntryPhase,
        report: &mut PipelineReport,
    ) -> ExtractResult<()> {
        let statement = parse(&entry.statement)?;

        *phase = EntryPhase::TableResolution;
        let tables = extract_tables(&statement, &self.config.default_database)?;
        if tables.is_empty() {
            debug!(line = entry.line, "statement reads no table");
            *phase = EntryPhase::Done;
            return Ok(());
        }

        for table in &tables {
            self.config.mapping.destination_database(&table.database)?;
        }

        let augmented = augment(&self.source, &mut self.resolver, statement, tables).await?;

        *phase = EntryPhase::IdentityFetch;
        let rows = self.source.fetch_rows(&augmented.sql).await?;
        let located = decompose(&augmented, &rows)?;
        report.rows_located += located.len();

        *phase = EntryPhase::RowReplication;
        for groups in &located {
            for group in groups {
                let outcome =
                    replicate(&self.source, &self.destination, &self.config.mapping, group)
                        .await?;

                report.record_outcome(outcome);
                counter!(EXTRACT_ROWS_TOTAL, OUTCOME_LABEL => outcome_label(outcome)).increment(1);
            }
        }

        debug!(line = entry.line, rows = located.len(), "entry replicated");
        *phase = EntryPhase::Done;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_follow_the_error_policy() {
        let lenient = ErrorPolicyConfig::default();
        let strict = ErrorPolicyConfig {
            stop_on_unsupported_nested_query: true,
            stop_on_missing_identity_columns: true,
        };

        assert_eq!(
            classify_failure(ErrorKind::NotASelect, &strict),
            FailureAction::Ignore
        );
        assert_eq!(
            classify_failure(ErrorKind::InvalidStatement, &strict),
            FailureAction::Skip(SkipReason::InvalidStatement)
        );
        assert_eq!(
            classify_failure(ErrorKind::UnsupportedNestedQuery, &lenient),
            FailureAction::Skip(SkipReason::UnsupportedNestedQuery)
        );
        assert_eq!(
            classify_failure(ErrorKind::UnsupportedNestedQuery, &strict),
            FailureAction::Abort
        );
        assert_eq!(
            classify_failure(ErrorKind::MissingIdentityColumns, &lenient),
            FailureAction::Skip(SkipReason::MissingIdentityColumns)
        );
        assert_eq!(
            classify_failure(ErrorKind::MissingIdentityColumns, &strict),
            FailureAction::Abort
        );

        for kind in [
            ErrorKind::SameServer,
            ErrorKind::SourceQueryFailed,
            ErrorKind::DestinationQueryFailed,
            ErrorKind::SourceConnectionFailed,
            ErrorKind::DestinationConnectionFailed,
            ErrorKind::ConversionError,
            ErrorKind::InvalidData,
        ] {
            assert_eq!(classify_failure(kind, &lenient), FailureAction::Abort, "{kind:?}");
        }
    }

    #[test]
    fn phases_render_in_snake_case() {
        assert_eq!(EntryPhase::TableResolution.to_string(), "table_resolution");
        assert_eq!(EntryPhase::RowReplication.to_string(), "row_replication");
    }
}
