//! Metrics definitions for extraction runs.

/// Label for the outcome of an entry or a row.
pub const OUTCOME_LABEL: &str = "outcome";

/// Label for the error kind of a failed entry.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Counter for processed log entries, labelled by outcome.
pub const EXTRACT_LOG_ENTRIES_TOTAL: &str = "extract_log_entries_total";

/// Counter for identity tuple groups replicated, labelled by outcome.
pub const EXTRACT_ROWS_TOTAL: &str = "extract_rows_total";

/// Counter for entries skipped or aborted on an error, labelled by error kind.
pub const EXTRACT_ENTRY_ERRORS_TOTAL: &str = "extract_entry_errors_total";
