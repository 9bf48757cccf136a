use std::fmt::Write;

use extract::pipeline::PipelineReport;

/// Renders the summary printed on stdout once a run ends.
pub fn render_summary(report: &PipelineReport) -> String {
    let mut out = String::new();

    // Writing into a `String` cannot fail.
    let _ = writeln!(out, "entries processed: {}", report.entries);
    let _ = writeln!(out, "select statements: {}", report.select_statements);
    let _ = writeln!(out, "non-select entries: {}", report.non_select_entries);
    let _ = writeln!(out, "rows located: {}", report.rows_located);
    let _ = writeln!(out, "rows inserted: {}", report.rows_inserted);
    let _ = writeln!(out, "rows already present: {}", report.rows_already_present);
    let _ = writeln!(out, "rows missing at source: {}", report.rows_missing_at_source);
    let _ = writeln!(out, "rows without match: {}", report.rows_without_match);
    let _ = writeln!(out, "rows with ambiguous identity: {}", report.rows_ambiguous);
    let _ = writeln!(out, "skipped entries: {}", report.skipped.len());
    for entry in &report.skipped {
        let _ = writeln!(
            out,
            "- line {} [{}] {}: {}",
            entry.line, entry.reason, entry.statement, entry.message
        );
    }

    if report.cancelled {
        let _ = writeln!(out, "run cancelled before the end of the log");
    }

    out
}

#[cfg(test)]
mod tests {
    use extract::pipeline::{SkipReason, SkippedEntry};

    use super::*;

    #[test]
    fn summary_lists_skipped_entries() {
        let report = PipelineReport {
            entries: 4,
            select_statements: 3,
            non_select_entries: 1,
            rows_located: 2,
            rows_inserted: 1,
            rows_already_present: 1,
            rows_missing_at_source: 0,
            rows_without_match: 1,
            rows_ambiguous: 0,
            skipped: vec![SkippedEntry {
                line: 2,
                statement: "SELECT * FROM logs".to_owned(),
                reason: SkipReason::MissingIdentityColumns,
                message: "Table has no primary key or unique index: shop.logs".to_owned(),
            }],
            cancelled: true,
        };

        insta::assert_snapshot!(render_summary(&report), @r"
        entries processed: 4
        select statements: 3
        non-select entries: 1
        rows located: 2
        rows inserted: 1
        rows already present: 1
        rows missing at source: 0
        rows without match: 1
        rows with ambiguous identity: 0
        skipped entries: 1
        - line 2 [missing identity columns] SELECT * FROM logs: Table has no primary key or unique index: shop.logs
        run cancelled before the end of the log
        ");
    }
}
