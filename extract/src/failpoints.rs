use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, ExtractResult};

pub const REPLICATE_ROW__BEFORE_INSERT: &str = "replicate_row.before_insert";
pub const PIPELINE__BEFORE_ENTRY: &str = "pipeline.before_entry";

pub fn extract_fail_point(name: &str) -> ExtractResult<()> {
    fail_point!(name, |_| {
        bail!(
            ErrorKind::InjectedFailure,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
