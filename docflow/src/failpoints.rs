use fail::fail_point;

use crate::bail;
use crate::error::{DocflowResult, ErrorKind};

/// Triggered by a fan-out stage right before putting an element into a destination.
///
/// The failpoint argument, when present, restricts the failure to the destination with that
/// name: `return(index-queue)` fails puts into `index-queue` only, `return` fails them all.
pub const FAN_OUT_BEFORE_PUT: &str = "fan_out.before_put";

/// Evaluates failpoint `name` for `target`, failing with [`ErrorKind::ForwardingFailed`] when
/// it is configured to return for that target.
pub fn docflow_fail_point(name: &str, target: &str) -> DocflowResult<()> {
    fail_point!(name, |parameter: Option<String>| {
        if parameter.is_some_and(|expected| expected != target) {
            return Ok(());
        }

        bail!(
            ErrorKind::ForwardingFailed,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error for '{target}'")
        );
    });

    Ok(())
}
