//! Time-windowed selector for the stream endpoint

use crate::constants::{ENQUEUED_TIME_SELECTOR, FILTER_MARGIN_SECS};
use crate::error::{ProbeError, Result};

/// Selector expression plus the baseline it encodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterWindow {
    pub expression: String,
    /// Epoch milliseconds; only events enqueued after this are selected
    pub baseline_ms: i64,
}

/// Build the selector for a probe started at `start_secs` (Unix seconds)
///
/// The window reaches [`FILTER_MARGIN_SECS`] back so a reply enqueued just
/// before the receivers attach is still seen.
pub fn build_filter(start_secs: i64) -> Result<FilterWindow> {
    if start_secs < FILTER_MARGIN_SECS {
        return Err(ProbeError::filter_build(format!(
            "start time {start_secs}s is earlier than the {FILTER_MARGIN_SECS}s margin"
        )));
    }
    let baseline_ms = (start_secs - FILTER_MARGIN_SECS)
        .checked_mul(1000)
        .ok_or_else(|| ProbeError::filter_build(format!("start time {start_secs}s overflows")))?;

    Ok(FilterWindow {
        expression: format!("{ENQUEUED_TIME_SELECTOR} > {baseline_ms}"),
        baseline_ms,
    })
}
