//! Timing of dispatches.

use std::future::Future;

use http_tap_core::{Timing, local_now};

/// Run `future` to completion and record when it started and finished.
///
/// The start is taken immediately before the first poll and the end
/// immediately after completion, in local time.
pub async fn timed<F: Future>(future: F) -> (F::Output, Timing) {
    let start = local_now();
    let output = future.await;
    let end = local_now();
    (output, Timing::new(start, end))
}
