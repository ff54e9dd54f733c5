//! Turning transport failures into responses.

use http_tap_core::flatten_messages;

use crate::response::{RecordedRequest, TapResponse};

/// Build the synthetic response for a failed exchange.
///
/// The status is 600 and the reason phrase is the flattened message chain
/// of `error`, outermost first. The response has no content.
pub fn normalize(
    error: &(dyn std::error::Error + 'static),
    request: Option<RecordedRequest>,
) -> TapResponse {
    TapResponse::synthetic(flatten_messages(error), request)
}
