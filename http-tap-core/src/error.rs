//! Error-chain flattening and synthetic status codes.
//!
//! A transport failure is reported to callers as a response whose reason
//! phrase is the whole error chain flattened into one line:
//!
//! - messages are taken from the outermost error to the innermost `source()`
//! - blank messages are skipped
//! - trailing `。`, `！` and `；` are stripped from each message
//! - the survivors are joined with `；`

use std::error::Error;

/// Status code of a response fabricated for a client-side transport failure.
///
/// It lies outside the 100–599 range any real server can send.
pub const SYNTHETIC_STATUS: u16 = 600;

/// Separator placed between flattened error messages.
pub const MESSAGE_SEPARATOR: char = '；';

/// Sentence terminators stripped from the end of each message.
const TRAILING_TERMINATORS: [char; 3] = ['。', '！', '；'];

/// Returns whether `status` is in the range reserved for synthetic responses.
pub fn is_synthetic_status(status: u16) -> bool {
    status >= SYNTHETIC_STATUS
}

/// Flatten an error and its chain of sources into a single message.
///
/// # Example
///
/// ```
/// use http_tap_core::flatten_messages;
///
/// let err = std::io::Error::other("connection refused。");
/// assert_eq!(flatten_messages(&err), "connection refused");
/// ```
pub fn flatten_messages(error: &(dyn Error + 'static)) -> String {
    let separator = MESSAGE_SEPARATOR.to_string();
    std::iter::successors(Some(error), |&e| e.source())
        .map(|e| e.to_string())
        .filter(|message| !message.trim().is_empty())
        .map(|message| message.trim_end_matches(TRAILING_TERMINATORS).to_owned())
        .collect::<Vec<_>>()
        .join(&separator)
}
