//! Rewindable copies of outgoing bodies.

use http::HeaderValue;
use http::header::CONTENT_LENGTH;

use crate::content::Content;
use crate::error::BodyError;

/// Copy `source` into a new buffered [`Content`] that the transport may
/// consume.
///
/// The source stays readable: a streaming source is loaded into its own
/// buffer first. The copy starts with a `content-length` for the buffered
/// size. Every source header whose name the copy does not already carry is
/// then copied with all of its values. A source header whose name the copy
/// already has is skipped entirely.
pub async fn preserve(source: &Content) -> Result<Content, BodyError> {
    let data = source.read_bytes().await?;
    let mut copy = Content::bytes(data.clone());

    let headers = copy.headers_mut();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(data.len()));
    for name in source.headers().keys() {
        if headers.contains_key(name) {
            continue;
        }
        for value in source.headers().get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    Ok(copy)
}
