//! Request and response content.
//!
//! [`Content`] pairs a body with its own content headers (`content-type`,
//! `content-length`, ...). A body is either buffered, and can be read any
//! number of times, or a single-read stream.
//!
//! Reading a stream through [`Content::read_bytes`] loads it into a buffer,
//! so later reads keep working. Handing the stream out with
//! [`Content::take_stream`] leaves the content consumed, and later reads fail
//! with [`BodyError::Consumed`].

use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{BodyError, BoxError};

/// A single-read body stream.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON_UTF8: &str = "application/json; charset=utf-8";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Errors raised by the serializing constructors of [`Content`].
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("failed to serialize JSON content")]
    Json(#[from] serde_json::Error),

    #[error("failed to serialize form content")]
    Form(#[from] serde_qs::Error),
}

enum BodyState {
    Buffered(Bytes),
    Streaming(BodyStream),
    Consumed,
}

/// A body and its content headers.
pub struct Content {
    headers: HeaderMap,
    state: Mutex<BodyState>,
}

impl std::fmt::Debug for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state.try_lock().as_deref() {
            Ok(BodyState::Buffered(data)) => format!("Buffered({} bytes)", data.len()),
            Ok(BodyState::Streaming(_)) => "Streaming".to_owned(),
            Ok(BodyState::Consumed) => "Consumed".to_owned(),
            Err(_) => "Locked".to_owned(),
        };
        f.debug_struct("Content")
            .field("headers", &self.headers)
            .field("body", &state)
            .finish()
    }
}

impl Content {
    fn with_state(state: BodyState) -> Self {
        Self {
            headers: HeaderMap::new(),
            state: Mutex::new(state),
        }
    }

    /// Raw bytes without a content type.
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::with_state(BodyState::Buffered(data.into()))
    }

    /// UTF-8 text, `text/plain; charset=utf-8`.
    pub fn text(text: impl Into<String>) -> Self {
        Self::bytes(text.into()).header(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8))
    }

    /// A value serialized as JSON, `application/json; charset=utf-8`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ContentError> {
        let data = serde_json::to_vec(value)?;
        Ok(Self::bytes(data).header(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON_UTF8)))
    }

    /// A value serialized as a url-encoded form.
    pub fn form<T: Serialize>(value: &T) -> Result<Self, ContentError> {
        let data = serde_qs::to_string(value)?;
        Ok(Self::bytes(data).header(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED)))
    }

    /// A single-read stream of chunks.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        Self::with_state(BodyState::Streaming(Box::pin(stream)))
    }

    /// Append a content header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Content headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Whether the body is held in memory.
    pub async fn is_buffered(&self) -> bool {
        matches!(*self.state.lock().await, BodyState::Buffered(_))
    }

    /// Read the whole body.
    ///
    /// A stream is drained into a buffer that replaces it. If the stream
    /// fails midway the content is left consumed.
    pub async fn read_bytes(&self) -> Result<Bytes, BodyError> {
        let mut state = self.state.lock().await;
        let mut body = match std::mem::replace(&mut *state, BodyState::Consumed) {
            BodyState::Buffered(data) => {
                *state = BodyState::Buffered(data.clone());
                return Ok(data);
            }
            BodyState::Consumed => return Err(BodyError::Consumed),
            BodyState::Streaming(body) => body,
        };

        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk.map_err(BodyError::Stream)?);
        }
        let data = buf.freeze();
        *state = BodyState::Buffered(data.clone());
        Ok(data)
    }

    /// Read the whole body as text, replacing invalid UTF-8.
    pub async fn read_string(&self) -> Result<String, BodyError> {
        let data = self.read_bytes().await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Take the body as a stream, leaving this content consumed.
    pub async fn take_stream(&self) -> Result<BodyStream, BodyError> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, BodyState::Consumed) {
            BodyState::Buffered(data) => Ok(Box::pin(stream::once(async move { Ok(data) }))),
            BodyState::Streaming(body) => Ok(body),
            BodyState::Consumed => Err(BodyError::Consumed),
        }
    }

    /// Split buffered content into its headers and bytes.
    ///
    /// Returns `None` for streaming or consumed content.
    pub(crate) fn into_buffered(self) -> Option<(HeaderMap, Bytes)> {
        match self.state.into_inner() {
            BodyState::Buffered(data) => Some((self.headers, data)),
            BodyState::Streaming(_) | BodyState::Consumed => None,
        }
    }
}
