//! Error types for http-tap.
//!
//! Only [`ClientError`] and [`BuildError`] ever reach a caller as `Err`.
//! A [`TransportError`] is always turned into a synthetic response by the
//! client, and a [`BodyError`] met while logging becomes log text.

use std::time::Duration;

use crate::locator::LocateError;

/// Boxed error used for opaque sources (hyper, body streams).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of the transport before a complete response was received.
///
/// Messages here never repeat their source; the chain is flattened by
/// [`flatten_messages`](http_tap_core::flatten_messages) when the error is
/// normalized into a response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection, TLS or protocol failure while sending the request.
    #[error("an error occurred while sending the request")]
    Send(#[source] BoxError),

    /// The transport's configured timeout elapsed.
    #[error("the request timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The request was canceled by `cancel_pending_requests`.
    #[error("the request was canceled")]
    Canceled,

    /// The response body exceeded the configured buffer size.
    #[error("cannot buffer more than {0} bytes of response content")]
    BufferLimit(usize),

    /// The response body stream failed.
    #[error("failed to read the response content")]
    ResponseBody(#[source] BoxError),

    /// The outgoing body could not be buffered before dispatch.
    #[error("failed to buffer the request content")]
    RequestBody(#[source] BodyError),
}

/// Failure reading a [`Content`](crate::Content) body.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    /// The single-read stream was already taken.
    #[error("the content stream was already consumed and cannot be read again")]
    Consumed,

    /// The underlying stream yielded an error.
    #[error("failed to read the content stream")]
    Stream(#[source] BoxError),
}

/// Programming errors surfaced by [`TapClient`](crate::TapClient) calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The URL could not be parsed or resolved against the base address.
    #[error("invalid request url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Only `http` and `https` are supported.
    #[error("unsupported url scheme `{0}`")]
    UnsupportedScheme(String),

    /// A header value supplied by the caller is not a valid header value.
    #[error("invalid value for header `{0}`")]
    InvalidHeader(String),
}

/// Errors raised while building a [`TapClient`](crate::TapClient).
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The handler chain does not contain a reachable `TapInterceptor`.
    #[error(transparent)]
    Locate(#[from] LocateError),

    /// The TLS configuration was rejected by rustls.
    #[error("invalid TLS configuration")]
    Tls(#[from] rustls::Error),

    /// Neither a crypto provider feature nor a process default is available.
    #[error(
        "no TLS crypto provider available; enable `tls-ring` or `tls-aws-lc`, \
         or install one with `CryptoProvider::install_default()`"
    )]
    NoCryptoProvider,

    /// The base address is not an absolute `http`/`https` URL.
    #[error("invalid base url `{0}`")]
    InvalidBaseUrl(String),
}
