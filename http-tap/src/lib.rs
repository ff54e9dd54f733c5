//! Instrumented HTTP client for Rust.
//!
//! Every request sent through a [`TapClient`] is timed and recorded, and its
//! outcome is always a [`TapResponse`]: transport failures are turned into
//! synthetic responses with status 600 instead of errors. A completed
//! exchange can be turned into a [`RequestLog`] for diagnostics.
//!
//! ## Features
//!
//! - `begin-time` / `end-time` headers on every response, also available as
//!   a typed [`Timing`]
//! - Request bodies stay readable after sending, streams included
//! - Transport failures as responses carrying the full message chain
//! - A handler chain with a located [`TapInterceptor`] anchor and
//!   [`HeaderHandler`] layers
//! - Hyper transport with rustls, timeout, response buffer limit,
//!   cancellation and optional automatic cookies
//!
//! ## Example
//!
//! ```ignore
//! use http_tap::{Content, create_client};
//!
//! let client = create_client()?;
//!
//! let response = client.get("http://localhost:3000/Home/TestGet?name=test", None).await?;
//! let log = response.request_log(true, true).await;
//! assert_eq!(log.request_query, "?name=test");
//!
//! let body = Content::json(&serde_json::json!({"name": "test"}))?;
//! let response = client.post("http://unreachable.invalid/api", Some(body), None).await?;
//! if response.is_synthetic() {
//!     eprintln!("failed: {}", response.reason_phrase().unwrap_or_default());
//! }
//! ```
//!
//! ## Custom Handler Chains
//!
//! Any chain can be used as long as a [`TapInterceptor`] is reachable from
//! its root through [`Handler::inner`] within [`MAX_CHAIN_DEPTH`] handlers:
//!
//! ```ignore
//! use std::sync::Arc;
//! use http_tap::{HeaderHandler, HyperTransport, TapClient, TapInterceptor};
//!
//! let transport = Arc::new(HyperTransport::new()?);
//! let chain = Arc::new(HeaderHandler::try_new(
//!     "x-app",
//!     "inventory",
//!     Arc::new(TapInterceptor::new(transport)),
//! )?);
//!
//! let client = TapClient::builder().handler_chain(chain).build()?;
//! ```
//!
//! ## Cancellation and Timeouts
//!
//! [`TapClient::cancel_pending_requests`] aborts every exchange in flight on
//! the client's transport. Each transport has one timeout, set with
//! [`ClientBuilder::timeout`]. Both end in synthetic responses.

mod builder;
mod client;
mod content;
mod error;
mod interceptor;
mod locator;
mod log;
mod normalize;
mod preserve;
mod response;
mod timing;
pub mod transport;

#[cfg(test)]
mod testing;

pub use builder::ClientBuilder;
pub use client::TapClient;
pub use content::{BodyStream, Content, ContentError};
pub use error::{BodyError, BoxError, BuildError, ClientError, TransportError};
pub use interceptor::{BoxFuture, CookiePolicy, Handler, HeaderHandler, TapInterceptor};
pub use locator::{LocateError, MAX_CHAIN_DEPTH, locate};
pub use log::build_log;
pub use normalize::normalize;
pub use preserve::preserve;
pub use response::{RecordedRequest, TapResponse};
pub use timing::timed;

// Re-export transport types at the top level for convenience
pub use transport::{HyperTransport, HyperTransportBuilder, TapBody, TlsClientConfig, TlsVersions};

// Re-export core types that users need
pub use http_tap_core::{
    BEGIN_TIME_HEADER, END_TIME_HEADER, RequestLog, SYNTHETIC_STATUS, TIMESTAMP_FORMAT, Timing,
    TimestampError, flatten_messages,
};

/// Create a client with the default chain and settings.
pub fn create_client() -> Result<TapClient, BuildError> {
    TapClient::builder().build()
}
