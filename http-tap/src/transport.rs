//! HTTP transport.
//!
//! [`HyperTransport`] is the innermost handler of a default chain. It sends
//! requests with hyper_util's legacy client and supports:
//!
//! - HTTP/1.1 and HTTP/2 with automatic protocol negotiation
//! - TLS with rustls (feature-gated), with the protocol versions chosen at
//!   build time through [`TlsVersions`]
//! - Connection pooling
//! - A per-transport timeout and response buffer limit
//! - Automatic cookie handling, switchable at runtime
//! - Cancellation of every in-flight request
//!
//! # Feature Flags
//!
//! - `tls` (default) - Enables `tls-ring` + `tls-native-roots` for convenience
//! - `tls-ring` / `tls-aws-lc` - Crypto providers
//! - `tls-native-roots` / `tls-webpki-roots` - Root certificates

mod connector;
mod cookies;
mod hyper;

use bytes::Bytes;

pub use connector::{TlsVersions, build_https_connector, default_tls_config, has_tls_support};
pub use hyper::{
    DEFAULT_MAX_RESPONSE_BUFFER_SIZE, DEFAULT_TIMEOUT, HyperTransport, HyperTransportBuilder,
};

/// Body type of requests sent through a handler chain.
pub type TapBody = http_body_util::Full<Bytes>;

// Re-export rustls types that users might need for TLS configuration
pub use rustls::ClientConfig as TlsClientConfig;
