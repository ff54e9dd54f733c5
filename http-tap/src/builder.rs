//! Client builder.
//!
//! Provides a fluent API for configuring and building a [`TapClient`].

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};
use rustls::ClientConfig;
use url::Url;

use crate::client::TapClient;
use crate::error::BuildError;
use crate::interceptor::{Handler, HeaderHandler, TapInterceptor};
use crate::locator::locate;
use crate::transport::{HyperTransportBuilder, TlsVersions};

/// Builder for creating a [`TapClient`].
///
/// The default chain is `TapInterceptor -> HyperTransport`, wrapped in one
/// [`HeaderHandler`] per [`stamp_header`](Self::stamp_header) call.
///
/// # Example
///
/// ```ignore
/// use http_tap::{ClientBuilder, TlsVersions};
/// use std::time::Duration;
///
/// let client = ClientBuilder::new()
///     .base_url("http://localhost:3000")
///     .timeout(Duration::from_secs(30))
///     .tls_versions(TlsVersions::Tls13Only)
///     .build()?;
/// ```
pub struct ClientBuilder {
    /// Base address for relative request URLs.
    base_url: Option<String>,
    /// Headers merged into every request.
    default_headers: HeaderMap,
    /// Headers stamped by outer `HeaderHandler` layers, outermost first.
    stamp_headers: Vec<(HeaderName, HeaderValue)>,
    /// Settings of the default transport.
    transport: HyperTransportBuilder,
    /// A caller-supplied chain replacing the default one.
    chain: Option<Arc<dyn Handler>>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers)
            .field("stamp_headers", &self.stamp_headers)
            .field("transport", &self.transport)
            .field("chain", &self.chain.as_ref().map(|chain| chain.name()))
            .finish()
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            stamp_headers: Vec::new(),
            transport: HyperTransportBuilder::new(),
            chain: None,
        }
    }

    /// Set the base address relative URLs are resolved against.
    ///
    /// Must be an absolute `http` or `https` URL. A relative reference
    /// replaces the last path segment, so end the base with `/` to append.
    pub fn base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Add a header merged into every request that does not carry it.
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.append(name, value);
        self
    }

    /// Wrap the chain in a [`HeaderHandler`] stamping this header.
    ///
    /// The first stamp added is the outermost layer.
    pub fn stamp_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.stamp_headers.push((name, value));
        self
    }

    /// Use a custom handler chain instead of the default transport.
    ///
    /// The chain must contain a [`TapInterceptor`] within
    /// [`MAX_CHAIN_DEPTH`](crate::MAX_CHAIN_DEPTH) handlers. Transport
    /// settings on this builder are then only reported by the client.
    pub fn handler_chain(mut self, chain: Arc<dyn Handler>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Set how long a request may take. Default: 100 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.timeout(timeout);
        self
    }

    /// Set the maximum response body size. Default: 2 147 483 647 bytes.
    pub fn max_response_buffer_size(mut self, max: usize) -> Self {
        self.transport = self.transport.max_response_buffer_size(max);
        self
    }

    /// Set the connection pool idle timeout. Default: 90 seconds.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.pool_idle_timeout(timeout);
        self
    }

    /// Set the maximum number of idle connections per host. Default: 32.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.transport = self.transport.pool_max_idle_per_host(max);
        self
    }

    /// Enable HTTP/2 only mode.
    pub fn http2_only(mut self, enabled: bool) -> Self {
        self.transport = self.transport.http2_only(enabled);
        self
    }

    /// Select the TLS protocol versions. Default: TLS 1.2 and 1.3.
    pub fn tls_versions(mut self, versions: TlsVersions) -> Self {
        self.transport = self.transport.tls_versions(versions);
        self
    }

    /// Set a custom TLS configuration.
    pub fn tls_config(mut self, config: ClientConfig) -> Self {
        self.transport = self.transport.tls_config(config);
        self
    }

    /// Build the client.
    ///
    /// Fails when the base address is invalid, the transport cannot be
    /// built, or the chain has no reachable [`TapInterceptor`].
    pub fn build(self) -> Result<TapClient, BuildError> {
        let base_url = self
            .base_url
            .as_deref()
            .map(normalize_base_url)
            .transpose()?;
        let timeout = self.transport.timeout_value();
        let max_response_buffer_size = self.transport.max_response_buffer_size_value();

        let chain = match self.chain {
            Some(chain) => chain,
            None => {
                let transport: Arc<dyn Handler> = Arc::new(self.transport.build()?);
                Arc::new(TapInterceptor::new(transport))
            }
        };
        let root = self
            .stamp_headers
            .into_iter()
            .rev()
            .fold(chain, |inner, (name, value)| -> Arc<dyn Handler> {
                Arc::new(HeaderHandler::new(name, value, inner))
            });

        let interceptor = locate(&root)?;
        tracing::debug!(root = root.name(), ?base_url, "built http client");

        Ok(TapClient::new(
            root,
            interceptor,
            base_url,
            self.default_headers,
            timeout,
            max_response_buffer_size,
        ))
    }
}

/// Validate a base address and reduce it to `scheme://authority/path`.
fn normalize_base_url(url: &str) -> Result<Url, BuildError> {
    let invalid = || BuildError::InvalidBaseUrl(url.to_owned());
    let mut base = Url::parse(url.trim()).map_err(|_| invalid())?;

    let has_host = base.host_str().is_some_and(|host| !host.is_empty());
    if !matches!(base.scheme(), "http" | "https") || !has_host {
        return Err(invalid());
    }
    base.set_query(None);
    base.set_fragment(None);
    Ok(base)
}
