//! Hyper-based HTTP transport.
//!
//! This module provides [`HyperTransport`], the innermost handler of a
//! default chain, using hyper_util's legacy client.

use std::any::Any;
use std::time::Duration;

use bytes::Bytes;
use http::header::COOKIE;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::ClientConfig;
use tokio::sync::watch;
use url::Url;

use super::TapBody;
use super::connector::{TlsVersions, build_https_connector, default_tls_config};
use super::cookies::CookieJar;
use crate::error::{BuildError, TransportError};
use crate::interceptor::{BoxFuture, CookiePolicy, Handler};

/// Default time a request may take, including reading its response body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// Default maximum number of response body bytes buffered per request.
pub const DEFAULT_MAX_RESPONSE_BUFFER_SIZE: usize = i32::MAX as usize;

/// Type alias for the hyper client with HTTPS connector.
type HyperClient = Client<HttpsConnector<HttpConnector>, TapBody>;

/// HTTP transport using hyper_util's legacy client.
///
/// Responses are buffered completely before they are returned. The whole
/// exchange races the configured timeout and
/// [`cancel_pending`](Handler::cancel_pending).
///
/// # Example
///
/// ```ignore
/// use http_tap::transport::HyperTransport;
/// use std::time::Duration;
///
/// let transport = HyperTransport::builder()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub struct HyperTransport {
    client: HyperClient,
    timeout: Duration,
    max_response_buffer_size: usize,
    cookie_policy: CookiePolicy,
    cookie_jar: CookieJar,
    /// Generation counter bumped on every cancellation.
    cancel: watch::Sender<u64>,
    http2_only: bool,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("timeout", &self.timeout)
            .field("max_response_buffer_size", &self.max_response_buffer_size)
            .field("use_cookies", &self.cookie_policy.is_enabled())
            .field("http2_only", &self.http2_only)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Create a new transport builder.
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::new()
    }

    /// Create a new transport with default settings.
    pub fn new() -> Result<Self, BuildError> {
        Self::builder().build()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_response_buffer_size(&self) -> usize {
        self.max_response_buffer_size
    }

    /// Check if this transport is configured for HTTP/2 only.
    pub fn is_http2_only(&self) -> bool {
        self.http2_only
    }

    async fn exchange(
        &self,
        mut request: http::Request<TapBody>,
        cookie_url: Option<&Url>,
    ) -> Result<http::Response<Bytes>, TransportError> {
        if let Some(url) = cookie_url {
            if !request.headers().contains_key(COOKIE) {
                if let Some(cookie) = self.cookie_jar.header_for(url) {
                    request.headers_mut().insert(COOKIE, cookie);
                }
            }
        }

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| TransportError::Send(Box::new(e)))?;
        let (parts, body) = response.into_parts();

        if let Some(url) = cookie_url {
            self.cookie_jar.store(url, &parts.headers);
        }

        let limit = self.max_response_buffer_size;
        let body = Limited::new(body, limit)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    TransportError::BufferLimit(limit)
                } else {
                    TransportError::ResponseBody(e)
                }
            })?
            .to_bytes();

        Ok(http::Response::from_parts(parts, body))
    }
}

impl Handler for HyperTransport {
    fn send(
        &self,
        request: http::Request<TapBody>,
    ) -> BoxFuture<'_, Result<http::Response<Bytes>, TransportError>> {
        Box::pin(async move {
            // Cookies are scoped by the full request URL.
            let cookie_url = if self.cookie_policy.is_enabled() {
                Url::parse(&request.uri().to_string()).ok()
            } else {
                None
            };
            let mut canceled = self.cancel.subscribe();

            let exchange = self.exchange(request, cookie_url.as_ref());
            tokio::select! {
                result = tokio::time::timeout(self.timeout, exchange) => {
                    result.map_err(|_| TransportError::Timeout(self.timeout))?
                }
                _ = canceled.changed() => {
                    tracing::debug!("request canceled");
                    Err(TransportError::Canceled)
                }
            }
        })
    }

    fn cookie_policy(&self) -> Option<&CookiePolicy> {
        Some(&self.cookie_policy)
    }

    fn cancel_pending(&self) {
        self.cancel.send_modify(|generation| *generation += 1);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builder for [`HyperTransport`].
///
/// Provides configuration options for the HTTP transport including
/// TLS settings, HTTP/2 options, and connection pooling.
///
/// # Example
///
/// ```ignore
/// use http_tap::transport::{HyperTransportBuilder, TlsVersions};
/// use std::time::Duration;
///
/// let transport = HyperTransportBuilder::new()
///     .tls_versions(TlsVersions::Tls13Only)
///     .pool_idle_timeout(Duration::from_secs(90))
///     .build()?;
/// ```
pub struct HyperTransportBuilder {
    /// Custom TLS configuration.
    tls_config: Option<ClientConfig>,
    /// Protocol versions of the default TLS configuration.
    tls_versions: TlsVersions,
    /// Force HTTP/2 only (for h2c or when HTTP/2 is required).
    http2_only: bool,
    /// Connection pool idle timeout.
    pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host.
    pool_max_idle_per_host: usize,
    timeout: Duration,
    max_response_buffer_size: usize,
    use_cookies: bool,
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransportBuilder {
    /// Create a new transport builder with default settings.
    pub fn new() -> Self {
        Self {
            tls_config: None,
            tls_versions: TlsVersions::default(),
            http2_only: false,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
            timeout: DEFAULT_TIMEOUT,
            max_response_buffer_size: DEFAULT_MAX_RESPONSE_BUFFER_SIZE,
            use_cookies: true,
        }
    }

    /// Set a custom TLS configuration.
    ///
    /// Takes precedence over [`tls_versions`](Self::tls_versions).
    pub fn tls_config(mut self, config: ClientConfig) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Select the protocol versions of the default TLS configuration.
    ///
    /// Default: TLS 1.2 and 1.3.
    pub fn tls_versions(mut self, versions: TlsVersions) -> Self {
        self.tls_versions = versions;
        self
    }

    /// Enable HTTP/2 only mode.
    ///
    /// For HTTPS connections, HTTP/2 is typically negotiated via ALPN,
    /// so this setting is often not needed.
    pub fn http2_only(mut self, enabled: bool) -> Self {
        self.http2_only = enabled;
        self
    }

    /// Set the connection pool idle timeout.
    ///
    /// Default: 90 seconds.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Disable connection pool idle timeout.
    pub fn pool_idle_timeout_none(mut self) -> Self {
        self.pool_idle_timeout = None;
        self
    }

    /// Set the maximum number of idle connections per host.
    ///
    /// Default: 32.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Set how long a request may take, response body included.
    ///
    /// Default: 100 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of response body bytes to buffer.
    ///
    /// Default: 2 147 483 647.
    pub fn max_response_buffer_size(mut self, max: usize) -> Self {
        self.max_response_buffer_size = max;
        self
    }

    /// Initial automatic cookie policy. Default: enabled.
    pub fn use_cookies(mut self, enabled: bool) -> Self {
        self.use_cookies = enabled;
        self
    }

    pub(crate) fn timeout_value(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn max_response_buffer_size_value(&self) -> usize {
        self.max_response_buffer_size
    }

    /// Build the transport.
    pub fn build(self) -> Result<HyperTransport, BuildError> {
        let tls_config = match self.tls_config {
            Some(config) => config,
            None => default_tls_config(self.tls_versions)?,
        };
        let https_connector = build_https_connector(tls_config);

        let mut builder = Client::builder(TokioExecutor::new());

        // Required for pool_idle_timeout to work
        builder.pool_timer(TokioTimer::new());

        if let Some(timeout) = self.pool_idle_timeout {
            builder.pool_idle_timeout(timeout);
        }
        builder.pool_max_idle_per_host(self.pool_max_idle_per_host);

        if self.http2_only {
            builder.http2_only(true);
        }

        let client = builder.build(https_connector);
        let (cancel, _) = watch::channel(0);

        Ok(HyperTransport {
            client,
            timeout: self.timeout,
            max_response_buffer_size: self.max_response_buffer_size,
            cookie_policy: CookiePolicy::new(self.use_cookies),
            cookie_jar: CookieJar::default(),
            cancel,
            http2_only: self.http2_only,
        })
    }
}

impl std::fmt::Debug for HyperTransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransportBuilder")
            .field("tls_config", &self.tls_config.is_some())
            .field("tls_versions", &self.tls_versions)
            .field("http2_only", &self.http2_only)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("timeout", &self.timeout)
            .field("max_response_buffer_size", &self.max_response_buffer_size)
            .field("use_cookies", &self.use_cookies)
            .finish()
    }
}
