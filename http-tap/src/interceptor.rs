//! The handler chain.
//!
//! A client sends every request through a chain of nested [`Handler`]s. Each
//! handler wraps the next one and the innermost one is the transport.
//!
//! ```text
//! HeaderHandler -> HeaderHandler -> TapInterceptor -> HyperTransport
//! ```
//!
//! [`TapInterceptor`] is the anchor of the chain: the client finds it once at
//! build time (see [`locate`](crate::locate)) and uses it to trace exchanges
//! and to reach the transport's cookie policy.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http::{HeaderName, HeaderValue};
use tracing::Instrument;

use crate::error::{ClientError, TransportError};
use crate::transport::TapBody;

/// Type alias for a boxed future returning a result.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One layer of a client's handler chain.
pub trait Handler: Send + Sync + 'static {
    /// Send a request to the next layer and return its buffered response.
    fn send(
        &self,
        request: http::Request<TapBody>,
    ) -> BoxFuture<'_, Result<http::Response<Bytes>, TransportError>>;

    /// The handler this one wraps, or `None` for a transport.
    fn inner(&self) -> Option<&Arc<dyn Handler>> {
        None
    }

    /// The automatic cookie policy of the transport below this handler.
    fn cookie_policy(&self) -> Option<&CookiePolicy> {
        self.inner().and_then(|inner| inner.cookie_policy())
    }

    /// Abort every in-flight request of the transport below this handler.
    fn cancel_pending(&self) {
        if let Some(inner) = self.inner() {
            inner.cancel_pending();
        }
    }

    fn as_any(&self) -> &dyn Any;

    /// Name used in diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Whether a transport manages cookies itself.
///
/// When enabled, the transport stores `Set-Cookie` values and replays them.
/// When disabled, only the `Cookie` header on the request is sent.
#[derive(Debug)]
pub struct CookiePolicy {
    enabled: AtomicBool,
}

impl CookiePolicy {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

/// A layer that stamps a fixed header on every request.
///
/// A request that already carries the header keeps its own value.
pub struct HeaderHandler {
    name: HeaderName,
    value: HeaderValue,
    inner: Arc<dyn Handler>,
}

impl HeaderHandler {
    pub fn new(name: HeaderName, value: HeaderValue, inner: Arc<dyn Handler>) -> Self {
        Self { name, value, inner }
    }

    /// Create a header handler from strings, returning an error if invalid.
    pub fn try_new(name: &str, value: &str, inner: Arc<dyn Handler>) -> Result<Self, ClientError> {
        let name: HeaderName = name
            .parse()
            .map_err(|_| ClientError::InvalidHeader(name.to_owned()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ClientError::InvalidHeader(name.to_string()))?;
        Ok(Self::new(name, value, inner))
    }
}

impl std::fmt::Debug for HeaderHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderHandler")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("inner", &self.inner.name())
            .finish()
    }
}

impl Handler for HeaderHandler {
    fn send(
        &self,
        mut request: http::Request<TapBody>,
    ) -> BoxFuture<'_, Result<http::Response<Bytes>, TransportError>> {
        if !request.headers().contains_key(&self.name) {
            request
                .headers_mut()
                .insert(self.name.clone(), self.value.clone());
        }
        self.inner.send(request)
    }

    fn inner(&self) -> Option<&Arc<dyn Handler>> {
        Some(&self.inner)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The interceptor anchoring a client's handler chain.
///
/// Every exchange passing through it runs inside an `http.exchange` span.
/// Cloning is cheap and clones share the same inner chain.
#[derive(Clone)]
pub struct TapInterceptor {
    inner: Arc<dyn Handler>,
}

impl TapInterceptor {
    pub fn new(inner: Arc<dyn Handler>) -> Self {
        Self { inner }
    }

    /// Turn off automatic cookie handling on the transport.
    ///
    /// Returns `false` when no handler below exposes a cookie policy.
    pub fn disable_cookies(&self) -> bool {
        self.set_use_cookies(false)
    }

    /// Switch automatic cookie handling on the transport.
    pub fn set_use_cookies(&self, enabled: bool) -> bool {
        match self.inner.cookie_policy() {
            Some(policy) => {
                policy.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// Current cookie policy of the transport, if it has one.
    pub fn use_cookies(&self) -> Option<bool> {
        self.inner.cookie_policy().map(CookiePolicy::is_enabled)
    }
}

impl std::fmt::Debug for TapInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapInterceptor")
            .field("inner", &self.inner.name())
            .finish()
    }
}

impl Handler for TapInterceptor {
    fn send(
        &self,
        request: http::Request<TapBody>,
    ) -> BoxFuture<'_, Result<http::Response<Bytes>, TransportError>> {
        let span = tracing::debug_span!(
            "http.exchange",
            method = %request.method(),
            uri = %request.uri(),
        );
        Box::pin(
            async move {
                let result = self.inner.send(request).await;
                match &result {
                    Ok(response) => {
                        tracing::debug!(status = response.status().as_u16(), "exchange completed")
                    }
                    Err(error) => tracing::debug!(%error, "exchange failed"),
                }
                result
            }
            .instrument(span),
        )
    }

    fn inner(&self) -> Option<&Arc<dyn Handler>> {
        Some(&self.inner)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
