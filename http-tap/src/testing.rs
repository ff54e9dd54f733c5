//! Test doubles for the handler chain.

use std::any::Any;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use http_body_util::BodyExt;

use crate::error::TransportError;
use crate::interceptor::{BoxFuture, CookiePolicy, Handler};
use crate::transport::TapBody;

type Responder = Box<dyn Fn() -> Result<http::Response<Bytes>, TransportError> + Send + Sync>;

/// A request as the transport received it.
#[derive(Clone, Debug)]
pub(crate) struct Captured {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Transport that records requests and answers from a closure.
pub(crate) struct MockTransport {
    respond: Responder,
    calls: Mutex<Vec<Captured>>,
    cookie_policy: CookiePolicy,
    cancels: AtomicUsize,
}

impl MockTransport {
    pub(crate) fn new<F>(respond: F) -> Self
    where
        F: Fn() -> Result<http::Response<Bytes>, TransportError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
            cookie_policy: CookiePolicy::default(),
            cancels: AtomicUsize::new(0),
        }
    }

    /// Always answer `status` with a text body.
    pub(crate) fn ok(status: u16, body: &'static str) -> Self {
        Self::new(move || {
            Ok(http::Response::builder()
                .status(status)
                .header("content-type", "text/plain")
                .body(Bytes::from_static(body.as_bytes()))
                .unwrap())
        })
    }

    /// Always fail with the error built by `error`.
    pub(crate) fn failing<F>(error: F) -> Self
    where
        F: Fn() -> TransportError + Send + Sync + 'static,
    {
        Self::new(move || Err(error()))
    }

    pub(crate) fn calls(&self) -> Vec<Captured> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub(crate) fn use_cookies(&self) -> bool {
        self.cookie_policy.is_enabled()
    }
}

impl Handler for MockTransport {
    fn send(
        &self,
        request: http::Request<TapBody>,
    ) -> BoxFuture<'_, Result<http::Response<Bytes>, TransportError>> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let body = body.collect().await.unwrap().to_bytes();
            self.calls.lock().unwrap().push(Captured {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            });
            (self.respond)()
        })
    }

    fn cookie_policy(&self) -> Option<&CookiePolicy> {
        Some(&self.cookie_policy)
    }

    fn cancel_pending(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
