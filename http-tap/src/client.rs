//! The instrumented client.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::COOKIE;
use http::{HeaderMap, HeaderValue, Method, Uri};
use http_body_util::Full;
use http_tap_core::{Timing, flatten_messages};
use url::Url;

use crate::builder::ClientBuilder;
use crate::content::Content;
use crate::error::{ClientError, TransportError};
use crate::interceptor::{Handler, TapInterceptor};
use crate::normalize::normalize;
use crate::preserve::preserve;
use crate::response::{RecordedRequest, TapResponse};
use crate::timing::timed;

/// HTTP client whose every exchange is timed and recorded.
///
/// Each call returns a [`TapResponse`]. A request that fails in transport
/// still returns one, with status 600 and the failure's messages as its
/// reason phrase. Every response carries `begin-time` and `end-time`
/// headers and the request as the caller issued it.
///
/// Cloning is cheap; clones share the handler chain and its connections.
///
/// # Example
///
/// ```ignore
/// use http_tap::{Content, TapClient};
///
/// let client = TapClient::builder().build()?;
///
/// let response = client.get("http://localhost:3000/Home/TestGet?name=test", None).await?;
/// let log = response.request_log(true, true).await;
/// println!("{} took {} ms", log.request_url, log.time_consuming_ms());
///
/// let body = Content::json(&serde_json::json!({"name": "test"}))?;
/// let response = client.post("http://localhost:3000/Home/TestPost", Some(body), Some("sid=abc")).await?;
/// ```
#[derive(Clone)]
pub struct TapClient {
    root: Arc<dyn Handler>,
    interceptor: TapInterceptor,
    base_url: Option<Url>,
    default_headers: HeaderMap,
    timeout: Duration,
    max_response_buffer_size: usize,
}

impl std::fmt::Debug for TapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapClient")
            .field("root", &self.root.name())
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .field("max_response_buffer_size", &self.max_response_buffer_size)
            .finish()
    }
}

impl TapClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn new(
        root: Arc<dyn Handler>,
        interceptor: TapInterceptor,
        base_url: Option<Url>,
        default_headers: HeaderMap,
        timeout: Duration,
        max_response_buffer_size: usize,
    ) -> Self {
        Self {
            root,
            interceptor,
            base_url,
            default_headers,
            timeout,
            max_response_buffer_size,
        }
    }

    /// Base address relative URLs are resolved against.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_ref().map(Url::as_str)
    }

    /// Headers added to every request that does not carry them.
    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_response_buffer_size(&self) -> usize {
        self.max_response_buffer_size
    }

    /// The interceptor located in the handler chain.
    pub fn interceptor(&self) -> &TapInterceptor {
        &self.interceptor
    }

    /// Abort every exchange currently in flight on this client's transport.
    ///
    /// Aborted exchanges return synthetic responses. Later calls are not
    /// affected.
    pub fn cancel_pending_requests(&self) {
        self.root.cancel_pending();
    }

    /// Send a GET request, with `cookie` as its `Cookie` header if not blank.
    pub async fn get(&self, url: &str, cookie: Option<&str>) -> Result<TapResponse, ClientError> {
        self.send(Method::GET, url, None, cookie).await
    }

    /// Send a POST request with an optional body.
    ///
    /// The body stays readable afterwards through the response's recorded
    /// request, even when it was a stream.
    pub async fn post(
        &self,
        url: &str,
        content: Option<Content>,
        cookie: Option<&str>,
    ) -> Result<TapResponse, ClientError> {
        self.send(Method::POST, url, content, cookie).await
    }

    /// Send a request through the handler chain.
    ///
    /// Only an unusable URL or cookie is returned as `Err`.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        content: Option<Content>,
        cookie: Option<&str>,
    ) -> Result<TapResponse, ClientError> {
        let uri = self.resolve_uri(url)?;

        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie.filter(|cookie| !cookie.trim().is_empty()) {
            let value = HeaderValue::from_str(cookie)
                .map_err(|_| ClientError::InvalidHeader(COOKIE.to_string()))?;
            headers.insert(COOKIE, value);
        }
        let content_headers = content.as_ref().map(Content::headers);
        for name in self.default_headers.keys() {
            let carried = headers.contains_key(name)
                || content_headers.is_some_and(|content| content.contains_key(name));
            if !carried {
                for value in self.default_headers.get_all(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        }

        // Cookies go only through the header set above.
        self.interceptor.disable_cookies();

        let (result, timing) = self
            .dispatch(&method, &uri, &headers, content.as_ref())
            .await;
        let mut response = match result {
            Ok(response) => TapResponse::from_http(response),
            Err(error) => {
                tracing::warn!(
                    %method,
                    %uri,
                    error = %flatten_messages(&error),
                    "request failed, returning a synthetic response"
                );
                normalize(&error, None)
            }
        };
        tracing::trace!(
            status = response.status(),
            elapsed_ms = timing.elapsed_ms(),
            "exchange finished"
        );

        response.set_timing(timing);
        response.set_request(RecordedRequest::new(method, uri, headers, content));
        Ok(response)
    }

    async fn dispatch(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        content: Option<&Content>,
    ) -> (Result<http::Response<Bytes>, TransportError>, Timing) {
        let (content_headers, body) = match content {
            Some(content) => match preserve(content).await {
                Ok(copy) => copy.into_buffered().unwrap_or_default(),
                Err(error) => return (Err(TransportError::RequestBody(error)), Timing::instant()),
            },
            None => (HeaderMap::new(), Bytes::new()),
        };

        let mut request = http::Request::new(Full::new(body));
        *request.method_mut() = method.clone();
        *request.uri_mut() = uri.clone();
        *request.headers_mut() = headers.clone();
        for (name, value) in &content_headers {
            request.headers_mut().append(name.clone(), value.clone());
        }

        timed(self.root.send(request)).await
    }

    /// Parse `url`, resolving it against the base address when relative.
    fn resolve_uri(&self, url: &str) -> Result<Uri, ClientError> {
        let url = url.trim();
        let invalid = |reason: String| ClientError::InvalidUrl {
            url: url.to_owned(),
            reason,
        };

        let mut resolved = match Url::parse(url) {
            Ok(absolute) => absolute,
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base_url
                .as_ref()
                .ok_or_else(|| invalid("relative url without a base address".to_owned()))?
                .join(url)
                .map_err(|e| invalid(e.to_string()))?,
            Err(e) => return Err(invalid(e.to_string())),
        };

        if !matches!(resolved.scheme(), "http" | "https") {
            return Err(ClientError::UnsupportedScheme(resolved.scheme().to_owned()));
        }
        if resolved.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host".to_owned()));
        }
        resolved.set_fragment(None);
        resolved.as_str().parse().map_err(|e| invalid(format!("{e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::testing::MockTransport;
    use futures::stream;
    use http::header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
    use http_tap_core::{BEGIN_TIME_HEADER, END_TIME_HEADER, parse_timestamp};

    fn client_with(mock: &Arc<MockTransport>) -> TapClient {
        TapClient::builder()
            .handler_chain(Arc::new(TapInterceptor::new(mock.clone())))
            .build()
            .unwrap()
    }

    fn assert_timed(response: &TapResponse) {
        let begin = response.headers()[BEGIN_TIME_HEADER].to_str().unwrap();
        let end = response.headers()[END_TIME_HEADER].to_str().unwrap();
        let begin = parse_timestamp(begin).unwrap();
        let end = parse_timestamp(end).unwrap();
        assert!(end >= begin);
    }

    #[test]
    fn test_resolve_uri() {
        let mock = Arc::new(MockTransport::ok(200, ""));
        let client = TapClient::builder()
            .base_url("http://h/api/")
            .handler_chain(Arc::new(TapInterceptor::new(mock)))
            .build()
            .unwrap();

        assert_eq!(client.resolve_uri("https://other/x").unwrap(), "https://other/x");
        assert_eq!(client.resolve_uri("users").unwrap(), "http://h/api/users");
        assert_eq!(
            client.resolve_uri("users?next=http://x/y").unwrap(),
            "http://h/api/users?next=http://x/y"
        );
        assert_eq!(client.resolve_uri("../v2/users").unwrap(), "http://h/v2/users");
        assert_eq!(client.resolve_uri("/root").unwrap(), "http://h/root");
        assert_eq!(client.resolve_uri("?q=1").unwrap(), "http://h/api/?q=1");
        assert_eq!(client.resolve_uri("//other/x").unwrap(), "http://other/x");
        assert_eq!(client.resolve_uri("HTTP://h/a#top").unwrap(), "http://h/a");
        assert!(matches!(
            client.resolve_uri("ftp://h/file"),
            Err(ClientError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
    }

    #[tokio::test]
    async fn test_relative_url_without_base() {
        let mock = Arc::new(MockTransport::ok(200, ""));
        let err = client_with(&mock).get("Home/TestGet", None).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { .. }));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_records_exchange() {
        let mock = Arc::new(MockTransport::ok(200, "ok"));
        let client = client_with(&mock);

        let response = client
            .get("http://h/Home/TestGet?name=test", None)
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "ok");
        assert_timed(&response);

        let request = response.request().unwrap();
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.uri(), "http://h/Home/TestGet?name=test");
        assert!(request.content().is_none());
        assert!(!request.headers().contains_key(COOKIE));
    }

    #[tokio::test]
    async fn test_cookie_header_and_policy() {
        let mock = Arc::new(MockTransport::ok(200, ""));
        let client = client_with(&mock);
        assert!(mock.use_cookies());

        client.get("http://h/", Some("sid=abc; lang=en")).await.unwrap();
        client.get("http://h/", Some("   ")).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].headers[COOKIE], "sid=abc; lang=en");
        assert!(!calls[1].headers.contains_key(COOKIE));
        assert!(!mock.use_cookies());
    }

    #[tokio::test]
    async fn test_invalid_cookie() {
        let mock = Arc::new(MockTransport::ok(200, ""));
        let err = client_with(&mock)
            .get("http://h/", Some("bad\ncookie"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidHeader(name) if name == "cookie"));
    }

    #[tokio::test]
    async fn test_default_headers_merge() {
        let mock = Arc::new(MockTransport::ok(200, ""));
        let client = TapClient::builder()
            .default_header(USER_AGENT, HeaderValue::from_static("http-tap"))
            .default_header(COOKIE, HeaderValue::from_static("default=1"))
            .handler_chain(Arc::new(TapInterceptor::new(mock.clone())))
            .build()
            .unwrap();

        let response = client.get("http://h/", Some("sid=abc")).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].headers[USER_AGENT], "http-tap");
        let cookies: Vec<_> = calls[0].headers.get_all(COOKIE).iter().collect();
        assert_eq!(cookies, ["sid=abc"]);
        assert_eq!(response.request().unwrap().headers()[USER_AGENT], "http-tap");
    }

    #[tokio::test]
    async fn test_default_header_yields_to_content_header() {
        let mock = Arc::new(MockTransport::ok(200, ""));
        let client = TapClient::builder()
            .default_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .handler_chain(Arc::new(TapInterceptor::new(mock.clone())))
            .build()
            .unwrap();

        let body = Content::json(&serde_json::json!({"name": "test"})).unwrap();
        client.post("http://h/api", Some(body), None).await.unwrap();
        client.get("http://h/api", None).await.unwrap();

        let calls = mock.calls();
        let types: Vec<_> = calls[0].headers.get_all(CONTENT_TYPE).iter().collect();
        assert_eq!(types, ["application/json; charset=utf-8"]);
        assert_eq!(calls[1].headers[CONTENT_TYPE], "text/plain");
    }

    #[tokio::test]
    async fn test_post_sends_copy_and_keeps_original() {
        let mock = Arc::new(MockTransport::ok(201, ""));
        let client = client_with(&mock);

        let items: Vec<Result<Bytes, BoxError>> =
            vec![Ok(Bytes::from_static(b"{\"name\":")), Ok(Bytes::from_static(b"\"test\"}"))];
        let body = Content::stream(stream::iter(items)).header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );

        let response = client.post("http://h/api", Some(body), None).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].method, Method::POST);
        assert_eq!(calls[0].body, r#"{"name":"test"}"#);
        assert_eq!(calls[0].headers[CONTENT_LENGTH], "15");
        assert_eq!(calls[0].headers[CONTENT_TYPE], "application/json; charset=utf-8");

        let original = response.request().unwrap().content().unwrap();
        assert_eq!(original.read_string().await.unwrap(), r#"{"name":"test"}"#);
        assert!(!original.headers().contains_key(CONTENT_LENGTH));
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_synthetic() {
        let mock = Arc::new(MockTransport::failing(|| {
            let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
            TransportError::Send(Box::new(io))
        }));
        let client = client_with(&mock);
        let body = Content::json(&serde_json::json!({"name": "test"})).unwrap();

        let response = client.post("http://h/api", Some(body), None).await.unwrap();

        assert_eq!(response.status(), 600);
        assert!(response.is_synthetic());
        assert_eq!(
            response.reason_phrase(),
            Some("an error occurred while sending the request；connection refused")
        );
        assert_timed(&response);

        let request = response.request().unwrap();
        assert_eq!(request.uri(), "http://h/api");
        let original = request.content().unwrap();
        assert_eq!(original.read_string().await.unwrap(), r#"{"name":"test"}"#);
    }

    #[tokio::test]
    async fn test_consumed_body_becomes_synthetic() {
        let mock = Arc::new(MockTransport::ok(200, ""));
        let client = client_with(&mock);
        let body = Content::text("once");
        let _ = body.take_stream().await.unwrap();

        let response = client.post("http://h/api", Some(body), None).await.unwrap();

        assert_eq!(response.status(), 600);
        assert!(response
            .reason_phrase()
            .unwrap()
            .starts_with("failed to buffer the request content；"));
        assert!(mock.calls().is_empty());
        assert_eq!(response.timing().elapsed_ms(), 0);
    }

    #[tokio::test]
    async fn test_timing_headers_replace_server_values() {
        let mock = Arc::new(MockTransport::new(|| {
            http::Response::builder()
                .header(BEGIN_TIME_HEADER, "1999-01-01 00:00:00.000")
                .body(Bytes::new())
                .map_err(|e| TransportError::Send(Box::new(e)))
        }));
        let response = client_with(&mock).get("http://h/", None).await.unwrap();

        assert_eq!(response.headers().get_all(BEGIN_TIME_HEADER).iter().count(), 1);
        assert_ne!(response.headers()[BEGIN_TIME_HEADER], "1999-01-01 00:00:00.000");
        assert_eq!(response.timing(), Timing::from_headers(response.headers()));
    }

    #[test]
    fn test_cancel_pending_requests() {
        let mock = Arc::new(MockTransport::ok(200, ""));
        let client = client_with(&mock);
        client.cancel_pending_requests();
        client.clone().cancel_pending_requests();
        assert_eq!(mock.cancels(), 2);
    }
}
