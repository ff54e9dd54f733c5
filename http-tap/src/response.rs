//! Responses and the requests recorded on them.

use http::{HeaderMap, HeaderName, Method, StatusCode, Uri};
use http_tap_core::{SYNTHETIC_STATUS, Timing, is_synthetic_status};

use bytes::Bytes;

use crate::content::Content;
use crate::error::BodyError;

/// The request of a completed exchange, as the caller issued it.
#[derive(Debug)]
pub struct RecordedRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    content: Option<Content>,
}

impl RecordedRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, content: Option<Content>) -> Self {
        Self {
            method,
            uri,
            headers,
            content,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The URI the caller asked for, before any rewriting by the transport.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request headers, excluding content headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The caller's original content.
    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }
}

/// The outcome of one exchange.
///
/// Every send returns one of these. A transport failure yields a
/// synthetic response with status 600 and the failure's message chain as
/// the reason phrase.
#[derive(Debug)]
pub struct TapResponse {
    status: u16,
    reason: Option<String>,
    headers: HeaderMap,
    content: Option<Content>,
    request: Option<RecordedRequest>,
    timing: Option<Timing>,
}

impl TapResponse {
    /// Wrap a buffered transport response.
    ///
    /// The reason phrase is the one sent on the wire when it differs from the
    /// canonical one. `content-*` headers are also copied onto the content.
    pub fn from_http(response: http::Response<Bytes>) -> Self {
        let (parts, body) = response.into_parts();
        let reason = parts
            .extensions
            .get::<hyper::ext::ReasonPhrase>()
            .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
            .or_else(|| parts.status.canonical_reason())
            .map(str::to_owned);

        let mut content = Content::bytes(body);
        for (name, value) in parts.headers.iter().filter(|(name, _)| is_content_header(name)) {
            content.headers_mut().append(name.clone(), value.clone());
        }

        Self {
            status: parts.status.as_u16(),
            reason,
            headers: parts.headers,
            content: Some(content),
            request: None,
            timing: None,
        }
    }

    /// A response standing in for a failed exchange.
    pub fn synthetic(reason: String, request: Option<RecordedRequest>) -> Self {
        Self {
            status: SYNTHETIC_STATUS,
            reason: Some(reason),
            headers: HeaderMap::new(),
            content: None,
            request,
            timing: None,
        }
    }

    /// Numeric status, 600 for synthetic responses.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status).ok()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether this response was fabricated for a transport failure.
    pub fn is_synthetic(&self) -> bool {
        is_synthetic_status(self.status)
    }

    pub fn reason_phrase(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    /// The recorded request, present on every response from a client.
    pub fn request(&self) -> Option<&RecordedRequest> {
        self.request.as_ref()
    }

    pub fn set_request(&mut self, request: RecordedRequest) {
        self.request = Some(request);
    }

    /// Record the exchange's timing, writing the side-channel headers.
    pub fn set_timing(&mut self, timing: Timing) {
        timing.attach(&mut self.headers);
        self.timing = Some(timing);
    }

    /// The exchange's timing, recovered from the headers if never set.
    pub fn timing(&self) -> Timing {
        self.timing
            .unwrap_or_else(|| Timing::from_headers(&self.headers))
    }

    /// The body as text; empty when there is no content.
    pub async fn text(&self) -> Result<String, BodyError> {
        match &self.content {
            Some(content) => content.read_string().await,
            None => Ok(String::new()),
        }
    }
}

fn is_content_header(name: &HeaderName) -> bool {
    name.as_str().starts_with("content-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CONTENT_TYPE, SERVER};
    use http_tap_core::{BEGIN_TIME_HEADER, END_TIME_HEADER, zero_timestamp};

    #[tokio::test]
    async fn test_from_http() {
        let response = http::Response::builder()
            .status(404)
            .header(CONTENT_TYPE, "text/plain")
            .header(SERVER, "test")
            .body(Bytes::from_static(b"missing"))
            .unwrap();

        let response = TapResponse::from_http(response);
        assert_eq!(response.status(), 404);
        assert_eq!(response.status_code(), Some(StatusCode::NOT_FOUND));
        assert_eq!(response.reason_phrase(), Some("Not Found"));
        assert!(!response.is_success());
        assert!(!response.is_synthetic());
        assert_eq!(response.text().await.unwrap(), "missing");

        let content = response.content().unwrap();
        assert_eq!(content.headers()[CONTENT_TYPE], "text/plain");
        assert!(!content.headers().contains_key(SERVER));
        assert_eq!(response.headers()[SERVER], "test");
    }

    #[tokio::test]
    async fn test_synthetic() {
        let response = TapResponse::synthetic("boom；refused".into(), None);
        assert_eq!(response.status(), 600);
        assert!(response.is_synthetic());
        assert_eq!(response.reason_phrase(), Some("boom；refused"));
        assert!(response.content().is_none());
        assert_eq!(response.text().await.unwrap(), "");
    }

    #[test]
    fn test_set_timing_writes_headers() {
        let mut response = TapResponse::synthetic("x".into(), None);
        assert_eq!(response.timing().start(), zero_timestamp());

        let timing = Timing::instant();
        response.set_timing(timing);
        assert_eq!(response.timing(), timing);
        assert!(response.headers().contains_key(BEGIN_TIME_HEADER));
        assert!(response.headers().contains_key(END_TIME_HEADER));
    }
}
