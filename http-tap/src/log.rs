//! Assembling request logs from responses.

use http_tap_core::{
    BEGIN_TIME_HEADER, END_TIME_HEADER, RequestLog, flatten_messages, header_pairs,
    timestamp_header,
};

use crate::content::Content;
use crate::response::TapResponse;

impl TapResponse {
    /// Snapshot this exchange as a [`RequestLog`].
    ///
    /// See [`build_log`].
    pub async fn request_log(&self, include_request_body: bool, include_response_body: bool) -> RequestLog {
        build_log(self, include_request_body, include_response_body).await
    }
}

/// Assemble the log of a completed exchange.
///
/// Start and end come from the `begin-time` / `end-time` headers, each
/// defaulting to the zero timestamp when missing or malformed. Request
/// fields come from the recorded request and are empty without one.
/// A body is `None` when it is absent or not requested; a body that cannot
/// be read is logged as its flattened error. This never fails.
pub async fn build_log(
    response: &TapResponse,
    include_request_body: bool,
    include_response_body: bool,
) -> RequestLog {
    let headers = response.headers();
    let request = response.request();

    let (request_url, method, request_query, request_headers) = match request {
        Some(request) => {
            let uri = request.uri();
            let url = match (uri.scheme_str(), uri.authority()) {
                (Some(scheme), Some(authority)) => format!("{scheme}://{authority}"),
                _ => String::new(),
            };
            let query = uri.query().map(|q| format!("?{q}")).unwrap_or_default();
            (url, request.method().to_string(), query, header_pairs(request.headers()))
        }
        None => Default::default(),
    };

    let request_body = match request.and_then(|request| request.content()) {
        Some(content) if include_request_body => Some(read_body(content).await),
        _ => None,
    };
    let response_body = match response.content() {
        Some(content) if include_response_body => Some(read_body(content).await),
        _ => None,
    };

    RequestLog {
        start_time: timestamp_header(headers, BEGIN_TIME_HEADER),
        end_time: timestamp_header(headers, END_TIME_HEADER),
        request_url,
        method,
        request_headers,
        request_query,
        request_body,
        response_headers: header_pairs(headers),
        response_body,
        response_status_code: response.status(),
        response_reason_phrase: response.reason_phrase().map(str::to_owned),
    }
}

async fn read_body(content: &Content) -> String {
    match content.read_string().await {
        Ok(text) => text,
        Err(error) => flatten_messages(&error),
    }
}
