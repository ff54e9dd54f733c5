//! Request log record.
//!
//! A [`RequestLog`] is a read-only snapshot of one completed exchange,
//! assembled from a response and the request recorded on it.

use chrono::NaiveDateTime;
use http::HeaderMap;
use serde::{Serialize, Serializer};

use crate::error::is_synthetic_status;
use crate::timing::{TIMESTAMP_FORMAT, Timing};

/// Snapshot of one HTTP exchange for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLog {
    /// Instant just before dispatch.
    #[serde(serialize_with = "serialize_timestamp")]
    pub start_time: NaiveDateTime,
    /// Instant just after dispatch returned or failed.
    #[serde(serialize_with = "serialize_timestamp")]
    pub end_time: NaiveDateTime,
    /// `scheme://authority` of the requested URI.
    pub request_url: String,
    /// Request method, e.g. `GET`.
    pub method: String,
    pub request_headers: Vec<(String, String)>,
    /// Query string with its leading `?`, or empty.
    pub request_query: String,
    /// Request body, or the flattened read error if it could not be read.
    pub request_body: Option<String>,
    pub response_headers: Vec<(String, String)>,
    /// Response body, or the flattened read error if it could not be read.
    pub response_body: Option<String>,
    pub response_status_code: u16,
    pub response_reason_phrase: Option<String>,
}

impl RequestLog {
    /// The exchange's start and end instants.
    pub fn timing(&self) -> Timing {
        Timing::new(self.start_time, self.end_time)
    }

    /// Time the request took, in milliseconds.
    pub fn time_consuming_ms(&self) -> i64 {
        self.timing().elapsed_ms()
    }

    /// Whether the response was fabricated for a transport failure.
    pub fn is_synthetic(&self) -> bool {
        is_synthetic_status(self.response_status_code)
    }
}

fn serialize_timestamp<S>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
}

/// Flatten a header map into `(name, value)` pairs for logging.
///
/// Names keep their first-seen order. Repeated values of one name are
/// joined with `", "`; values that are not UTF-8 are decoded lossily.
pub fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .keys()
        .map(|name| {
            let value = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            (name.as_str().to_owned(), value)
        })
        .collect()
}
