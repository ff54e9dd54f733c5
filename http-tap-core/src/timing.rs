//! Timing side channel.
//!
//! The start and end of every exchange travel on the response as two
//! headers, `begin-time` and `end-time`, each holding a local timestamp
//! formatted as `YYYY-MM-DD HH:mm:ss.fff`. The same values are available as
//! a typed [`Timing`].

use chrono::{Local, NaiveDateTime, SubsecRound};
use http::{HeaderMap, HeaderValue};

/// Header carrying the instant just before the request was dispatched.
pub const BEGIN_TIME_HEADER: &str = "begin-time";

/// Header carrying the instant just after dispatch returned or failed.
pub const END_TIME_HEADER: &str = "end-time";

/// `chrono` format of side-channel timestamps (millisecond precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Fallback formats accepted when parsing a side-channel value.
const LENIENT_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Error returned when a side-channel timestamp cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp `{0}`")]
pub struct TimestampError(pub String);

/// Current wall-clock time in the local zone.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// The value used when a timestamp is missing or unparsable.
pub fn zero_timestamp() -> NaiveDateTime {
    NaiveDateTime::default()
}

/// Format a timestamp for the side channel.
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a side-channel timestamp.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, TimestampError> {
    let value = value.trim();
    std::iter::once(TIMESTAMP_FORMAT)
        .chain(LENIENT_FORMATS)
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| TimestampError(value.to_owned()))
}

/// Read one side-channel header, defaulting to [`zero_timestamp`] when the
/// header is absent, not valid UTF-8 or not a timestamp.
pub fn timestamp_header(headers: &HeaderMap, name: &str) -> NaiveDateTime {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_timestamp(value).ok())
        .unwrap_or_else(zero_timestamp)
}

/// Start and end instants of one exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Timing {
    /// Create a timing from its two instants, truncated to milliseconds to
    /// match what the headers can carry.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start: start.trunc_subsecs(3),
            end: end.trunc_subsecs(3),
        }
    }

    /// A timing whose start and end are both now.
    pub fn instant() -> Self {
        let now = local_now();
        Self::new(now, now)
    }

    /// Recover a timing from side-channel headers.
    ///
    /// Each instant defaults to [`zero_timestamp`] on its own.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::new(
            timestamp_header(headers, BEGIN_TIME_HEADER),
            timestamp_header(headers, END_TIME_HEADER),
        )
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Elapsed milliseconds between start and end.
    pub fn elapsed_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }

    /// Write both instants onto `headers`, replacing any existing values.
    pub fn attach(&self, headers: &mut HeaderMap) {
        for (name, instant) in [(BEGIN_TIME_HEADER, self.start), (END_TIME_HEADER, self.end)] {
            // Formatted timestamps are plain ASCII.
            if let Ok(value) = HeaderValue::from_str(&format_timestamp(&instant)) {
                headers.insert(name, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(&at(8, 5, 3, 7)), "2024-03-09 08:05:03.007");
    }

    #[test]
    fn test_format_truncates_to_milliseconds() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_nano_opt(8, 5, 3, 7_999_999)
            .unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-09 08:05:03.007");
    }

    #[test]
    fn test_parse_timestamp_round_trip() {
        let ts = at(23, 59, 59, 999);
        assert_eq!(parse_timestamp(&format_timestamp(&ts)).unwrap(), ts);
    }

    #[test]
    fn test_parse_timestamp_lenient_forms() {
        assert_eq!(parse_timestamp("2024-03-09 08:05:03").unwrap(), at(8, 5, 3, 0));
        assert_eq!(
            parse_timestamp("2024-03-09T08:05:03.250").unwrap(),
            at(8, 5, 3, 250)
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert_eq!(err.to_string(), "invalid timestamp `yesterday`");
    }

    #[test]
    fn test_attach_and_recover() {
        let timing = Timing::new(at(8, 0, 0, 0), at(8, 0, 1, 500));
        let mut headers = HeaderMap::new();
        timing.attach(&mut headers);

        assert_eq!(headers[BEGIN_TIME_HEADER], "2024-03-09 08:00:00.000");
        assert_eq!(headers[END_TIME_HEADER], "2024-03-09 08:00:01.500");
        assert_eq!(Timing::from_headers(&headers), timing);
        assert_eq!(timing.elapsed_ms(), 1500);
    }

    #[test]
    fn test_attach_replaces_existing_values() {
        let mut headers = HeaderMap::new();
        headers.insert(BEGIN_TIME_HEADER, HeaderValue::from_static("bogus"));
        Timing::new(at(1, 0, 0, 0), at(1, 0, 0, 0)).attach(&mut headers);

        assert_eq!(headers.get_all(BEGIN_TIME_HEADER).iter().count(), 1);
        assert_eq!(headers[BEGIN_TIME_HEADER], "2024-03-09 01:00:00.000");
    }

    #[test]
    fn test_from_headers_defaults_each_side_independently() {
        let mut headers = HeaderMap::new();
        headers.insert(END_TIME_HEADER, HeaderValue::from_static("2024-03-09 08:00:00.000"));
        headers.insert(BEGIN_TIME_HEADER, HeaderValue::from_static("not a time"));

        let timing = Timing::from_headers(&headers);
        assert_eq!(timing.start(), zero_timestamp());
        assert_eq!(timing.end(), at(8, 0, 0, 0));
    }

    #[test]
    fn test_new_truncates_to_header_precision() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let timing = Timing::new(
            date.and_hms_nano_opt(8, 5, 3, 358_259_148).unwrap(),
            date.and_hms_nano_opt(8, 5, 3, 359_935_878).unwrap(),
        );
        assert_eq!(timing.start(), at(8, 5, 3, 358));
        assert_eq!(timing.end(), at(8, 5, 3, 359));
        assert_eq!(timing.elapsed_ms(), 1);

        let mut headers = HeaderMap::new();
        timing.attach(&mut headers);
        assert_eq!(Timing::from_headers(&headers), timing);
    }

    #[test]
    fn test_instant_has_zero_elapsed() {
        assert_eq!(Timing::instant().elapsed_ms(), 0);
    }
}
