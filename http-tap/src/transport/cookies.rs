//! Cookie store used while automatic cookies are enabled.

use std::sync::{PoisonError, RwLock};

use http::header::SET_COOKIE;
use http::{HeaderMap, HeaderValue};
use url::Url;

/// Cookies received by a transport, scoped by domain, path and expiry.
#[derive(Debug, Default)]
pub(crate) struct CookieJar(RwLock<cookie_store::CookieStore>);

impl CookieJar {
    /// Record every `Set-Cookie` header of a response from `url`.
    ///
    /// Unparseable values are skipped. An already expired cookie removes the
    /// stored one of the same name.
    pub(crate) fn store(&self, url: &Url, headers: &HeaderMap) {
        let cookies: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| cookie::Cookie::parse(value).ok())
            .map(cookie::Cookie::into_owned)
            .collect();
        if cookies.is_empty() {
            return;
        }

        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .store_response_cookies(cookies.into_iter(), url);
    }

    /// The `Cookie` header value to send to `url`, if any cookie matches.
    pub(crate) fn header_for(&self, url: &Url) -> Option<HeaderValue> {
        let store = self.0.read().unwrap_or_else(PoisonError::into_inner);
        let joined = store
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if joined.is_empty() {
            return None;
        }
        HeaderValue::from_str(&joined).ok()
    }
}
