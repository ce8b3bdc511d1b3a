use http::{
    HeaderMap, HeaderValue, Request, Response,
    header::{COOKIE, SET_COOKIE},
    request, response,
};

use crate::errors::SessionError;
use crate::session::Cookie;

// -----------------------------------------------------------------------------
// ----- CookieSource ----------------------------------------------------------

/// Anything carrying request headers a session cookie can be read from.
pub trait CookieSource {
    fn cookie_headers(&self) -> &HeaderMap;

    fn cookie(&self, name: &str) -> Option<String> {
        find_cookie(self.cookie_headers(), name)
    }
}

impl CookieSource for HeaderMap {
    fn cookie_headers(&self) -> &HeaderMap {
        self
    }
}

impl<B> CookieSource for Request<B> {
    fn cookie_headers(&self) -> &HeaderMap {
        self.headers()
    }
}

impl CookieSource for request::Parts {
    fn cookie_headers(&self) -> &HeaderMap {
        &self.headers
    }
}

// -----------------------------------------------------------------------------
// ----- CookieSink ------------------------------------------------------------

/// Anything carrying response headers a `Set-Cookie` can be appended to.
pub trait CookieSink {
    fn cookie_headers_mut(&mut self) -> &mut HeaderMap;

    fn append_set_cookie(&mut self, value: HeaderValue) {
        self.cookie_headers_mut().append(SET_COOKIE, value);
    }
}

impl CookieSink for HeaderMap {
    fn cookie_headers_mut(&mut self) -> &mut HeaderMap {
        self
    }
}

impl<B> CookieSink for Response<B> {
    fn cookie_headers_mut(&mut self) -> &mut HeaderMap {
        self.headers_mut()
    }
}

impl CookieSink for response::Parts {
    fn cookie_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}

// -----------------------------------------------------------------------------
// ----- Helpers ---------------------------------------------------------------

/// First value of the named cookie across every `Cookie` header. Surrounding
/// double quotes are stripped.
pub fn find_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| {
            let value = value.trim();
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value)
                .to_string()
        })
}

pub fn set_cookie_value(cookie: &Cookie) -> Result<HeaderValue, SessionError> {
    let invalid = || SessionError::InvalidCookie {
        name: cookie.name.clone(),
    };

    if !cookie.is_valid() {
        return Err(invalid());
    }
    HeaderValue::from_str(&cookie.to_string()).map_err(|_| invalid())
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
