//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use cookie::Cookie;
use http::header::{self, ToStrError};
use http::{HeaderMap, Method, Uri};

/// The `Cookie` header could not be read as text.
///
/// Individual malformed `name=value` pairs are not an error: they are skipped.
#[derive(Debug, thiserror::Error)]
#[error("unreadable cookie header: {0}")]
pub struct CookieHeaderError(#[from] ToStrError);

/// An incoming HTTP request with its body fully buffered.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Header lookup. Returns `None` when the header is absent or not
    /// visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns the first non-empty value of the cookie called `name`.
    ///
    /// Every `Cookie` header line is considered. A cookie present with an
    /// empty value counts as absent.
    pub fn cookie(&self, name: &str) -> Result<Option<String>, CookieHeaderError> {
        for line in self.headers.get_all(header::COOKIE) {
            let found = Cookie::split_parse(line.to_str()?)
                .filter_map(Result::ok)
                .find(|c| c.name() == name && !c.value().is_empty());
            if let Some(c) = found {
                return Ok(Some(c.value().to_owned()));
            }
        }
        Ok(None)
    }
}

/// Builds a request from an in-memory `http::Request`, e.g. for calling
/// [`Router::handle`](crate::Router::handle) directly.
impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::from_parts(parts, body)
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn with_cookies(lines: &[&[u8]]) -> Request {
        let mut req = http::Request::builder().uri("/a/b?x=1");
        for line in lines {
            req = req.header(header::COOKIE, HeaderValue::from_bytes(line).unwrap());
        }
        Request::from(req.body(Bytes::new()).unwrap())
    }

    #[test]
    fn uri_accessors() {
        let req = with_cookies(&[]);
        assert_eq!(req.path(), "/a/b");
        assert_eq!(req.query(), Some("x=1"));
        assert_eq!(*req.method(), Method::GET);
    }

    #[test]
    fn finds_cookie_among_others() {
        let req = with_cookies(&[b"theme=dark; sessionToken=abc; lang=en"]);
        assert_eq!(req.cookie("sessionToken").unwrap().as_deref(), Some("abc"));
        assert_eq!(req.cookie("missing").unwrap(), None);
    }

    #[test]
    fn empty_value_counts_as_absent() {
        let req = with_cookies(&[b"sessionToken="]);
        assert_eq!(req.cookie("sessionToken").unwrap(), None);
    }

    #[test]
    fn searches_every_cookie_line() {
        let req = with_cookies(&[b"theme=dark", b"sessionToken=xyz"]);
        assert_eq!(req.cookie("sessionToken").unwrap().as_deref(), Some("xyz"));
    }

    #[test]
    fn skips_malformed_pairs() {
        let req = with_cookies(&[b"garbage; =nope; sessionToken=ok"]);
        assert_eq!(req.cookie("sessionToken").unwrap().as_deref(), Some("ok"));
    }

    #[test]
    fn non_text_header_is_an_error() {
        let req = with_cookies(&[b"sessionToken=\xff\xfe"]);
        assert!(req.cookie("sessionToken").is_err());
    }
}
