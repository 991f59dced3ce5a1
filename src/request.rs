//! Incoming HTTP request type.
//!
//! Besides the parsed request line, headers and body, a [`Request`] carries
//! what the router learned about it (the matched route pattern and its path
//! parameters) and a small string-keyed store of per-request values that
//! middleware hands down to handlers.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use http::{Method, Uri};

use crate::error::Error;

type Local = Box<dyn Any + Send + Sync>;

/// An incoming HTTP request.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) route: Option<String>,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) locals: HashMap<String, Local>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        uri: Uri,
        headers: Vec<(String, String)>,
        body: Bytes,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            params: HashMap::new(),
            route: None,
            remote_addr,
            locals: HashMap::new(),
        }
    }

    /// Builds a request by hand, for tests or for embedding tsu behind
    /// another transport.
    ///
    /// ```rust
    /// use tsu_otel::Request;
    ///
    /// let req = Request::builder()
    ///     .method(http::Method::POST)
    ///     .uri("/users?notify=1")
    ///     .header("content-type", "application/json")
    ///     .body(r#"{"name":"alice"}"#)
    ///     .unwrap();
    /// assert_eq!(req.target(), "/users?notify=1");
    /// ```
    pub fn builder() -> RequestBuilder {
        RequestBuilder {
            method: Method::GET,
            uri: Ok(Uri::from_static("/")),
            headers: Vec::new(),
            remote_addr: None,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// The request target as it appeared on the request line: path plus
    /// query, without scheme or authority.
    pub fn target(&self) -> &str {
        self.uri.path_and_query().map_or_else(|| self.uri.path(), |pq| pq.as_str())
    }

    /// The route pattern this request matched (e.g. `/users/{id}`), or
    /// `None` when no route matched.
    pub fn route(&self) -> Option<&str> { self.route.as_deref() }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// `X-Forwarded-Proto` when the proxy in front of us set it, `http`
    /// otherwise. tsu never terminates TLS itself.
    pub fn scheme(&self) -> &str {
        self.header("x-forwarded-proto")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| self.uri.scheme_str())
            .unwrap_or("http")
    }

    /// The `Host` header, or the URI authority for HTTP/2 requests.
    pub fn host(&self) -> Option<&str> {
        self.header("host")
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
    }

    /// The full URL the client asked for, rebuilt from scheme, host and
    /// target.
    pub fn url(&self) -> String {
        match self.host() {
            Some(host) => format!("{}://{}{}", self.scheme(), host, self.target()),
            None => self.target().to_owned(),
        }
    }

    pub fn user_agent(&self) -> Option<&str> { self.header("user-agent") }

    /// The declared `Content-Length`, if present and well formed.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.trim().parse().ok()
    }

    /// Address of the peer on the other end of the socket. Behind a reverse
    /// proxy this is the proxy.
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// The originating client according to the first `X-Forwarded-For` hop.
    pub fn client_ip(&self) -> Option<IpAddr> {
        let forwarded = self.header("x-forwarded-for")?;
        forwarded.split(',').next()?.trim().parse().ok()
    }

    /// Stores a value under `key` for the rest of this request.
    pub fn set_local<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.locals.insert(key.into(), Box::new(value));
    }

    /// Reads a value stored with [`set_local`](Request::set_local). `None`
    /// when the key is absent or holds a different type.
    pub fn local<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.locals.get(key)?.downcast_ref()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("route", &self.route)
            .field("remote_addr", &self.remote_addr)
            .finish_non_exhaustive()
    }
}

// ── RequestBuilder ────────────────────────────────────────────────────────────

/// Fluent builder for [`Request`]. Obtain via [`Request::builder()`].
pub struct RequestBuilder {
    method: Method,
    uri: Result<Uri, http::uri::InvalidUri>,
    headers: Vec<(String, String)>,
    remote_addr: Option<SocketAddr>,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = uri.parse();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Terminate with a body. Fails only if the URI did not parse.
    pub fn body(self, body: impl Into<Bytes>) -> Result<Request, Error> {
        Ok(Request::new(self.method, self.uri?, self.headers, body.into(), self.remote_addr))
    }

    /// Terminate with an empty body.
    pub fn build(self) -> Result<Request, Error> {
        self.body(Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_rebuilt_from_forwarded_scheme_and_host() {
        let req = Request::builder()
            .uri("/users/42?expand=teams")
            .header("Host", "api.example.com")
            .header("X-Forwarded-Proto", "https")
            .build()
            .unwrap();

        assert_eq!(req.target(), "/users/42?expand=teams");
        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.scheme(), "https");
        assert_eq!(req.url(), "https://api.example.com/users/42?expand=teams");
    }

    #[test]
    fn url_without_host_is_just_the_target() {
        let req = Request::builder().uri("/healthz").build().unwrap();
        assert_eq!(req.scheme(), "http");
        assert_eq!(req.url(), "/healthz");
    }

    #[test]
    fn client_ip_takes_the_first_forwarded_hop() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.2")
            .remote_addr("10.0.0.2:51000".parse().unwrap())
            .build()
            .unwrap();

        assert_eq!(req.client_ip(), Some("203.0.113.7".parse().unwrap()));
        assert_eq!(req.remote_addr().map(|a| a.ip()), Some("10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn content_length_ignores_garbage() {
        let ok = Request::builder().header("content-length", "12").build().unwrap();
        let bad = Request::builder().header("content-length", "twelve").build().unwrap();
        assert_eq!(ok.content_length(), Some(12));
        assert_eq!(bad.content_length(), None);
    }

    #[test]
    fn locals_are_typed() {
        let mut req = Request::builder().build().unwrap();
        req.set_local("tenant", 7_u32);

        assert_eq!(req.local::<u32>("tenant"), Some(&7));
        assert_eq!(req.local::<String>("tenant"), None);
        assert_eq!(req.local::<u32>("missing"), None);
    }

    #[test]
    fn invalid_uri_is_reported_at_build_time() {
        let err = Request::builder().uri("/users/ 42").build().unwrap_err();
        assert!(matches!(err, Error::InvalidUri(_)));
    }
}
