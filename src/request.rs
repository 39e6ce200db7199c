//! Incoming HTTP request type.
//!
//! A [`Request`] is split in two: the immutable [`RequestHead`] (method, URI,
//! headers, body, peer address) shared behind an `Arc`, and the per-request
//! mutable parts (route params and typed extensions). Middleware that needs to
//! look at the request after handing it downstream keeps a clone of the head,
//! which costs one atomic increment.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri};

/// The read-only half of a request.
#[derive(Debug)]
pub struct RequestHead {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    peer: Option<SocketAddr>,
}

impl RequestHead {
    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// The connected peer. `None` for requests built in-process.
    pub fn peer_addr(&self) -> Option<SocketAddr> { self.peer }

    /// The path, without query string.
    pub fn path(&self) -> &str { self.uri.path() }

    /// The raw query string, if any.
    pub fn query(&self) -> Option<&str> { self.uri.query() }

    /// The URL as received: path plus query string.
    pub fn url(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    /// Case-insensitive header lookup. Returns the first value if the header
    /// repeats, `None` if it is absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// An incoming HTTP request.
///
/// Derefs to [`RequestHead`], so `req.path()`, `req.header("accept")` and
/// friends work directly.
#[derive(Debug)]
pub struct Request {
    head: Arc<RequestHead>,
    params: HashMap<String, String>,
    extensions: Extensions,
}

impl Request {
    pub(crate) fn new(parts: http::request::Parts, body: Bytes, peer: Option<SocketAddr>) -> Self {
        let head = RequestHead {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            peer,
        };
        Self { head: Arc::new(head), params: HashMap::new(), extensions: parts.extensions }
    }

    /// Builder for constructing a request without a network connection.
    ///
    /// ```rust
    /// use reqlog::Request;
    ///
    /// let req = Request::builder()
    ///     .method("POST")
    ///     .uri("/users?notify=true")
    ///     .header("content-type", "application/json")
    ///     .body(r#"{"name":"alice"}"#)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(req.path(), "/users");
    /// ```
    pub fn builder() -> RequestBuilder {
        RequestBuilder { inner: http::Request::builder(), body: Bytes::new(), peer: None }
    }

    /// A shared handle to the immutable half of this request.
    pub fn head(&self) -> Arc<RequestHead> { Arc::clone(&self.head) }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }
}

impl Deref for Request {
    type Target = RequestHead;

    fn deref(&self) -> &RequestHead { &self.head }
}

// ── RequestBuilder ────────────────────────────────────────────────────────────

/// Fluent builder for [`Request`]. Validation is delegated to
/// [`http::request::Builder`]; the first invalid part surfaces from
/// [`build`](RequestBuilder::build).
pub struct RequestBuilder {
    inner: http::request::Builder,
    body: Bytes,
    peer: Option<SocketAddr>,
}

impl RequestBuilder {
    pub fn method(mut self, method: &str) -> Self {
        self.inner = self.inner.method(method);
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        self.inner = self.inner.uri(uri);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn peer_addr(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn build(self) -> Result<Request, http::Error> {
        let (parts, ()) = self.inner.body(())?.into_parts();
        Ok(Request::new(parts, self.body, self.peer))
    }
}
