//! Error types.
//!
//! Two distinct failure domains live here and they never mix:
//!
//! - [`Error`]: infrastructure failures of the server itself (binding a
//!   port, accepting a connection).
//! - [`HandlerError`]: the error value a handler or middleware returns down
//!   the chain. It always knows which [`Response`] the client will receive,
//!   so observers such as the request logger can report the final status even
//!   when the chain failed.

use http::StatusCode;

use crate::response::{IntoResponse, Response};

/// Boxed, thread-safe error used as the source of a [`HandlerError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by the server's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as
/// [`HandlerError`] or plain [`Response`] values, not as `Error`s.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// An error returned by the downstream request-handling chain.
///
/// ```rust
/// use http::StatusCode;
/// use reqlog::{HandlerError, Request, Response};
///
/// async fn load(req: Request) -> Result<Response, HandlerError> {
///     let id: u64 = req
///         .param("id")
///         .and_then(|s| s.parse().ok())
///         .ok_or_else(|| HandlerError::new(StatusCode::BAD_REQUEST, "invalid id"))?;
///     std::fs::read(format!("/data/{id}"))
///         .map(Response::json)
///         .map_err(HandlerError::internal)
/// }
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    status: StatusCode,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl HandlerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), source: None }
    }

    /// Wraps any error as `500 Internal Server Error`.
    ///
    /// The source's message is kept for logs but is never sent to the client.
    pub fn internal(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub(crate) fn panicked() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "handler panicked")
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }

    /// The response this error renders to: the status plus its canonical
    /// reason phrase as a plain-text body.
    pub fn to_response(&self) -> Response {
        let reason = self.status.canonical_reason().unwrap_or_default();
        Response::builder().status(self.status).text(reason)
    }
}

impl From<StatusCode> for HandlerError {
    fn from(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or_default())
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(e: std::io::Error) -> Self {
        Self::internal(e)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response { self.to_response() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_their_message_from_the_client() {
        let err = HandlerError::internal(std::io::Error::other("disk on fire"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "disk on fire");

        let resp = err.to_response();
        assert_eq!(resp.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.body().as_ref(), b"Internal Server Error");
    }

    #[test]
    fn source_is_preserved() {
        use std::error::Error as _;
        let err = HandlerError::internal(std::io::Error::other("boom"));
        assert!(err.source().is_some());
        assert!(HandlerError::new(StatusCode::NOT_FOUND, "nope").source().is_none());
    }

    #[test]
    fn status_code_converts() {
        let err: HandlerError = StatusCode::CONFLICT.into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Conflict");
    }
}
