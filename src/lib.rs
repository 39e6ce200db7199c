//! # reqlog
//!
//! One structured log record per HTTP request, built up by whoever handles
//! it.
//!
//! ## The contract
//!
//! The [`RequestLogger`] middleware opens a [`Record`] when a request arrives
//! and closes it when the response is ready. In between, any handler or inner
//! middleware can append attributes to it. At the end the logger adds the
//! built-in attributes you asked for (status, latency, headers and so on),
//! runs your callbacks, and hands the record to a [`Sink`] exactly once,
//! whether the handler succeeded, failed, or panicked.
//!
//! What this crate intentionally does not do:
//!
//! - **Formatting and output.** The sink decides. The default forwards to
//!   `tracing`, so your subscriber picks the format.
//! - **Level policy.** Records are `Info`, or `Error` when the chain failed.
//! - **Spans and metrics.** One flat record, not a trace.
//!
//! The crate carries a minimal hyper-based framework to sit in: radix-tree
//! routing via [`matchit`], a middleware chain, graceful shutdown.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use reqlog::{Attr, HandlerError, Request, RequestLogger, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     tracing_subscriber::fmt::init();
//!
//!     let app = Router::new()
//!         .get("/users/{id}", get_user)
//!         .get("/healthz", |_req: Request| async { "ok" })
//!         .layer(
//!             RequestLogger::builder()
//!                 .filter(|req| req.path() == "/healthz")
//!                 .builtin_attrs(["method", "path", "status", "latency"])
//!                 .build(),
//!         );
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, HandlerError> {
//!     let id = req.param("id").unwrap_or_default().to_owned();
//!     reqlog::add_attrs(&req, [Attr::string("user_id", &id)]);
//!     if id == "0" {
//!         return Err(HandlerError::new(StatusCode::NOT_FOUND, "no such user"));
//!     }
//!     Ok(Response::json(format!(r#"{{"id":"{id}"}}"#)))
//! }
//! ```

mod error;
mod handler;
mod record;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use error::{BoxError, Error, HandlerError};
pub use handler::{BoxFuture, Handler, IntoOutcome, Outcome};
pub use middleware::request_log::{
    Exchange, RequestLogger, RequestLoggerBuilder, Sink, SinkError, Tag, TracingSink, add,
    add_attrs, default_sink, set_default_sink,
};
pub use record::{Arg, Attr, BAD_KEY, Level, Record, Value};
pub use request::{Request, RequestBuilder, RequestHead};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;

/// Appends attributes to the current request's record, in alternating
/// key/value form. Arguments may mix strings, numbers, booleans, durations
/// and pre-built [`Attr`]s.
///
/// ```rust
/// use reqlog::{Attr, Request};
///
/// fn annotate(req: &Request) {
///     reqlog::add!(req, "user", "alice", "retries", 2, Attr::new("cached", true));
/// }
/// ```
///
/// Does nothing when the request is not being logged.
#[macro_export]
macro_rules! add {
    ($req:expr $(, $arg:expr)* $(,)?) => {
        $crate::add($req, [$($crate::Arg::from($arg)),*])
    };
}
