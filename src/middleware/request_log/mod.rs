//! Request-scoped structured logging.
//!
//! [`RequestLogger`] produces exactly one [`Record`] per request. The record
//! is created before the rest of the chain runs and published on the request,
//! so any handler or inner middleware can enrich it with
//! [`add_attrs`](crate::add_attrs) or [`add!`](crate::add!). When the chain
//! returns, the logger appends the configured built-in attributes, runs the
//! custom callbacks, and hands the finished record to the [`Sink`].
//!
//! ```rust,no_run
//! use reqlog::{Request, RequestLogger, Response, Router, Server};
//!
//! async fn order(req: Request) -> Response {
//!     reqlog::add!(&req, "order_id", 1234, "express", true);
//!     Response::text("ok")
//! }
//!
//! # async fn run() {
//! let app = Router::new()
//!     .get("/orders/{id}", order)
//!     .layer(RequestLogger::new());
//! Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! # }
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! request ── filter? ──yes──────────────────────────────▶ next.run(req)
//!               │no
//!               ▼
//!         Record::new(now, Info)  ──▶ published in req.extensions()
//!               │
//!         next.run(req)  ◀── handlers call add_attrs / add!
//!               │ Ok / Err / panic
//!               ▼
//!         level = Error on Err or panic
//!         built-ins (configured order) ──▶ custom callbacks (registration order)
//!               │
//!         sink.handle(record)   at most once
//!               │
//!         outcome returned unchanged (panics resumed)
//! ```
//!
//! A request whose future is dropped before the chain returns (client gone,
//! timeout upstream) emits nothing.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::FutureExt;
use tracing::warn;

use crate::error::HandlerError;
use crate::handler::{BoxFuture, Outcome};
use crate::middleware::{Middleware, Next};
use crate::record::{Attr, Level, Record};
use crate::request::{Request, RequestHead};

mod attrs;
mod config;
mod sink;
mod store;

pub use attrs::{Exchange, Extractor, Tag, UnknownTag};
pub use config::{CustomAttr, Filter, RequestLoggerBuilder};
pub use sink::{Sink, SinkError, TracingSink, default_sink, set_default_sink};
pub use store::{add, add_attrs};

use config::Config;
use store::RecordSlot;

/// The request logging middleware. Cheap to clone; clones share configuration.
#[derive(Clone)]
pub struct RequestLogger {
    config: Arc<Config>,
}

impl RequestLogger {
    /// A logger with every built-in attribute, no filter, no callbacks, and
    /// the process-default sink.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RequestLoggerBuilder {
        RequestLoggerBuilder::new()
    }

    async fn log(&self, mut req: Request, next: Next<'_>) -> Outcome {
        let started = Instant::now();
        let slot = RecordSlot::new(Record::new(Utc::now(), Level::Info, ""));
        slot.publish(&mut req);
        let head = req.head();

        let result = AssertUnwindSafe(next.run(req)).catch_unwind().await;
        let latency = started.elapsed();

        match result {
            Ok(outcome) => {
                self.finalize(&slot, &head, &outcome, latency);
                outcome
            }
            Err(payload) => {
                self.finalize(&slot, &head, &Err(HandlerError::panicked()), latency);
                panic::resume_unwind(payload)
            }
        }
    }

    fn finalize(&self, slot: &RecordSlot, head: &RequestHead, outcome: &Outcome, latency: Duration) {
        let Some(mut record) = slot.take() else { return };

        let error = outcome.as_ref().err();
        if error.is_some() {
            record.set_level(Level::Error);
        }

        // On error, the response side reflects what the error renders to.
        let rendered;
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                rendered = err.to_response();
                &rendered
            }
        };

        let exchange = Exchange::new(head, response, latency);
        record.add_attrs(
            self.config
                .builtins
                .iter()
                .map(|&(tag, extract)| Attr::new(tag.as_str(), extract(&exchange))),
        );
        for custom in &self.config.custom {
            custom(&exchange, &mut record, error);
        }

        if let Err(e) = self.config.sink.handle(record) {
            warn!(error = %e, "dropping request log record");
        }
    }
}

impl Default for RequestLogger {
    fn default() -> Self { Self::new() }
}

impl Middleware for RequestLogger {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        if self.config.skips(&req) {
            return Box::pin(next.run(req));
        }
        Box::pin(self.log(req, next))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::StatusCode;

    use super::*;
    use crate::handler::Handler;
    use crate::record::Value;
    use crate::response::Response;

    #[derive(Default)]
    struct Captured(Mutex<Vec<Record>>);

    impl Sink for Captured {
        fn handle(&self, record: Record) -> Result<(), SinkError> {
            self.0.lock().unwrap().push(record);
            Ok(())
        }
    }

    async fn run(logger: &RequestLogger, endpoint: impl Handler, req: Request) -> Outcome {
        let endpoint = endpoint.into_boxed_handler();
        logger.handle(req, Next::new(endpoint.as_ref(), &[])).await
    }

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).build().unwrap()
    }

    async fn conflict(_req: Request) -> Result<Response, HandlerError> {
        Err(StatusCode::CONFLICT.into())
    }

    #[tokio::test]
    async fn outcome_passes_through_unchanged() {
        let sink = Arc::new(Captured::default());
        let logger = RequestLogger::builder().sink(Arc::clone(&sink)).build();

        let err = run(&logger, conflict, get("/")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn error_status_is_the_rendered_one() {
        let sink = Arc::new(Captured::default());
        let logger = RequestLogger::builder()
            .builtin_attrs(["status", "bytes_sent"])
            .sink(Arc::clone(&sink))
            .build();

        let _ = run(&logger, conflict, get("/")).await;

        let records = sink.0.lock().unwrap();
        assert_eq!(records[0].level(), Level::Error);
        assert_eq!(records[0].get("status"), Some(&Value::Int(409)));
        assert_eq!(records[0].get("bytes_sent"), Some(&Value::Int(8)));
    }

    #[tokio::test]
    async fn filtered_requests_publish_no_record() {
        let sink = Arc::new(Captured::default());
        let logger = RequestLogger::builder()
            .filter(|_| true)
            .sink(Arc::clone(&sink))
            .build();

        let resp = run(
            &logger,
            |req: Request| async move {
                let published = req.extensions().get::<RecordSlot>().is_some();
                Response::text(published.to_string())
            },
            get("/"),
        )
        .await
        .unwrap();

        assert_eq!(resp.body().as_ref(), b"false");
        assert!(sink.0.lock().unwrap().is_empty());
    }

    async fn kaboom(_req: Request) -> Response {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn a_panic_is_logged_then_resumed() {
        let sink = Arc::new(Captured::default());
        let logger = RequestLogger::builder()
            .builtin_attrs(["status"])
            .sink(Arc::clone(&sink))
            .build();

        let endpoint = kaboom.into_boxed_handler();
        let chain = logger.handle(get("/"), Next::new(endpoint.as_ref(), &[]));
        assert!(AssertUnwindSafe(chain).catch_unwind().await.is_err());

        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level(), Level::Error);
        assert_eq!(records[0].get("status"), Some(&Value::Int(500)));
    }
}
