//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured request logging, request-id injection,
//! authentication-header inspection.
//!
//! A middleware receives the [`Request`] and a [`Next`] handle to the rest of
//! the chain. It may inspect or annotate the request, call
//! [`Next::run`] exactly once, and observe the [`Outcome`] on the way back.
//!
//! ```rust
//! use reqlog::middleware::{Middleware, Next};
//! use reqlog::{BoxFuture, Outcome, Request};
//!
//! struct Noop;
//!
//! impl Middleware for Noop {
//!     fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Outcome> {
//!         Box::pin(next.run(req))
//!     }
//! }
//! ```
//!
//! Built-in middleware:
//! - [`request_log`]: one structured record per request, enrichable from
//!   anywhere in the chain.

use std::sync::Arc;

use crate::handler::{BoxFuture, ErasedHandler, Outcome};
use crate::request::Request;

pub mod request_log;

/// A request/response interceptor.
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Outcome>;
}

/// The remainder of the chain: the middleware not yet run, then the endpoint.
pub struct Next<'a> {
    endpoint: &'a (dyn ErasedHandler + Send + Sync),
    stack: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        endpoint: &'a (dyn ErasedHandler + Send + Sync),
        stack: &'a [Arc<dyn Middleware>],
    ) -> Self {
        Self { endpoint, stack }
    }

    /// Runs the rest of the chain to completion.
    pub async fn run(self, req: Request) -> Outcome {
        match self.stack.split_first() {
            Some((middleware, rest)) => {
                middleware.handle(req, Next::new(self.endpoint, rest)).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::handler::Handler;
    use crate::response::Response;

    struct Trace {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Trace {
        fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Outcome> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(format!("{} in", self.name));
                let outcome = next.run(req).await;
                self.seen.lock().unwrap().push(format!("{} out", self.name));
                outcome
            })
        }
    }

    #[tokio::test]
    async fn first_middleware_is_outermost() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stack: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Trace { name: "a", seen: Arc::clone(&seen) }),
            Arc::new(Trace { name: "b", seen: Arc::clone(&seen) }),
        ];
        let endpoint = (|_req: Request| async { Response::text("done") }).into_boxed_handler();

        let resp = Next::new(endpoint.as_ref(), &stack)
            .run(Request::builder().build().unwrap())
            .await
            .unwrap();

        assert_eq!(resp.body().as_ref(), b"done");
        assert_eq!(*seen.lock().unwrap(), ["a in", "b in", "b out", "a out"]);
    }
}
