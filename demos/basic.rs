//! Minimal reqlog example: JSON endpoints, a health check that is not
//! logged, and handlers that enrich their request's log record.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/users/0
//!   curl http://localhost:3000/healthz

use std::time::Duration;

use http::StatusCode;
use reqlog::{Attr, HandlerError, Request, RequestLogger, Response, Router, Server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let logger = RequestLogger::builder()
        .filter(|req| req.path() == "/healthz")
        .builtin_attrs(["ip", "method", "path", "status", "latency_human", "bytes_sent"])
        .custom_attr(|exchange, record, _err| {
            if exchange.latency() > Duration::from_millis(250) {
                record.add_attrs([Attr::new("slow", true)]);
            }
        })
        .build();

    let app = Router::new()
        .get("/users/{id}",    get_user)
        .post("/users",        create_user)
        .delete("/users/{id}", delete_user)
        .get("/healthz",       |_req: Request| async { "ok" })
        .layer(logger);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    reqlog::add!(&req, "user_id", id);
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))
}

// POST /users
//
// req.body() is the buffered request body; parse it with serde_json::from_slice.
async fn create_user(req: Request) -> Result<Response, HandlerError> {
    if req.body().is_empty() {
        return Err(HandlerError::new(StatusCode::BAD_REQUEST, "empty body"));
    }

    reqlog::add_attrs(&req, [Attr::int("payload_bytes", req.body().len() as i64)]);
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(r#"{"id":"99","name":"new_user"}"#))
}

// DELETE /users/{id} → 204 No Content, or 404 for the reserved id 0
async fn delete_user(req: Request) -> Result<StatusCode, HandlerError> {
    match req.param("id") {
        Some("0") => Err(HandlerError::new(StatusCode::NOT_FOUND, "no such user")),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}
