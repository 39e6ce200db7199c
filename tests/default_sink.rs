//! The process-default sink is global, so it gets a test binary of its own.

use std::sync::{Arc, Mutex};

use reqlog::{Level, Record, Request, RequestLogger, Router, Sink, SinkError, Value};

#[derive(Default)]
struct Captured(Mutex<Vec<Record>>);

impl Sink for Captured {
    fn handle(&self, record: Record) -> Result<(), SinkError> {
        self.0.lock().unwrap().push(record);
        Ok(())
    }
}

async fn health(_req: Request) -> &'static str {
    "ok"
}

#[tokio::test]
async fn loggers_without_a_sink_use_the_installed_default() {
    let captured = Arc::new(Captured::default());
    assert!(reqlog::set_default_sink(Arc::clone(&captured) as Arc<dyn Sink>).is_ok());

    // A second install is refused and handed back.
    assert!(reqlog::set_default_sink(Arc::new(Captured::default())).is_err());

    let app = Router::new().get("/health", health).layer(RequestLogger::new());
    app.handle(Request::builder().uri("/health").build().unwrap()).await;

    let records = captured.0.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level(), Level::Info);
    assert_eq!(records[0].get("status"), Some(&Value::Int(200)));
}
