//! Where finished records go.
//!
//! A [`Sink`] receives each record exactly once and owns everything after
//! that: formatting, filtering, output. The logger treats delivery as best
//! effort; a failing sink is reported through `tracing` and otherwise
//! ignored.

use std::sync::{Arc, OnceLock};

use crate::record::{Level, Record};

/// Failure to deliver a record.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// Receiver of finished records. Shared by every concurrent request, so it
/// must be thread-safe.
///
/// `handle` gets no cancellation or deadline context. It is called
/// synchronously on the request's own task, so dropping that task is the
/// only cancellation there is; a sink that needs to give up early must
/// bound its own I/O. To correlate a record with its request, copy what you
/// need (a request id, the peer) into the record from a
/// [`custom_attr`](crate::RequestLoggerBuilder::custom_attr) callback.
pub trait Sink: Send + Sync + 'static {
    fn handle(&self, record: Record) -> Result<(), SinkError>;
}

impl<S: Sink> Sink for Arc<S> {
    fn handle(&self, record: Record) -> Result<(), SinkError> {
        S::handle(self, record)
    }
}

/// Emits each record as one `tracing` event on target `reqlog`.
///
/// The record is serialized to JSON in the event's `record` field; the event
/// message is the record's message, or `"request"` when it has none.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn handle(&self, record: Record) -> Result<(), SinkError> {
        let json = serde_json::to_string(&record)?;
        let message = match record.message() {
            "" => "request",
            m => m,
        };
        match record.level() {
            Level::Info  => tracing::info!(target: "reqlog", record = %json, "{message}"),
            Level::Error => tracing::error!(target: "reqlog", record = %json, "{message}"),
        }
        Ok(())
    }
}

static DEFAULT_SINK: OnceLock<Arc<dyn Sink>> = OnceLock::new();

/// Installs the process-wide default sink used by loggers built without one.
///
/// Only the first call succeeds; the rejected sink is handed back. Loggers
/// resolve the default when they are built, so install it before building.
pub fn set_default_sink(sink: Arc<dyn Sink>) -> Result<(), Arc<dyn Sink>> {
    DEFAULT_SINK.set(sink)
}

/// The process-wide default sink: whatever [`set_default_sink`] installed,
/// otherwise [`TracingSink`].
pub fn default_sink() -> Arc<dyn Sink> {
    Arc::clone(DEFAULT_SINK.get_or_init(|| Arc::new(TracingSink)))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::record::Attr;

    #[test]
    fn tracing_sink_accepts_every_level() {
        let mut record = Record::new(Utc::now(), Level::Info, "");
        record.add_attrs([Attr::int("status", 200)]);
        assert!(TracingSink.handle(record.clone()).is_ok());

        record.set_level(Level::Error);
        record.set_message("handler failed");
        assert!(TracingSink.handle(record).is_ok());
    }

    #[test]
    fn default_sink_is_stable() {
        let a = default_sink();
        let b = default_sink();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
