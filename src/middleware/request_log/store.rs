//! Request-scoped storage for the active [`Record`] and the enrichment API.
//!
//! The record lives in the request's [`Extensions`](http::Extensions) under a
//! private type, so no application key can collide with it and nothing outside
//! this module can replace or remove it. Enrichment goes through the
//! [`Request`]; code that does not have the request cannot reach the record.

use std::sync::{Arc, Mutex, PoisonError};

use crate::record::{Arg, Attr, Record};
use crate::request::Request;

/// Shared handle to the record of one in-flight request.
///
/// Emptied at finalization, after which every access is a no-op.
#[derive(Clone)]
pub(crate) struct RecordSlot(Arc<Mutex<Option<Record>>>);

impl RecordSlot {
    pub(crate) fn new(record: Record) -> Self {
        Self(Arc::new(Mutex::new(Some(record))))
    }

    /// Makes this slot reachable from everything downstream of `req`.
    pub(crate) fn publish(&self, req: &mut Request) {
        req.extensions_mut().insert(self.clone());
    }

    pub(crate) fn find(req: &Request) -> Option<&RecordSlot> {
        req.extensions().get::<RecordSlot>()
    }

    /// Moves the record out. Returns `None` if it was already taken.
    pub(crate) fn take(&self) -> Option<Record> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn with(&self, f: impl FnOnce(&mut Record)) {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(record) = guard.as_mut() {
            f(record);
        }
    }
}

/// Appends typed attributes to the current request's record.
///
/// Does nothing when the request is not being logged (no logger installed,
/// excluded by the filter, or already finalized).
///
/// ```rust
/// use reqlog::{Attr, Request, Response};
///
/// async fn checkout(req: Request) -> Response {
///     reqlog::add_attrs(&req, [Attr::string("cart", "c-81"), Attr::int("items", 3)]);
///     Response::text("ok")
/// }
/// ```
pub fn add_attrs(req: &Request, attrs: impl IntoIterator<Item = Attr>) {
    if let Some(slot) = RecordSlot::find(req) {
        slot.with(|record| record.add_attrs(attrs));
    }
}

/// Appends attributes given in alternating key/value form. See
/// [`Record::add`] for the pairing rules and the [`add!`](crate::add!) macro
/// for mixed argument types.
pub fn add(req: &Request, args: impl IntoIterator<Item = Arg>) {
    if let Some(slot) = RecordSlot::find(req) {
        slot.with(|record| record.add(args));
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::record::{Level, Value};

    fn request() -> Request {
        Request::builder().uri("/").build().unwrap()
    }

    #[test]
    fn enrichment_without_a_record_is_a_noop() {
        let req = request();
        add_attrs(&req, [Attr::int("n", 1)]);
        add(&req, [Arg::from("k"), Arg::from("v")]);
        assert!(RecordSlot::find(&req).is_none());
    }

    #[test]
    fn enrichment_reaches_the_published_record() {
        let mut req = request();
        let slot = RecordSlot::new(Record::new(Utc::now(), Level::Info, ""));
        slot.publish(&mut req);

        add_attrs(&req, [Attr::int("n", 1)]);
        crate::add!(&req, "user", "alice", Attr::new("admin", true));

        let record = slot.take().unwrap();
        assert_eq!(record.get("n"), Some(&Value::Int(1)));
        assert_eq!(record.get("user"), Some(&Value::from("alice")));
        assert_eq!(record.get("admin"), Some(&Value::Bool(true)));
    }

    #[test]
    fn late_enrichment_after_take_is_dropped() {
        let mut req = request();
        let slot = RecordSlot::new(Record::new(Utc::now(), Level::Info, ""));
        slot.publish(&mut req);

        assert!(slot.take().is_some());
        add_attrs(&req, [Attr::int("late", 1)]);
        assert!(slot.take().is_none());
    }
}
