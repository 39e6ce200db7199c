//! Logger configuration.
//!
//! Built once with [`RequestLoggerBuilder`], then frozen: every request shares
//! the same [`Config`] behind an `Arc`.

use std::sync::Arc;

use tracing::debug;

use super::attrs::{Exchange, Extractor, Tag};
use super::sink::{Sink, default_sink};
use super::RequestLogger;
use crate::error::HandlerError;
use crate::record::Record;
use crate::request::Request;

/// Decides, before anything is recorded, that a request should not be logged.
pub type Filter = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Runs after the built-in attributes are assembled. Receives the finished
/// exchange, the record, and the chain's error if there was one.
///
/// The exchange carries the request head (method, URI, headers, body, peer),
/// not the request itself. Extensions that inner middleware inserted, and
/// route params, are gone by the time callbacks run. Values a callback needs
/// from them should be added to the record where they are known, with
/// [`add_attrs`](crate::add_attrs).
pub type CustomAttr = Arc<dyn Fn(&Exchange<'_>, &mut Record, Option<&HandlerError>) + Send + Sync>;

/// Resolved logger configuration.
pub(crate) struct Config {
    pub(crate) filter: Option<Filter>,
    pub(crate) builtins: Vec<(Tag, Extractor)>,
    pub(crate) custom: Vec<CustomAttr>,
    pub(crate) sink: Arc<dyn Sink>,
}

impl Config {
    pub(crate) fn skips(&self, req: &Request) -> bool {
        self.filter.as_ref().is_some_and(|filter| filter(req))
    }
}

/// Fluent builder for [`RequestLogger`].
///
/// ```rust
/// use reqlog::{Attr, RequestLogger};
///
/// let logger = RequestLogger::builder()
///     .filter(|req| req.path() == "/healthz")
///     .builtin_attrs(["status", "method", "path", "latency"])
///     .custom_attr(|exchange, record, _err| {
///         if exchange.latency().as_secs() >= 1 {
///             record.add_attrs([Attr::new("slow", true)]);
///         }
///     })
///     .build();
/// ```
pub struct RequestLoggerBuilder {
    filter: Option<Filter>,
    tags: Vec<Tag>,
    custom: Vec<CustomAttr>,
    sink: Option<Arc<dyn Sink>>,
}

impl RequestLoggerBuilder {
    pub(crate) fn new() -> Self {
        Self { filter: None, tags: Tag::ALL.to_vec(), custom: Vec::new(), sink: None }
    }

    /// Requests for which `filter` returns `true` pass through unlogged.
    pub fn filter(mut self, filter: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Selects the built-in attributes by name, in emission order.
    ///
    /// Replaces the default (all of them). Unknown names are ignored;
    /// an empty list disables built-ins entirely.
    pub fn builtin_attrs<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.tags = names
            .into_iter()
            .filter_map(|name| match name.as_ref().parse::<Tag>() {
                Ok(tag) => Some(tag),
                Err(e) => {
                    debug!("{e}, ignoring");
                    None
                }
            })
            .collect();
        self
    }

    /// Selects the built-in attributes by tag, in emission order.
    pub fn builtin_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    /// Adds a finalization callback. Callbacks run in the order added.
    pub fn custom_attr(
        mut self,
        f: impl Fn(&Exchange<'_>, &mut Record, Option<&HandlerError>) + Send + Sync + 'static,
    ) -> Self {
        self.custom.push(Arc::new(f));
        self
    }

    /// Sends records to `sink` instead of the process default.
    pub fn sink(mut self, sink: impl Sink) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn build(self) -> RequestLogger {
        let config = Config {
            filter: self.filter,
            builtins: self.tags.into_iter().map(|tag| (tag, tag.extractor())).collect(),
            custom: self.custom,
            sink: self.sink.unwrap_or_else(default_sink),
        };
        RequestLogger { config: Arc::new(config) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(logger: &RequestLogger) -> Vec<Tag> {
        logger.config.builtins.iter().map(|(tag, _)| *tag).collect()
    }

    #[test]
    fn defaults_to_every_builtin_in_table_order() {
        assert_eq!(tags(&RequestLogger::new()), Tag::ALL);
    }

    #[test]
    fn unknown_names_are_dropped_and_order_kept() {
        let logger = RequestLogger::builder()
            .builtin_attrs(["path", "nonsense", "status", "path"])
            .build();
        assert_eq!(tags(&logger), [Tag::Path, Tag::Status, Tag::Path]);
    }

    #[test]
    fn empty_list_disables_builtins() {
        let logger = RequestLogger::builder().builtin_attrs(Vec::<String>::new()).build();
        assert!(tags(&logger).is_empty());
    }

    #[test]
    fn filter_is_optional() {
        let req = Request::builder().uri("/healthz").build().unwrap();
        assert!(!RequestLogger::new().config.skips(&req));

        let logger = RequestLogger::builder().filter(|r| r.path() == "/healthz").build();
        assert!(logger.config.skips(&req));
    }
}
