//! Built-in attributes.
//!
//! Every recognised attribute name is a [`Tag`]. Each tag maps to one pure
//! extractor over the finished [`Exchange`]; the mapping is an exhaustive
//! `match`, resolved once when the logger is configured.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use http::header::{REFERER, USER_AGENT};
use http::{HeaderMap, HeaderValue};

use crate::record::Value;
use crate::request::RequestHead;
use crate::response::Response;

/// Computes one attribute value from a finished exchange.
pub type Extractor = fn(&Exchange<'_>) -> Value;

// ── Exchange ──────────────────────────────────────────────────────────────────

/// Read-only view of a finished request: what came in, what goes out, and how
/// long it took.
#[derive(Clone, Copy, Debug)]
pub struct Exchange<'a> {
    request: &'a RequestHead,
    response: &'a Response,
    latency: Duration,
}

impl<'a> Exchange<'a> {
    pub(crate) fn new(request: &'a RequestHead, response: &'a Response, latency: Duration) -> Self {
        Self { request, response, latency }
    }

    pub fn request(&self) -> &'a RequestHead { self.request }
    pub fn response(&self) -> &'a Response { self.response }
    pub fn latency(&self) -> Duration { self.latency }
}

// ── Tag ───────────────────────────────────────────────────────────────────────

/// A built-in attribute.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Tag {
    Referer,
    UserAgent,
    Ip,
    Ips,
    Latency,
    LatencyHuman,
    Status,
    Path,
    Url,
    Method,
    Body,
    BytesReceived,
    BytesSent,
    RequestHeaders,
    QueryString,
}

/// The name given to a tag that does not exist.
#[derive(Debug, thiserror::Error)]
#[error("unknown built-in attribute `{0}`")]
pub struct UnknownTag(pub String);

impl Tag {
    /// Every tag, in default emission order.
    pub const ALL: [Tag; 15] = [
        Tag::Referer,
        Tag::UserAgent,
        Tag::Ip,
        Tag::Ips,
        Tag::Latency,
        Tag::LatencyHuman,
        Tag::Status,
        Tag::Path,
        Tag::Url,
        Tag::Method,
        Tag::Body,
        Tag::BytesReceived,
        Tag::BytesSent,
        Tag::RequestHeaders,
        Tag::QueryString,
    ];

    /// The attribute key this tag is emitted under.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Referer        => "referer",
            Self::UserAgent      => "user_agent",
            Self::Ip             => "ip",
            Self::Ips            => "ips",
            Self::Latency        => "latency",
            Self::LatencyHuman   => "latency_human",
            Self::Status         => "status",
            Self::Path           => "path",
            Self::Url            => "url",
            Self::Method         => "method",
            Self::Body           => "body",
            Self::BytesReceived  => "bytes_received",
            Self::BytesSent      => "bytes_sent",
            Self::RequestHeaders => "request_headers",
            Self::QueryString    => "query_string",
        }
    }

    pub fn extractor(self) -> Extractor {
        match self {
            Self::Referer        => referer,
            Self::UserAgent      => user_agent,
            Self::Ip             => ip,
            Self::Ips            => ips,
            Self::Latency        => latency,
            Self::LatencyHuman   => latency_human,
            Self::Status         => status,
            Self::Path           => path,
            Self::Url            => url,
            Self::Method         => method,
            Self::Body           => body,
            Self::BytesReceived  => bytes_received,
            Self::BytesSent      => bytes_sent,
            Self::RequestHeaders => request_headers,
            Self::QueryString    => query_string,
        }
    }
}

impl FromStr for Tag {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| UnknownTag(s.to_owned()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Extractors ────────────────────────────────────────────────────────────────

fn referer(ex: &Exchange<'_>) -> Value {
    header_value(ex.request.headers(), REFERER.as_str())
}

fn user_agent(ex: &Exchange<'_>) -> Value {
    header_value(ex.request.headers(), USER_AGENT.as_str())
}

fn ip(ex: &Exchange<'_>) -> Value {
    Value::Str(ex.request.peer_addr().map(|a| a.ip().to_string()).unwrap_or_default())
}

fn ips(ex: &Exchange<'_>) -> Value {
    header_value(ex.request.headers(), "x-forwarded-for")
}

fn latency(ex: &Exchange<'_>) -> Value {
    Value::Duration(round_to_micros(ex.latency))
}

fn latency_human(ex: &Exchange<'_>) -> Value {
    Value::Str(format!("{:>7}", human_duration(ex.latency)))
}

fn status(ex: &Exchange<'_>) -> Value {
    Value::Int(i64::from(ex.response.status_code().as_u16()))
}

fn path(ex: &Exchange<'_>) -> Value {
    Value::from(ex.request.path())
}

fn url(ex: &Exchange<'_>) -> Value {
    Value::from(ex.request.url())
}

fn method(ex: &Exchange<'_>) -> Value {
    Value::from(ex.request.method().as_str())
}

fn body(ex: &Exchange<'_>) -> Value {
    Value::Bytes(ex.request.body().clone())
}

fn bytes_received(ex: &Exchange<'_>) -> Value {
    Value::Int(len_as_i64(ex.request.body().len()))
}

/// The declared content length governs: a response that declares zero bytes
/// reports zero even if a body was written.
fn bytes_sent(ex: &Exchange<'_>) -> Value {
    let sent = if ex.response.content_length() > 0 { ex.response.body().len() } else { 0 };
    Value::Int(len_as_i64(sent))
}

fn request_headers(ex: &Exchange<'_>) -> Value {
    let headers = ex.request.headers();
    let entries = headers
        .keys()
        .map(|name| {
            let joined = headers
                .get_all(name)
                .iter()
                .map(lossy)
                .collect::<Vec<_>>()
                .join(", ");
            (name.as_str().to_owned(), Value::Str(joined))
        })
        .collect();
    Value::Map(entries)
}

/// One entry per key; a repeated key keeps its first position and its last
/// value. A malformed query string yields an empty map.
fn query_string(ex: &Exchange<'_>) -> Value {
    let pairs: Vec<(String, String)> = ex
        .request
        .query()
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default();

    let mut entries: Vec<(String, Value)> = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = Value::Str(value),
            None => entries.push((key, Value::Str(value))),
        }
    }
    Value::Map(entries)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn header_value(headers: &HeaderMap, name: &str) -> Value {
    Value::Str(headers.get(name).map(lossy).unwrap_or_default())
}

fn lossy(value: &HeaderValue) -> String {
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}

fn len_as_i64(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

/// Rounds half-up to the nearest microsecond.
pub(crate) fn round_to_micros(d: Duration) -> Duration {
    let micros = (d.as_nanos() + 500) / 1_000;
    Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
}

/// Compact unit formatting: `850ns`, `12.5µs`, `3.2ms`, `1.5s`, `2m3s`,
/// `1h0m0.25s`. Trailing fractional zeros are dropped.
pub(crate) fn human_duration(d: Duration) -> String {
    match d.as_nanos() {
        0 => "0s".to_owned(),
        n if n < 1_000 => format!("{n}ns"),
        n if n < 1_000_000 => format!("{}µs", decimal(n / 1_000, n % 1_000, 3)),
        n if n < 1_000_000_000 => format!("{}ms", decimal(n / 1_000_000, n % 1_000_000, 6)),
        n => {
            let secs = n / 1_000_000_000;
            let s = format!("{}s", decimal(secs % 60, n % 1_000_000_000, 9));
            let (h, m) = (secs / 3_600, secs / 60 % 60);
            if h > 0 {
                format!("{h}h{m}m{s}")
            } else if m > 0 {
                format!("{m}m{s}")
            } else {
                s
            }
        }
    }
}

fn decimal(whole: u128, frac: u128, digits: usize) -> String {
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0digits$}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use http::StatusCode;
    use proptest::prelude::*;

    use super::*;
    use crate::request::Request;

    fn head(req: Request) -> std::sync::Arc<RequestHead> {
        req.head()
    }

    fn extract(tag: Tag, req: &RequestHead, resp: &Response, latency: Duration) -> Value {
        (tag.extractor())(&Exchange::new(req, resp, latency))
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for tag in Tag::ALL {
            assert_eq!(tag.as_str().parse::<Tag>().unwrap(), tag);
        }
        assert!("latency_ms".parse::<Tag>().is_err());
    }

    #[test]
    fn request_side_attributes() {
        let peer: SocketAddr = "10.1.2.3:5555".parse().unwrap();
        let req = head(
            Request::builder()
                .method("POST")
                .uri("/items?sort=asc")
                .header("referer", "https://example.com/")
                .header("user-agent", "curl/8.0")
                .header("x-forwarded-for", "1.1.1.1, 2.2.2.2")
                .body("hello")
                .peer_addr(peer)
                .build()
                .unwrap(),
        );
        let resp = Response::text("ok");
        let d = Duration::ZERO;

        assert_eq!(extract(Tag::Referer, &req, &resp, d), Value::from("https://example.com/"));
        assert_eq!(extract(Tag::UserAgent, &req, &resp, d), Value::from("curl/8.0"));
        assert_eq!(extract(Tag::Ip, &req, &resp, d), Value::from("10.1.2.3"));
        assert_eq!(extract(Tag::Ips, &req, &resp, d), Value::from("1.1.1.1, 2.2.2.2"));
        assert_eq!(extract(Tag::Path, &req, &resp, d), Value::from("/items"));
        assert_eq!(extract(Tag::Url, &req, &resp, d), Value::from("/items?sort=asc"));
        assert_eq!(extract(Tag::Method, &req, &resp, d), Value::from("POST"));
        assert_eq!(extract(Tag::Body, &req, &resp, d), Value::Bytes("hello".into()));
        assert_eq!(extract(Tag::BytesReceived, &req, &resp, d), Value::Int(5));
    }

    #[test]
    fn absent_sources_degrade_to_empty() {
        let req = head(Request::builder().uri("/").build().unwrap());
        let resp = Response::status(StatusCode::NO_CONTENT);
        let d = Duration::ZERO;

        assert_eq!(extract(Tag::Referer, &req, &resp, d), Value::from(""));
        assert_eq!(extract(Tag::Ip, &req, &resp, d), Value::from(""));
        assert_eq!(extract(Tag::QueryString, &req, &resp, d), Value::Map(Vec::new()));
        assert_eq!(extract(Tag::BytesSent, &req, &resp, d), Value::Int(0));
    }

    #[test]
    fn status_reflects_the_response() {
        let req = head(Request::builder().build().unwrap());
        let resp = Response::status(StatusCode::ACCEPTED);
        assert_eq!(extract(Tag::Status, &req, &resp, Duration::ZERO), Value::Int(202));
    }

    #[test]
    fn bytes_sent_follows_declared_content_length() {
        let req = head(Request::builder().build().unwrap());

        let resp = Response::text("four");
        assert_eq!(extract(Tag::BytesSent, &req, &resp, Duration::ZERO), Value::Int(4));

        let resp = Response::builder().header("content-length", "0").text("written anyway");
        assert_eq!(extract(Tag::BytesSent, &req, &resp, Duration::ZERO), Value::Int(0));
    }

    #[test]
    fn request_headers_join_repeated_values() {
        let req = head(
            Request::builder()
                .header("accept", "text/html")
                .header("accept", "application/json")
                .header("x-id", "7")
                .build()
                .unwrap(),
        );
        let resp = Response::text("");
        let headers = extract(Tag::RequestHeaders, &req, &resp, Duration::ZERO);

        assert_eq!(headers.get("accept"), Some(&Value::from("text/html, application/json")));
        assert_eq!(headers.get("x-id"), Some(&Value::from("7")));
    }

    #[test]
    fn query_string_last_value_wins() {
        let req = head(Request::builder().uri("/?a=1&b=2&a=3&c=hello%20world").build().unwrap());
        let resp = Response::text("");
        let query = extract(Tag::QueryString, &req, &resp, Duration::ZERO);

        assert_eq!(
            query,
            Value::Map(vec![
                ("a".to_owned(), Value::from("3")),
                ("b".to_owned(), Value::from("2")),
                ("c".to_owned(), Value::from("hello world")),
            ])
        );
    }

    #[test]
    fn latency_is_rounded_to_micros() {
        let req = head(Request::builder().build().unwrap());
        let resp = Response::text("");
        let got = extract(Tag::Latency, &req, &resp, Duration::from_nanos(1_234_567));
        assert_eq!(got, Value::Duration(Duration::from_micros(1_235)));
    }

    #[test]
    fn human_format() {
        assert_eq!(human_duration(Duration::ZERO), "0s");
        assert_eq!(human_duration(Duration::from_nanos(850)), "850ns");
        assert_eq!(human_duration(Duration::from_nanos(12_500)), "12.5µs");
        assert_eq!(human_duration(Duration::from_micros(15)), "15µs");
        assert_eq!(human_duration(Duration::from_nanos(3_200_000)), "3.2ms");
        assert_eq!(human_duration(Duration::from_millis(1_500)), "1.5s");
        assert_eq!(human_duration(Duration::from_secs(123)), "2m3s");
        assert_eq!(human_duration(Duration::from_millis(3_600_250)), "1h0m0.25s");
    }

    #[test]
    fn latency_human_is_padded() {
        let req = head(Request::builder().build().unwrap());
        let resp = Response::text("");
        let got = extract(Tag::LatencyHuman, &req, &resp, Duration::from_micros(15));
        assert_eq!(got, Value::from("   15µs"));
    }

    proptest! {
        #[test]
        fn rounding_stays_within_half_a_microsecond(nanos in 0u64..10_000_000_000) {
            let d = Duration::from_nanos(nanos);
            let rounded = round_to_micros(d);
            prop_assert_eq!(rounded.subsec_nanos() % 1_000, 0);
            prop_assert!(rounded.abs_diff(d) <= Duration::from_nanos(500));
        }

        #[test]
        fn human_latency_is_at_least_seven_wide(nanos in 0u64..100_000_000_000) {
            let s = format!("{:>7}", human_duration(Duration::from_nanos(nanos)));
            prop_assert!(s.chars().count() >= 7);
        }
    }
}
