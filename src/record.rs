//! The per-request log record.
//!
//! A [`Record`] is an append-only list of [`Attr`]s plus a [`Level`], a
//! creation timestamp and a free-text message. Attribute values are a closed
//! set of variants ([`Value`]) so every sink can serialize them exhaustively.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Key given to arguments of [`Record::add`] that do not form a proper pair.
pub const BAD_KEY: &str = "!BADKEY";

// ── Level ─────────────────────────────────────────────────────────────────────

/// Severity of a record.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Level {
    #[default]
    Info,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info  => "INFO",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// An attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    Bytes(Bytes),
    /// Ordered mapping; keys keep insertion order.
    Map(Vec<(String, Value)>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Self::Int(n) => Some(n),
            Self::Uint(n) => i64::try_from(n).ok(),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match *self {
            Self::Duration(d) => Some(d),
            _ => None,
        }
    }

    /// Looks up `key` in a [`Value::Map`]. The last entry with that key wins.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(entries) => entries.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Str(s)      => serializer.serialize_str(s),
            Self::Int(n)      => serializer.serialize_i64(*n),
            Self::Uint(n)     => serializer.serialize_u64(*n),
            Self::Float(n)    => serializer.serialize_f64(*n),
            Self::Bool(b)     => serializer.serialize_bool(*b),
            // Integer nanoseconds, saturating.
            Self::Duration(d) => serializer.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)),
            Self::Bytes(b)    => serializer.serialize_str(&String::from_utf8_lossy(b)),
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self { Value::$variant(v $(as $cast)?) }
            }
        )*
    };
}

value_from! {
    String   => Str,
    i64      => Int,
    i32      => Int as i64,
    i16      => Int as i64,
    u64      => Uint,
    u32      => Uint as u64,
    u16      => Uint as u64,
    usize    => Uint as u64,
    f64      => Float,
    f32      => Float as f64,
    bool     => Bool,
    Duration => Duration,
    Bytes    => Bytes,
    Vec<(String, Value)> => Map,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Str(v.to_owned()) }
}

// ── Attr ──────────────────────────────────────────────────────────────────────

/// A key/value pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Attr {
    key: String,
    value: Value,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, Value::Str(value.into()))
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, Value::Int(value))
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Self::new(key, Value::Duration(value))
    }

    pub fn key(&self) -> &str { &self.key }
    pub fn value(&self) -> &Value { &self.value }
}

/// One argument of the alternating key/value form accepted by
/// [`Record::add`] and [`add`](crate::add).
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Attr(Attr),
    Value(Value),
}

impl From<Attr> for Arg {
    fn from(a: Attr) -> Self { Arg::Attr(a) }
}

impl<T: Into<Value>> From<T> for Arg {
    fn from(v: T) -> Self { Arg::Value(v.into()) }
}

// ── Record ────────────────────────────────────────────────────────────────────

/// A structured log record.
#[derive(Clone, Debug)]
pub struct Record {
    time: DateTime<Utc>,
    level: Level,
    message: String,
    attrs: Vec<Attr>,
}

impl Record {
    pub fn new(time: DateTime<Utc>, level: Level, message: impl Into<String>) -> Self {
        Self { time, level, message: message.into(), attrs: Vec::new() }
    }

    pub fn time(&self) -> DateTime<Utc> { self.time }
    pub fn level(&self) -> Level { self.level }
    pub fn message(&self) -> &str { &self.message }
    pub fn attrs(&self) -> &[Attr] { &self.attrs }

    pub fn set_level(&mut self, level: Level) {
        self.level = level;
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    /// The value of the most recently added attribute named `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.iter().rev().find(|a| a.key == key).map(|a| &a.value)
    }

    pub fn add_attrs(&mut self, attrs: impl IntoIterator<Item = Attr>) {
        self.attrs.extend(attrs);
    }

    /// Appends attributes given in alternating form.
    ///
    /// A string followed by another argument keys that argument's value; a
    /// pre-built [`Attr`] is taken as is, or nested as a one-entry map when a
    /// key precedes it. A trailing string, or a bare
    /// non-string value, is stored under [`BAD_KEY`].
    ///
    /// ```rust
    /// use reqlog::{Arg, Attr, Record, Level};
    ///
    /// let mut record = Record::new(chrono::Utc::now(), Level::Info, "");
    /// record.add([Arg::from("user"), Arg::from(42), Arg::from(Attr::new("ok", true))]);
    /// assert_eq!(record.get("user").and_then(|v| v.as_int()), Some(42));
    /// ```
    pub fn add(&mut self, args: impl IntoIterator<Item = Arg>) {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let attr = match arg {
                Arg::Attr(attr) => attr,
                Arg::Value(Value::Str(key)) => match args.next() {
                    Some(Arg::Value(value)) => Attr { key, value },
                    // A key followed by a pre-built attr nests the whole attr.
                    Some(Arg::Attr(attr)) => Attr { key, value: Value::Map(vec![(attr.key, attr.value)]) },
                    None => Attr::new(BAD_KEY, key),
                },
                Arg::Value(value) => Attr { key: BAD_KEY.to_owned(), value },
            };
            self.attrs.push(attr);
        }
    }
}

/// `{"time": …, "level": …, "msg": …, <attrs in order>}`
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attrs.len() + 3))?;
        map.serialize_entry("time", &self.time)?;
        map.serialize_entry("level", &self.level)?;
        map.serialize_entry("msg", &self.message)?;
        for attr in &self.attrs {
            map.serialize_entry(&attr.key, &attr.value)?;
        }
        map.end()
    }
}
