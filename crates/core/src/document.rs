use core::fmt::{Debug, Formatter, Result};

use chrono::{DateTime, Utc};
use derive_more::From;
use hashbrown::HashMap;

/// A field value inside a [`Document`].
///
/// Timestamps serialize as `{"$date": "<rfc 3339>"}` so they stay
/// distinguishable from plain strings and nested documents.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Clone, PartialEq, Eq, From)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    // Tried before Doc during deserialization, so `$date` maps never
    // collapse into plain nested documents.
    Timestamp(#[cfg_attr(feature = "serde", serde(with = "timestamp_wire"))] DateTime<Utc>),
    Doc(Document),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::Timestamp(value) => write!(f, "{}", value.to_rfc3339()),
            Self::Doc(document) => write!(f, "{document:?}"),
        }
    }
}

#[cfg(feature = "serde")]
mod timestamp_wire {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Wire {
        #[serde(rename = "$date")]
        date: DateTime<Utc>,
    }

    pub fn serialize<S: Serializer>(
        date: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        Wire { date: *date }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        Wire::deserialize(deserializer).map(|wire| wire.date)
    }
}

/// One record: an unordered field map, nested documents permitted.
///
/// Identity is an application-level key chosen by the caller (a name field,
/// say), never the document's full content.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Document(HashMap<String, Value>);

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` to `value`, returning the previous value if any.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `update` onto this document: every field of `update` replaces
    /// the field of the same name here, untouched fields are kept.
    pub fn merge(&mut self, update: &Self) {
        for (field, value) in &update.0 {
            self.0.insert(field.clone(), value.clone());
        }
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter) -> Result {
        let mut map = f.debug_map();
        for (field, value) in &self.0 {
            map.entry(&format_args!("{field}"), &format_args!("{value:?}"));
        }
        map.finish()
    }
}

/// Build a [`Document`] from `field => value` pairs.
///
/// Values go through [`Value::from`], so literals, strings, timestamps, and
/// nested `doc!` invocations all work:
///
/// ```rust
/// use doctx_core::doc;
///
/// let record = doc! {
///     "name" => "satoshi",
///     "address" => doc! { "city" => "Yokohama" },
/// };
/// assert_eq!(record.len(), 2);
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::document::Document::new()
    };
    ( $( $field:expr => $value:expr ),+ $(,)? ) => {{
        let mut document = $crate::document::Document::new();
        $( document.insert($field, $value); )+
        document
    }};
}
