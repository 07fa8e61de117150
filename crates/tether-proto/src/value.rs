//! Typed values carried by protocol frames.

use std::collections::BTreeMap;

/// Ordered field map of a protocol message.
///
/// `BTreeMap` iteration order is the canonical key order used on the wire,
/// so an encoded message is independent of the order fields were inserted.
pub type Fields = BTreeMap<String, Value>;

/// A value exchanged over a tether connection.
///
/// Requests and responses are [`Value::Map`] messages keyed by text; the
/// remaining shapes appear as field values. Text payloads are UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Signed integer.
    Int(i64),
    /// UTF-8 text payload.
    Str(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Message: unique text keys in canonical order.
    Map(Fields),
}

impl Value {
    /// Builds a text value.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Builds a list of text values, preserving order.
    #[must_use]
    pub fn text_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|item| Self::Str(item.into())).collect())
    }

    /// Returns the text payload when this value is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the integer payload when this value is an integer.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the elements when this value is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the fields when this value is a message.
    #[must_use]
    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Self::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Looks up a field on a message value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|fields| fields.get(key))
    }

    /// Looks up a text field on a message value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<Fields> for Value {
    fn from(fields: Fields) -> Self {
        Self::Map(fields)
    }
}

impl FromIterator<(String, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> Value {
        let mut fields = Fields::new();
        fields.insert("op".to_owned(), Value::text("eval"));
        fields.insert("id".to_owned(), Value::Int(7));
        Value::Map(fields)
    }

    #[test]
    fn field_lookup_reads_typed_payloads() {
        let message = sample_message();
        assert_eq!(message.get_str("op"), Some("eval"));
        assert_eq!(message.get("id").and_then(Value::as_int), Some(7));
        assert_eq!(message.get("missing"), None);
    }

    #[test]
    fn field_lookup_on_non_map_is_empty() {
        assert_eq!(Value::Int(1).get_str("op"), None);
        assert_eq!(Value::text("eval").get("op"), None);
    }

    #[test]
    fn text_list_preserves_order() {
        let status = Value::text_list(["error", "unknown-op", "done"]);
        let items = status.as_list().expect("list payload");
        let rendered: Vec<_> = items.iter().filter_map(Value::as_str).collect();
        assert_eq!(rendered, ["error", "unknown-op", "done"]);
    }
}
