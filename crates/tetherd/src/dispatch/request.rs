//! Request model parsed from a decoded frame.

use tether_proto::{Fields, Value};

use super::errors::DispatchError;

/// One parsed client request.
///
/// The correlation `id` is kept as a raw [`Value`] and echoed verbatim in
/// every response; clients may send either integers or text.
#[derive(Debug)]
pub struct Request {
    op: String,
    id: Option<Value>,
    fields: Fields,
}

impl Request {
    /// Parses a decoded frame into a request.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotAMessage`] for non-message frames and
    /// [`DispatchError::MissingOp`] when the message lacks a text `op`.
    pub fn parse(frame: Value) -> Result<Self, DispatchError> {
        let Value::Map(fields) = frame else {
            return Err(DispatchError::NotAMessage);
        };
        let op = fields
            .get("op")
            .and_then(Value::as_str)
            .ok_or(DispatchError::MissingOp)?
            .to_owned();
        let id = fields.get("id").cloned();
        Ok(Self { op, id, fields })
    }

    /// The requested verb, verbatim.
    #[must_use]
    pub fn op(&self) -> &str {
        &self.op
    }

    /// Correlation id to echo, when the request carried one.
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    /// Reads an optional text field.
    #[must_use]
    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Reads a required text field.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MissingField`] when the field is absent or
    /// not text.
    pub fn require_text(
        &self,
        op: &'static str,
        field: &'static str,
    ) -> Result<&str, DispatchError> {
        self.text_field(field)
            .ok_or_else(|| DispatchError::missing_field(op, field))
    }

    /// The lookup text of completion and documentation requests; the
    /// `prefix`, `sym`, and `symbol` spellings are interchangeable.
    #[must_use]
    pub fn lookup_text(&self) -> Option<&str> {
        self.text_field("prefix")
            .or_else(|| self.text_field("sym"))
            .or_else(|| self.text_field("symbol"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(entries: &[(&str, Value)]) -> Value {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.clone()))
            .collect()
    }

    #[test]
    fn parses_op_and_echoable_id() {
        let request = Request::parse(frame(&[
            ("op", Value::text("eval")),
            ("id", Value::Int(12)),
            ("code", Value::text("(+ 1 2)")),
        ]))
        .expect("parse request");
        assert_eq!(request.op(), "eval");
        assert_eq!(request.id(), Some(&Value::Int(12)));
        assert_eq!(request.text_field("code"), Some("(+ 1 2)"));
    }

    #[test]
    fn id_may_be_text() {
        let request = Request::parse(frame(&[
            ("op", Value::text("clone")),
            ("id", Value::text("req-1")),
        ]))
        .expect("parse request");
        assert_eq!(request.id(), Some(&Value::text("req-1")));
    }

    #[test]
    fn rejects_non_message_frames() {
        assert!(matches!(
            Request::parse(Value::Int(1)),
            Err(DispatchError::NotAMessage)
        ));
    }

    #[test]
    fn rejects_missing_or_non_text_op() {
        assert!(matches!(
            Request::parse(frame(&[("id", Value::Int(1))])),
            Err(DispatchError::MissingOp)
        ));
        assert!(matches!(
            Request::parse(frame(&[("op", Value::Int(1))])),
            Err(DispatchError::MissingOp)
        ));
    }

    #[test]
    fn lookup_text_merges_the_interchangeable_spellings() {
        for key in ["prefix", "sym", "symbol"] {
            let request = Request::parse(frame(&[
                ("op", Value::text("complete")),
                (key, Value::text("ab")),
            ]))
            .expect("parse request");
            assert_eq!(request.lookup_text(), Some("ab"), "field '{key}'");
        }
    }

    #[test]
    fn require_text_reports_the_missing_field() {
        let request =
            Request::parse(frame(&[("op", Value::text("eval"))])).expect("parse request");
        let error = request.require_text("eval", "code").expect_err("missing code");
        assert!(matches!(
            error,
            DispatchError::MissingField {
                op: "eval",
                field: "code"
            }
        ));
    }
}
