//! Error types for request dispatch failures.

use thiserror::Error;

/// Errors surfaced while interpreting one request.
///
/// None of these terminate the connection: the dispatcher converts them
/// into the standard fault report shape with a terminal `done` status.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Decoded frame is not a message.
    #[error("request frame is not a message")]
    NotAMessage,

    /// Message lacks a text `op` field.
    #[error("request is missing the 'op' field")]
    MissingOp,

    /// Op requires a field the request did not carry.
    #[error("op '{op}' requires the '{field}' field")]
    MissingField {
        op: &'static str,
        field: &'static str,
    },
}

impl DispatchError {
    /// Creates a missing required field error.
    pub(crate) fn missing_field(op: &'static str, field: &'static str) -> Self {
        Self::MissingField { op, field }
    }
}
