//! Per-connection session state.
//!
//! One [`SessionContext`] is allocated when a connection is accepted and
//! dropped when it closes. It is owned exclusively by that connection's
//! handler; op handlers are the only code that mutates it.

use std::collections::VecDeque;

use tether_runtime::Fault;

/// Namespace a fresh session starts in.
pub const DEFAULT_NAMESPACE: &str = "user";

/// How many recent evaluation values the session remembers.
const HISTORY_DEPTH: usize = 3;

/// Mutable evaluation state carried across the requests of one connection.
#[derive(Debug)]
pub struct SessionContext {
    namespace: String,
    history: VecDeque<String>,
    last_fault: Option<Fault>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// Creates the state for a freshly accepted connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            history: VecDeque::with_capacity(HISTORY_DEPTH),
            last_fault: None,
        }
    }

    /// Active namespace label.
    ///
    /// The label need not name a loaded namespace; it is not dereferenced
    /// until an evaluation actually needs it.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Replaces the active namespace label.
    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.namespace = namespace.into();
    }

    /// Records a successful evaluation value, newest first, keeping at most
    /// the three most recent.
    pub fn remember(&mut self, value: String) {
        self.history.push_front(value);
        self.history.truncate(HISTORY_DEPTH);
    }

    /// Recent successful values, newest first.
    #[must_use]
    pub fn history(&self) -> &VecDeque<String> {
        &self.history
    }

    /// Records the most recent evaluation fault.
    pub fn record_fault(&mut self, fault: Fault) {
        self.last_fault = Some(fault);
    }

    /// Most recent evaluation fault, when one has occurred.
    #[must_use]
    pub fn last_fault(&self) -> Option<&Fault> {
        self.last_fault.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sessions_start_in_the_default_namespace() {
        let session = SessionContext::new();
        assert_eq!(session.namespace(), "user");
        assert!(session.history().is_empty());
        assert!(session.last_fault().is_none());
    }

    #[test]
    fn history_keeps_the_three_newest_values() {
        let mut session = SessionContext::new();
        for value in ["1", "2", "3", "4"] {
            session.remember(value.to_owned());
        }
        let values: Vec<&str> = session.history().iter().map(String::as_str).collect();
        assert_eq!(values, ["4", "3", "2"]);
    }

    #[test]
    fn namespace_label_is_free_form() {
        let mut session = SessionContext::new();
        session.set_namespace("not.a.loaded.namespace");
        assert_eq!(session.namespace(), "not.a.loaded.namespace");
    }

    #[test]
    fn last_fault_tracks_the_most_recent() {
        let mut session = SessionContext::new();
        session.record_fault(Fault {
            summary: "NameError: first".to_owned(),
            trace: "NameError: first".to_owned(),
        });
        session.record_fault(Fault {
            summary: "ArithmeticError: second".to_owned(),
            trace: "ArithmeticError: second".to_owned(),
        });
        let fault = session.last_fault().expect("recorded fault");
        assert!(fault.summary.contains("second"));
    }
}
