//! Evaluation capability consumed by the daemon core.
//!
//! The evaluator that actually runs submitted code is a collaborator behind
//! this interface; the daemon only needs its observable effects — output
//! writes, the namespace evaluation left active, and a printable value or a
//! fault.

/// Where a piece of submitted code came from, for fault reporting.
///
/// Both fields empty means interactive input; `load-file` fills in the file
/// name and path so fault traces point at the real source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLabel {
    /// Base name of the originating file.
    pub name: Option<String>,
    /// Full path of the originating file.
    pub path: Option<String>,
}

/// Marker used in traces when code arrived interactively.
const REPL_LOCATION: &str = "<repl-input>";

impl SourceLabel {
    /// Label for interactive input.
    #[must_use]
    pub fn repl() -> Self {
        Self::default()
    }

    /// Label for code loaded from a file.
    #[must_use]
    pub fn file(name: Option<String>, path: Option<String>) -> Self {
        Self { name, path }
    }

    /// Source-location text substituted into fault traces: the file path
    /// when known, else the file name, else the interactive marker.
    #[must_use]
    pub fn location(&self) -> &str {
        self.path
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(REPL_LOCATION)
    }
}

/// A fault raised while evaluating submitted code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Short summary leading with the fault's type name,
    /// e.g. `"ArithmeticError: divide by zero"`.
    pub summary: String,
    /// Full formatted trace text, embedding the source location.
    pub trace: String,
}

/// Result of evaluating one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Output chunks produced by side-effecting writes, in write order.
    pub writes: Vec<String>,
    /// Namespace the evaluation left active. Namespace-switching forms in
    /// the submitted code take effect on the session through this field,
    /// on success and on fault alike.
    pub namespace: String,
    /// Printable form of the resulting value, or the fault.
    pub outcome: Result<String, Fault>,
}

/// Capability that runs submitted code.
pub trait Evaluator: Send + Sync {
    /// Evaluates `code` with `namespace` active, labelling faults with
    /// `source`. Implementations report faults through
    /// [`Evaluation::outcome`]; they do not panic.
    fn evaluate(&self, namespace: &str, code: &str, source: &SourceLabel) -> Evaluation;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repl_label_uses_the_interactive_marker() {
        assert_eq!(SourceLabel::repl().location(), "<repl-input>");
    }

    #[test]
    fn file_label_prefers_the_full_path() {
        let label = SourceLabel::file(Some("core.tl".to_owned()), Some("src/app/core.tl".to_owned()));
        assert_eq!(label.location(), "src/app/core.tl");

        let name_only = SourceLabel::file(Some("core.tl".to_owned()), None);
        assert_eq!(name_only.location(), "core.tl");
    }
}
