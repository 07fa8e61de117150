//! Prefix completion over the layered naming environment.

use std::collections::BTreeSet;

use crate::registry::{NamespaceRegistry, VarKind};

/// Candidate classification reported to editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CandidateKind {
    /// Callable definition.
    Function,
    /// Macro definition.
    Macro,
    /// Plain value binding.
    Var,
}

impl CandidateKind {
    /// Wire word for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Macro => "macro",
            Self::Var => "var",
        }
    }
}

impl From<VarKind> for CandidateKind {
    fn from(kind: VarKind) -> Self {
        match kind {
            VarKind::Function => Self::Function,
            VarKind::Macro => Self::Macro,
            VarKind::Value => Self::Var,
        }
    }
}

/// One completion candidate.
///
/// Namespace-prefix candidates carry display text only; every other layer
/// reports the owning namespace and a kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Candidate {
    /// Text shown (and matched) in the editor.
    pub text: String,
    /// Owning namespace, when the candidate is a var.
    pub namespace: Option<String>,
    /// Kind, when the candidate is a var.
    pub kind: Option<CandidateKind>,
}

/// Searches the environment visible from `namespace` for candidates whose
/// display text starts with `query`.
///
/// The result is sorted lexicographically by display text and de-duplicated
/// on (display text, owning namespace).
#[must_use]
pub fn search(registry: &NamespaceRegistry, namespace: &str, query: &str) -> Vec<Candidate> {
    let mut candidates = BTreeSet::new();
    let push = |candidates: &mut BTreeSet<Candidate>, candidate: Candidate| {
        if candidate.text.starts_with(query) {
            candidates.insert(candidate);
        }
    };

    for record in registry.interned_vars(namespace) {
        push(
            &mut candidates,
            Candidate {
                text: record.name.clone(),
                namespace: Some(record.namespace),
                kind: Some(record.meta.kind.into()),
            },
        );
    }
    for record in registry.referred_vars(namespace) {
        push(
            &mut candidates,
            Candidate {
                text: record.name.clone(),
                namespace: Some(record.namespace),
                kind: Some(record.meta.kind.into()),
            },
        );
    }
    for (alias, target) in registry.aliases_of(namespace) {
        for record in registry.interned_vars(&target) {
            push(
                &mut candidates,
                Candidate {
                    text: format!("{alias}/{}", record.name),
                    namespace: Some(record.namespace),
                    kind: Some(record.meta.kind.into()),
                },
            );
        }
    }
    for loaded in registry.namespace_names() {
        for record in registry.interned_vars(&loaded) {
            push(
                &mut candidates,
                Candidate {
                    text: format!("{loaded}/{}", record.name),
                    namespace: Some(record.namespace),
                    kind: Some(record.meta.kind.into()),
                },
            );
        }
        push(
            &mut candidates,
            Candidate {
                text: loaded,
                namespace: None,
                kind: None,
            },
        );
    }

    let mut results: Vec<Candidate> = candidates.into_iter().collect();
    results.sort_by(|left, right| {
        left.text
            .cmp(&right.text)
            .then_with(|| left.namespace.cmp(&right.namespace))
    });
    results.dedup_by(|left, right| left.text == right.text && left.namespace == right.namespace);
    results
}
