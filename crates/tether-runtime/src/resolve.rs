//! Symbol resolution against the layered naming environment.
//!
//! A token is classified by a fixed priority: keyword sigil, reserved
//! special form, var lookup (interned, referred, alias-qualified, fully
//! qualified), then other known entities. Anything left over — including
//! tokens that fail to parse at all — is [`Resolved::Unresolvable`], which
//! callers treat as "no match" rather than an error.

use crate::registry::{NamespaceRegistry, VarRecord};

/// Reserved syntactic constructs that never resolve as ordinary names.
pub const SPECIAL_FORMS: &[&str] = &[
    "catch", "def", "do", "finally", "fn", "if", "let", "loop", "quote", "recur", "throw", "try",
    "var",
];

/// Outcome of classifying one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Keyword literal, fully qualified where the sigil asked for it.
    Keyword(String),
    /// Reserved special form name.
    SpecialForm(&'static str),
    /// A defined var.
    Var(VarRecord),
    /// Some other known entity (currently: a loaded namespace itself).
    Other(String),
    /// No classification; carries a human-readable reason.
    Unresolvable(String),
}

/// Classifies `token` in the context of `namespace`.
#[must_use]
pub fn resolve(registry: &NamespaceRegistry, namespace: &str, token: &str) -> Resolved {
    if token.is_empty() {
        return Resolved::Unresolvable("empty symbol".to_owned());
    }
    if token.chars().any(char::is_whitespace) {
        return Resolved::Unresolvable(format!("'{token}' is not a readable symbol"));
    }
    if let Some(body) = token.strip_prefix(':') {
        return resolve_keyword(registry, namespace, token, body);
    }
    if let Some(form) = SPECIAL_FORMS.iter().copied().find(|form| *form == token) {
        return Resolved::SpecialForm(form);
    }
    if let Some(record) = resolve_var(registry, namespace, token) {
        return Resolved::Var(record);
    }
    if registry.namespace_exists(token) {
        return Resolved::Other(token.to_owned());
    }
    Resolved::Unresolvable(format!(
        "unable to resolve '{token}' in namespace '{namespace}'"
    ))
}

fn resolve_keyword(
    registry: &NamespaceRegistry,
    namespace: &str,
    token: &str,
    body: &str,
) -> Resolved {
    if let Some(auto) = body.strip_prefix(':') {
        // Auto-resolving sigil: qualify against the active namespace or one
        // of its aliases.
        if auto.is_empty() {
            return Resolved::Unresolvable("empty keyword".to_owned());
        }
        return match auto.split_once('/') {
            None => Resolved::Keyword(format!(":{namespace}/{auto}")),
            Some((alias, name)) if !alias.is_empty() && !name.is_empty() => {
                match registry.alias_target(namespace, alias) {
                    Some(target) => Resolved::Keyword(format!(":{target}/{name}")),
                    None => Resolved::Unresolvable(format!(
                        "no alias '{alias}' in namespace '{namespace}'"
                    )),
                }
            }
            Some(_) => Resolved::Unresolvable(format!("'{token}' is not a readable keyword")),
        };
    }
    if body.is_empty() {
        return Resolved::Unresolvable("empty keyword".to_owned());
    }
    Resolved::Keyword(token.to_owned())
}

fn resolve_var(registry: &NamespaceRegistry, namespace: &str, token: &str) -> Option<VarRecord> {
    // The division function is a bare '/' and must not read as a qualifier.
    if token != "/"
        && let Some((prefix, name)) = token.split_once('/')
    {
        if prefix.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        if let Some(target) = registry.alias_target(namespace, prefix) {
            return registry.var_in(&target, name);
        }
        return registry.var_in(prefix, name);
    }
    registry
        .var_in(namespace, token)
        .or_else(|| registry.referred_in(namespace, token))
}
