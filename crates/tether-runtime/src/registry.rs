//! Namespace registry: the shared naming environment.
//!
//! One registry is shared by every connection. Reads are concurrent; the
//! interior lock serialises the writes performed by the evaluator (`def`,
//! `in-ns`, `alias`). The query API hands out snapshots so callers never
//! hold the lock across a composite walk.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use thiserror::Error;

/// Namespace holding the built-in functions and macros, referred into the
/// default user namespace at bootstrap.
pub const CORE_NAMESPACE: &str = "tether.core";

/// Three-way classification of a var, reported over the wire as
/// `"function"`, `"macro"`, or `"var"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VarKind {
    /// Callable definition.
    Function,
    /// Macro definition.
    Macro,
    /// Plain value binding.
    #[default]
    Value,
}

/// Metadata attached to an interned var.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarMeta {
    /// Function/macro/value classification.
    pub kind: VarKind,
    /// Documentation string.
    pub doc: Option<String>,
    /// Declaring file.
    pub file: Option<String>,
    /// Declaring line within `file`.
    pub line: Option<u32>,
    /// Parameter names per overload, outermost order preserved.
    pub arglists: Vec<Vec<String>>,
}

impl VarMeta {
    /// Renders the arglists the way editors expect them, e.g. `([x] [x y])`.
    #[must_use]
    pub fn arglists_str(&self) -> Option<String> {
        if self.arglists.is_empty() {
            return None;
        }
        let rendered: Vec<String> = self
            .arglists
            .iter()
            .map(|params| format!("[{}]", params.join(" ")))
            .collect();
        Some(format!("({})", rendered.join(" ")))
    }
}

/// A var together with its owning namespace and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRecord {
    /// Namespace the var is interned in.
    pub namespace: String,
    /// Unqualified name.
    pub name: String,
    /// Attached metadata.
    pub meta: VarMeta,
}

#[derive(Debug, Default)]
struct NamespaceEntry {
    vars: BTreeMap<String, VarRecord>,
    aliases: BTreeMap<String, String>,
    refers: BTreeMap<String, VarRecord>,
}

/// Errors raised by registry mutations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Alias target does not name a loaded namespace.
    #[error("namespace '{name}' is not loaded")]
    UnknownNamespace { name: String },
}

/// Shared registry of namespaces, vars, aliases, and refers.
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    inner: RwLock<HashMap<String, NamespaceEntry>>,
}

impl NamespaceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, NamespaceEntry>> {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, NamespaceEntry>> {
        self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Creates the namespace when it does not exist yet.
    pub fn ensure_namespace(&self, name: &str) {
        self.write().entry(name.to_owned()).or_default();
    }

    /// Returns whether `name` names a loaded namespace.
    #[must_use]
    pub fn namespace_exists(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Names of every loaded namespace, sorted.
    #[must_use]
    pub fn namespace_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Interns a var, creating the namespace when needed. Re-interning an
    /// existing name replaces its metadata.
    pub fn intern(&self, namespace: &str, name: &str, meta: VarMeta) {
        let record = VarRecord {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            meta,
        };
        self.write()
            .entry(namespace.to_owned())
            .or_default()
            .vars
            .insert(name.to_owned(), record);
    }

    /// Adds a namespace alias.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownNamespace`] when `target` is not
    /// loaded.
    pub fn add_alias(&self, namespace: &str, alias: &str, target: &str) -> Result<(), RegistryError> {
        let mut entries = self.write();
        if !entries.contains_key(target) {
            return Err(RegistryError::UnknownNamespace {
                name: target.to_owned(),
            });
        }
        entries
            .entry(namespace.to_owned())
            .or_default()
            .aliases
            .insert(alias.to_owned(), target.to_owned());
        Ok(())
    }

    /// Refers every var currently interned in `source` into `namespace`,
    /// unqualified.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownNamespace`] when `source` is not
    /// loaded.
    pub fn refer_all(&self, namespace: &str, source: &str) -> Result<(), RegistryError> {
        let mut entries = self.write();
        let records: Vec<VarRecord> = entries
            .get(source)
            .ok_or_else(|| RegistryError::UnknownNamespace {
                name: source.to_owned(),
            })?
            .vars
            .values()
            .cloned()
            .collect();
        let entry = entries.entry(namespace.to_owned()).or_default();
        for record in records {
            entry.refers.insert(record.name.clone(), record);
        }
        Ok(())
    }

    /// Looks up a var interned directly in `namespace`.
    #[must_use]
    pub fn var_in(&self, namespace: &str, name: &str) -> Option<VarRecord> {
        self.read()
            .get(namespace)
            .and_then(|entry| entry.vars.get(name))
            .cloned()
    }

    /// Looks up a var referred into `namespace` from elsewhere.
    #[must_use]
    pub fn referred_in(&self, namespace: &str, name: &str) -> Option<VarRecord> {
        self.read()
            .get(namespace)
            .and_then(|entry| entry.refers.get(name))
            .cloned()
    }

    /// Resolves an alias local to `namespace` to its target namespace name.
    #[must_use]
    pub fn alias_target(&self, namespace: &str, alias: &str) -> Option<String> {
        self.read()
            .get(namespace)
            .and_then(|entry| entry.aliases.get(alias))
            .cloned()
    }

    /// Every alias known to `namespace` as `(alias, target)` pairs, sorted.
    #[must_use]
    pub fn aliases_of(&self, namespace: &str) -> Vec<(String, String)> {
        self.read()
            .get(namespace)
            .map(|entry| {
                entry
                    .aliases
                    .iter()
                    .map(|(alias, target)| (alias.clone(), target.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every var interned directly in `namespace`, sorted by name.
    #[must_use]
    pub fn interned_vars(&self, namespace: &str) -> Vec<VarRecord> {
        self.read()
            .get(namespace)
            .map(|entry| entry.vars.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every var referred into `namespace`, sorted by referred name.
    #[must_use]
    pub fn referred_vars(&self, namespace: &str) -> Vec<VarRecord> {
        self.read()
            .get(namespace)
            .map(|entry| entry.refers.values().cloned().collect())
            .unwrap_or_default()
    }
}
