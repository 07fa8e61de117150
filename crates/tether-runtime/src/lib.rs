//! Naming environment and evaluation capability for the tether daemon.
//!
//! The daemon core consults three things when serving a request: the
//! [`NamespaceRegistry`] (namespaces, interned vars, aliases, refers), the
//! [`Evaluator`] capability that runs submitted code, and the symbol
//! [`resolve`]/[`search`] layer built on top of the registry. This crate
//! defines all three, plus [`Interpreter`] — the bundled evaluator binding
//! that lets the daemon run end to end without an external runtime.

mod complete;
mod eval;
mod interp;
mod registry;
mod resolve;

pub use complete::{Candidate, CandidateKind, search};
pub use eval::{Evaluation, Evaluator, Fault, SourceLabel};
pub use interp::Interpreter;
pub use registry::{CORE_NAMESPACE, NamespaceRegistry, RegistryError, VarKind, VarMeta, VarRecord};
pub use resolve::{Resolved, SPECIAL_FORMS, resolve};
