//! Request dispatch: one decoded request in, ordered responses out.
//!
//! Each op is a function from the session context and the request to a
//! list of response messages, written to the socket in generation order by
//! the connection handler. Handler failures never terminate a connection;
//! they are converted into the fault report shape at the dispatch boundary
//! so clients always receive a terminated status sequence.

mod errors;
mod ops;
mod request;

use std::sync::Arc;

use tether_runtime::{Evaluator, Interpreter, NamespaceRegistry};

pub use errors::DispatchError;
pub use ops::{Op, dispatch};
pub use request::Request;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Shared capabilities every connection dispatches against.
///
/// The registry is the only cross-connection state and is read-only from
/// the dispatcher's perspective; writes happen inside the evaluator.
pub struct Engine {
    registry: Arc<NamespaceRegistry>,
    evaluator: Arc<dyn Evaluator>,
}

impl Engine {
    /// Wires an engine from an existing registry and evaluator.
    #[must_use]
    pub fn new(registry: Arc<NamespaceRegistry>, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            registry,
            evaluator,
        }
    }

    /// Builds an engine around the bundled interpreter binding.
    #[must_use]
    pub fn bundled() -> Self {
        let registry = Arc::new(NamespaceRegistry::new());
        let evaluator = Arc::new(Interpreter::bootstrap(Arc::clone(&registry)));
        Self::new(registry, evaluator)
    }

    pub(crate) fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    pub(crate) fn evaluator(&self) -> &dyn Evaluator {
        self.evaluator.as_ref()
    }
}
