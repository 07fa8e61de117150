//! The tether daemon.
//!
//! tether lets an external tool drive an interactive runtime over one
//! persistent TCP connection per client: submit code for evaluation,
//! complete symbols, fetch documentation, and load whole files. Each
//! accepted connection gets an isolated [`SessionContext`]; the only state
//! shared across connections is the naming environment inside [`Engine`].
//!
//! The crate splits along the request path: `transport` owns the sockets
//! and the read→decode→dispatch→encode→write loop, `dispatch` maps decoded
//! requests to op handlers, `session` carries per-connection state, and
//! `server` ties them to the configured endpoint.

mod dispatch;
mod server;
mod session;
pub mod telemetry;
mod transport;

pub use dispatch::{DispatchError, Engine, Op, Request, dispatch};
pub use server::{Server, ServerError, ServerHandle};
pub use session::{DEFAULT_NAMESPACE, SessionContext};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;
