//! The verb table and per-op handlers.

use tracing::debug;
use uuid::Uuid;

use tether_proto::{Fields, Value};
use tether_runtime::{Resolved, SourceLabel, VarKind, resolve, search};

use crate::session::SessionContext;

use super::errors::DispatchError;
use super::request::Request;
use super::{DISPATCH_TARGET, Engine};

/// Status tokens reported for an unrecognised verb.
const UNKNOWN_OP_STATUS: &[&str] = &["error", "unknown-op", "done"];

/// Supported protocol verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Mint a new logical session token.
    Clone,
    /// Acknowledge the end of a logical session.
    Close,
    /// Report supported ops and version information.
    Describe,
    /// Evaluate submitted code.
    Eval,
    /// Evaluate a whole file body.
    LoadFile,
    /// Prefix completion over the naming environment.
    Complete,
    /// Var metadata lookup.
    Info,
    /// Signature hints for editor tooling.
    Eldoc,
}

impl Op {
    /// Every supported verb, in the order `describe` reports them.
    pub const ALL: &'static [Self] = &[
        Self::Clone,
        Self::Close,
        Self::Describe,
        Self::Eval,
        Self::LoadFile,
        Self::Complete,
        Self::Info,
        Self::Eldoc,
    ];

    /// Parses a verb name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == name)
    }

    /// Canonical wire name of this verb.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clone => "clone",
            Self::Close => "close",
            Self::Describe => "describe",
            Self::Eval => "eval",
            Self::LoadFile => "load-file",
            Self::Complete => "complete",
            Self::Info => "info",
            Self::Eldoc => "eldoc",
        }
    }
}

/// Response message under construction.
struct Reply {
    fields: Fields,
}

impl Reply {
    fn to(request: &Request) -> Self {
        let mut fields = Fields::new();
        if let Some(id) = request.id() {
            fields.insert("id".to_owned(), id.clone());
        }
        Self { fields }
    }

    fn bare(id: Option<Value>) -> Self {
        let mut fields = Fields::new();
        if let Some(id) = id {
            fields.insert("id".to_owned(), id);
        }
        Self { fields }
    }

    fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    fn field_if(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    fn message(self) -> Value {
        Value::Map(self.fields)
    }

    fn status(self, tokens: &[&str]) -> Value {
        self.field("status", Value::text_list(tokens.iter().copied()))
            .message()
    }

    fn done(self) -> Value {
        self.status(&["done"])
    }
}

/// Runs one request against the session, producing the ordered response
/// messages the connection handler writes to the socket.
pub fn dispatch(engine: &Engine, session: &mut SessionContext, frame: Value) -> Vec<Value> {
    let id = frame.get("id").cloned();
    let request = match Request::parse(frame) {
        Ok(request) => request,
        Err(error) => {
            debug!(target: DISPATCH_TARGET, error = %error, "unreadable request");
            return vec![Reply::bare(id).status(UNKNOWN_OP_STATUS)];
        }
    };
    let Some(op) = Op::parse(request.op()) else {
        debug!(target: DISPATCH_TARGET, op = request.op(), "unknown op");
        return vec![Reply::to(&request).status(UNKNOWN_OP_STATUS)];
    };

    debug!(target: DISPATCH_TARGET, op = op.as_str(), "dispatching request");
    let outcome = match op {
        Op::Clone => Ok(clone_session(&request)),
        Op::Close => Ok(vec![Reply::to(&request).done()]),
        Op::Describe => Ok(describe(&request)),
        Op::Eval | Op::LoadFile => eval(engine, session, &request, op),
        Op::Complete => Ok(complete(engine, session, &request)),
        Op::Info => Ok(info(engine, session, &request)),
        Op::Eldoc => Ok(eldoc(engine, session, &request)),
    };
    outcome.unwrap_or_else(|error| boundary_fault(session, &request, &error))
}

/// Converts a handler failure into the fault report shape; the connection
/// always continues.
fn boundary_fault(
    session: &SessionContext,
    request: &Request,
    error: &DispatchError,
) -> Vec<Value> {
    let summary = format!("RequestError: {error}");
    let ns = session.namespace();
    vec![
        Reply::to(request).field("err", summary.as_str()).message(),
        Reply::to(request)
            .field("ex", summary.as_str())
            .field("ns", ns)
            .status(&["eval-error"]),
        Reply::to(request).field("ns", ns).done(),
    ]
}

fn clone_session(request: &Request) -> Vec<Value> {
    let token = Uuid::new_v4().to_string();
    vec![Reply::to(request).field("new-session", token).done()]
}

fn describe(request: &Request) -> Vec<Value> {
    let ops: Fields = Op::ALL
        .iter()
        .map(|op| (op.as_str().to_owned(), Value::Map(Fields::new())))
        .collect();

    let version = |value: String| {
        let mut fields = Fields::new();
        fields.insert("version-string".to_owned(), Value::Str(value));
        Value::Map(fields)
    };
    let mut versions = Fields::new();
    versions.insert(
        "runtime".to_owned(),
        version(env!("CARGO_PKG_VERSION").to_owned()),
    );
    versions.insert(
        "host".to_owned(),
        version(format!(
            "{}/{}",
            std::env::consts::OS,
            std::env::consts::ARCH
        )),
    );

    vec![
        Reply::to(request)
            .field("ops", Value::Map(ops))
            .field("versions", Value::Map(versions))
            .done(),
    ]
}

fn eval(
    engine: &Engine,
    session: &mut SessionContext,
    request: &Request,
    op: Op,
) -> Result<Vec<Value>, DispatchError> {
    let (code_field, source) = if op == Op::LoadFile {
        let source = SourceLabel::file(
            request.text_field("file-name").map(ToOwned::to_owned),
            request.text_field("file-path").map(ToOwned::to_owned),
        );
        ("file", source)
    } else {
        ("code", SourceLabel::repl())
    };

    // The requested namespace is only a starting hint; the namespace
    // reported back reflects wherever evaluation leaves it.
    if let Some(ns) = request.text_field("ns") {
        session.set_namespace(ns);
    }
    let code = request.require_text(op.as_str(), code_field)?;
    let evaluation = engine
        .evaluator()
        .evaluate(session.namespace(), code, &source);

    let mut responses: Vec<Value> = evaluation
        .writes
        .iter()
        .map(|chunk| Reply::to(request).field("out", chunk.as_str()).message())
        .collect();

    session.set_namespace(evaluation.namespace);
    let ns = session.namespace().to_owned();
    match evaluation.outcome {
        Ok(value) => {
            session.remember(value.clone());
            responses.push(
                Reply::to(request)
                    .field("ns", ns.as_str())
                    .field("value", value)
                    .message(),
            );
            responses.push(Reply::to(request).field("ns", ns.as_str()).done());
        }
        Err(fault) => {
            session.record_fault(fault.clone());
            responses.push(Reply::to(request).field("err", fault.summary.as_str()).message());
            responses.push(
                Reply::to(request)
                    .field("ex", fault.trace.as_str())
                    .field("ns", ns.as_str())
                    .status(&["eval-error"]),
            );
            responses.push(Reply::to(request).field("ns", ns.as_str()).done());
        }
    }
    Ok(responses)
}

fn complete(engine: &Engine, session: &SessionContext, request: &Request) -> Vec<Value> {
    let namespace = request
        .text_field("ns")
        .unwrap_or_else(|| session.namespace());
    let query = request.lookup_text().unwrap_or("");
    let completions: Vec<Value> = search(engine.registry(), namespace, query)
        .into_iter()
        .map(|candidate| {
            let mut fields = Fields::new();
            fields.insert("candidate".to_owned(), Value::Str(candidate.text));
            if let Some(owner) = candidate.namespace {
                fields.insert("ns".to_owned(), Value::Str(owner));
            }
            if let Some(kind) = candidate.kind {
                fields.insert("type".to_owned(), Value::text(kind.as_str()));
            }
            Value::Map(fields)
        })
        .collect();
    vec![
        Reply::to(request)
            .field("completions", completions)
            .done(),
    ]
}

fn info(engine: &Engine, session: &SessionContext, request: &Request) -> Vec<Value> {
    let namespace = request
        .text_field("ns")
        .unwrap_or_else(|| session.namespace());
    let resolved = request
        .lookup_text()
        .map(|token| resolve(engine.registry(), namespace, token));
    let response = match resolved {
        Some(Resolved::Var(record)) => Reply::to(request)
            .field("ns", record.namespace.as_str())
            .field("name", record.name.as_str())
            .field_if("doc", record.meta.doc.as_deref())
            .field_if("file", record.meta.file.as_deref())
            .field_if("line", record.meta.line.map(i64::from))
            .field_if("arglists-str", record.meta.arglists_str())
            .done(),
        _ => Reply::to(request).done(),
    };
    vec![response]
}

fn eldoc(engine: &Engine, session: &SessionContext, request: &Request) -> Vec<Value> {
    let namespace = request
        .text_field("ns")
        .unwrap_or_else(|| session.namespace());
    let resolved = request
        .lookup_text()
        .map(|token| resolve(engine.registry(), namespace, token));
    let response = match resolved {
        Some(Resolved::Var(record))
            if matches!(record.meta.kind, VarKind::Function | VarKind::Macro) =>
        {
            let arities: Vec<Value> = record
                .meta
                .arglists
                .iter()
                .map(|params| Value::text_list(params.iter().map(String::as_str)))
                .collect();
            let kind = if record.meta.kind == VarKind::Macro {
                "macro"
            } else {
                "function"
            };
            Reply::to(request)
                .field("ns", record.namespace.as_str())
                .field("name", record.name.as_str())
                .field("type", kind)
                .field_if("docstring", record.meta.doc.as_deref())
                .field("eldoc", arities)
                .done()
        }
        _ => Reply::to(request).status(&["done", "no-eldoc"]),
    };
    vec![response]
}
