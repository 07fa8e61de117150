//! Bundled evaluator binding: a small Lisp interpreter.
//!
//! The daemon treats the evaluator as an external capability; this module
//! is the concrete binding the workspace ships so the daemon runs end to
//! end. It covers literals, `quote`, `def`/`defn`/`defmacro`, `fn`, `do`,
//! `if`, `let`, `var`, `in-ns`, `alias`, integer arithmetic, and
//! `print`/`println` side effects. Definitions intern metadata into the
//! shared [`NamespaceRegistry`] so resolution and completion see them
//! immediately.

mod reader;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::eval::{Evaluation, Evaluator, Fault, SourceLabel};
use crate::registry::{CORE_NAMESPACE, NamespaceRegistry, VarKind, VarMeta};
use reader::Form;

/// Default namespace interactive sessions start in.
pub(crate) const USER_NAMESPACE: &str = "user";

const CORE_FILE: &str = "tether/core.tl";

/// Built-in functions dispatched by name.
const BUILTINS: &[&str] = &["+", "-", "*", "/", "println", "print", "in-ns", "alias"];

type Env = HashMap<String, Datum>;
type Bindings = HashMap<(String, String), Datum>;

#[derive(Debug, Clone, PartialEq)]
enum Datum {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    Keyword(String),
    Sym(String),
    List(Vec<Datum>),
    Fn(Arc<Lambda>),
    Builtin(&'static str),
    Var { namespace: String, name: String },
}

#[derive(Debug, PartialEq)]
struct Lambda {
    name: Option<String>,
    params: Vec<String>,
    body: Vec<Form>,
}

impl Datum {
    /// Readable printed form, the `value` reported for an evaluation.
    fn print(&self) -> String {
        match self {
            Self::Nil => "nil".to_owned(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Str(text) => format!("{text:?}"),
            Self::Keyword(text) | Self::Sym(text) => text.clone(),
            Self::List(items) => {
                let rendered: Vec<String> = items.iter().map(Datum::print).collect();
                format!("({})", rendered.join(" "))
            }
            Self::Fn(lambda) => match &lambda.name {
                Some(name) => format!("#<fn {name}>"),
                None => "#<fn>".to_owned(),
            },
            Self::Builtin(name) => format!("#<builtin {name}>"),
            Self::Var { namespace, name } => format!("#'{namespace}/{name}"),
        }
    }

    /// Human form used by `print`/`println`: text without quoting.
    fn display(&self) -> String {
        match self {
            Self::Str(text) => text.clone(),
            other => other.print(),
        }
    }

    fn truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Bool(false))
    }
}

/// Fault before it is formatted against a namespace and source label.
struct EvalFault {
    type_name: &'static str,
    message: String,
}

impl EvalFault {
    fn new(type_name: &'static str, message: impl Into<String>) -> Self {
        Self {
            type_name,
            message: message.into(),
        }
    }

    fn name_error(message: impl Into<String>) -> Self {
        Self::new("NameError", message)
    }

    fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    fn arity_error(message: impl Into<String>) -> Self {
        Self::new("ArityError", message)
    }

    fn arithmetic(message: impl Into<String>) -> Self {
        Self::new("ArithmeticError", message)
    }

    fn into_fault(self, namespace: &str, source: &SourceLabel) -> Fault {
        let summary = format!("{}: {}", self.type_name, self.message);
        let trace = format!("{summary}\n    in {namespace} ({})", source.location());
        Fault { summary, trace }
    }
}

struct EvalState {
    namespace: String,
    writes: Vec<String>,
    location: String,
}

/// The bundled [`Evaluator`] implementation.
pub struct Interpreter {
    registry: Arc<NamespaceRegistry>,
    bindings: RwLock<Bindings>,
}

impl Interpreter {
    /// Builds an interpreter over `registry`, seeding the core namespace
    /// and referring it into the default user namespace.
    #[must_use]
    pub fn bootstrap(registry: Arc<NamespaceRegistry>) -> Self {
        seed_core(&registry);
        registry.ensure_namespace(USER_NAMESPACE);
        // seed_core loaded the core namespace, so the refer cannot miss.
        let _ = registry.refer_all(USER_NAMESPACE, CORE_NAMESPACE);
        Self {
            registry,
            bindings: RwLock::new(Bindings::new()),
        }
    }

    fn stored_value(&self, namespace: &str, name: &str) -> Option<Datum> {
        if namespace == CORE_NAMESPACE
            && let Some(builtin) = BUILTINS.iter().copied().find(|builtin| *builtin == name)
        {
            return Some(Datum::Builtin(builtin));
        }
        self.bindings
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
    }

    fn store_value(&self, namespace: &str, name: &str, value: Datum) {
        self.bindings
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((namespace.to_owned(), name.to_owned()), value);
    }

    fn lookup_symbol(&self, state: &EvalState, env: &Env, name: &str) -> Result<Datum, EvalFault> {
        if let Some(datum) = env.get(name) {
            return Ok(datum.clone());
        }
        if name != "/"
            && let Some((prefix, base)) = name.split_once('/')
        {
            let target = self
                .registry
                .alias_target(&state.namespace, prefix)
                .or_else(|| self.registry.namespace_exists(prefix).then(|| prefix.to_owned()));
            return target
                .and_then(|target| self.stored_value(&target, base))
                .ok_or_else(|| {
                    EvalFault::name_error(format!("unable to resolve symbol '{name}' in this context"))
                });
        }
        if let Some(datum) = self.stored_value(&state.namespace, name) {
            return Ok(datum);
        }
        if let Some(record) = self.registry.referred_in(&state.namespace, name) {
            if let Some(datum) = self.stored_value(&record.namespace, &record.name) {
                return Ok(datum);
            }
        }
        // Builtins stay reachable from every namespace, refers or not.
        if let Some(builtin) = BUILTINS.iter().copied().find(|builtin| *builtin == name) {
            return Ok(Datum::Builtin(builtin));
        }
        Err(EvalFault::name_error(format!(
            "unable to resolve symbol '{name}' in this context"
        )))
    }

    fn eval_form(&self, state: &mut EvalState, env: &Env, form: &Form) -> Result<Datum, EvalFault> {
        match form {
            Form::Nil => Ok(Datum::Nil),
            Form::Bool(value) => Ok(Datum::Bool(*value)),
            Form::Int(value) => Ok(Datum::Int(*value)),
            Form::Str(text) => Ok(Datum::Str(text.clone())),
            Form::Keyword(text) => Ok(Datum::Keyword(text.clone())),
            Form::Sym(name) => self.lookup_symbol(state, env, name),
            Form::Vector(items) => {
                let mut evaluated = Vec::with_capacity(items.len());
                for item in items {
                    evaluated.push(self.eval_form(state, env, item)?);
                }
                Ok(Datum::List(evaluated))
            }
            Form::List(items) => self.eval_list(state, env, items),
        }
    }

    fn eval_list(&self, state: &mut EvalState, env: &Env, items: &[Form]) -> Result<Datum, EvalFault> {
        let Some((head, args)) = items.split_first() else {
            return Ok(Datum::List(Vec::new()));
        };
        if let Form::Sym(name) = head {
            match name.as_str() {
                "quote" => {
                    return match args {
                        [form] => Ok(datum_of_form(form)),
                        _ => Err(EvalFault::arity_error("quote expects exactly one form")),
                    };
                }
                "def" => return self.eval_def(state, env, args),
                "defn" => return self.eval_defn(state, args, VarKind::Function),
                "defmacro" => return self.eval_defn(state, args, VarKind::Macro),
                "fn" => return eval_lambda(None, args),
                "do" => {
                    let mut last = Datum::Nil;
                    for form in args {
                        last = self.eval_form(state, env, form)?;
                    }
                    return Ok(last);
                }
                "if" => return self.eval_if(state, env, args),
                "let" => return self.eval_let(state, env, args),
                "var" => return self.eval_var(state, args),
                "loop" | "recur" | "throw" | "try" | "catch" | "finally" => {
                    return Err(EvalFault::new(
                        "UnsupportedError",
                        format!("special form '{name}' is not supported by this runtime"),
                    ));
                }
                _ => {}
            }
        }
        let callee = self.eval_form(state, env, head)?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_form(state, env, arg)?);
        }
        self.apply(state, &callee, values)
    }

    fn eval_def(&self, state: &mut EvalState, env: &Env, args: &[Form]) -> Result<Datum, EvalFault> {
        let Some(Form::Sym(name)) = args.first() else {
            return Err(EvalFault::type_error("def expects a symbol name"));
        };
        let (doc, init) = match &args[1..] {
            [] => (None, None),
            [init] => (None, Some(init)),
            [Form::Str(doc), init] => (Some(doc.clone()), Some(init)),
            _ => return Err(EvalFault::arity_error("def expects (def name doc? init?)")),
        };
        let value = match init {
            Some(form) => self.eval_form(state, env, form)?,
            None => Datum::Nil,
        };
        self.registry.intern(
            &state.namespace,
            name,
            VarMeta {
                kind: VarKind::Value,
                doc,
                file: Some(state.location.clone()),
                ..VarMeta::default()
            },
        );
        self.store_value(&state.namespace, name, value);
        Ok(Datum::Var {
            namespace: state.namespace.clone(),
            name: name.clone(),
        })
    }

    fn eval_defn(&self, state: &mut EvalState, args: &[Form], kind: VarKind) -> Result<Datum, EvalFault> {
        let Some(Form::Sym(name)) = args.first() else {
            return Err(EvalFault::type_error("defn expects a symbol name"));
        };
        let mut rest = &args[1..];
        let doc = match rest.first() {
            Some(Form::Str(doc)) if rest.len() > 1 => {
                rest = &rest[1..];
                Some(doc.clone())
            }
            _ => None,
        };
        let lambda = eval_lambda(Some(name.clone()), rest)?;
        let Datum::Fn(ref definition) = lambda else {
            return Err(EvalFault::type_error("defn expects a parameter vector"));
        };
        self.registry.intern(
            &state.namespace,
            name,
            VarMeta {
                kind,
                doc,
                file: Some(state.location.clone()),
                arglists: vec![definition.params.clone()],
                ..VarMeta::default()
            },
        );
        self.store_value(&state.namespace, name, lambda);
        Ok(Datum::Var {
            namespace: state.namespace.clone(),
            name: name.clone(),
        })
    }

    fn eval_if(&self, state: &mut EvalState, env: &Env, args: &[Form]) -> Result<Datum, EvalFault> {
        let (condition, branches) = match args {
            [condition, rest @ ..] if (1..=2).contains(&rest.len()) => (condition, rest),
            _ => return Err(EvalFault::arity_error("if expects (if test then else?)")),
        };
        if self.eval_form(state, env, condition)?.truthy() {
            self.eval_form(state, env, &branches[0])
        } else {
            match branches.get(1) {
                Some(form) => self.eval_form(state, env, form),
                None => Ok(Datum::Nil),
            }
        }
    }

    fn eval_let(&self, state: &mut EvalState, env: &Env, args: &[Form]) -> Result<Datum, EvalFault> {
        let Some(Form::Vector(bindings)) = args.first() else {
            return Err(EvalFault::type_error("let expects a binding vector"));
        };
        if bindings.len() % 2 != 0 {
            return Err(EvalFault::arity_error("let binding vector needs name/value pairs"));
        }
        let mut scope = env.clone();
        for pair in bindings.chunks(2) {
            let Form::Sym(name) = &pair[0] else {
                return Err(EvalFault::type_error("let binds symbols only"));
            };
            let value = self.eval_form(state, &scope, &pair[1])?;
            scope.insert(name.clone(), value);
        }
        let mut last = Datum::Nil;
        for form in &args[1..] {
            last = self.eval_form(state, &scope, form)?;
        }
        Ok(last)
    }

    fn eval_var(&self, state: &EvalState, args: &[Form]) -> Result<Datum, EvalFault> {
        let [Form::Sym(name)] = args else {
            return Err(EvalFault::type_error("var expects a symbol"));
        };
        let record = self
            .registry
            .var_in(&state.namespace, name)
            .or_else(|| self.registry.referred_in(&state.namespace, name))
            .ok_or_else(|| EvalFault::name_error(format!("no var named '{name}'")))?;
        Ok(Datum::Var {
            namespace: record.namespace,
            name: record.name,
        })
    }

    fn apply(&self, state: &mut EvalState, callee: &Datum, args: Vec<Datum>) -> Result<Datum, EvalFault> {
        match callee {
            Datum::Builtin(name) => self.apply_builtin(state, name, args),
            Datum::Fn(lambda) => {
                if args.len() != lambda.params.len() {
                    let label = lambda.name.as_deref().unwrap_or("fn");
                    return Err(EvalFault::arity_error(format!(
                        "wrong number of arguments ({}) passed to {label}",
                        args.len()
                    )));
                }
                let env: Env = lambda.params.iter().cloned().zip(args).collect();
                let mut last = Datum::Nil;
                for form in &lambda.body {
                    last = self.eval_form(state, &env, form)?;
                }
                Ok(last)
            }
            other => Err(EvalFault::type_error(format!(
                "{} cannot be called as a function",
                other.print()
            ))),
        }
    }

    fn apply_builtin(&self, state: &mut EvalState, name: &str, args: Vec<Datum>) -> Result<Datum, EvalFault> {
        match name {
            "+" => fold_arithmetic(0, args, |acc, next| acc.checked_add(next)),
            "*" => fold_arithmetic(1, args, |acc, next| acc.checked_mul(next)),
            "-" => {
                let mut numbers = integers(args)?.into_iter();
                let first = numbers
                    .next()
                    .ok_or_else(|| EvalFault::arity_error("- expects at least one argument"))?;
                if numbers.len() == 0 {
                    return first
                        .checked_neg()
                        .map(Datum::Int)
                        .ok_or_else(|| EvalFault::arithmetic("integer overflow"));
                }
                numbers
                    .try_fold(first, i64::checked_sub)
                    .map(Datum::Int)
                    .ok_or_else(|| EvalFault::arithmetic("integer overflow"))
            }
            "/" => {
                let mut numbers = integers(args)?.into_iter();
                let first = numbers
                    .next()
                    .ok_or_else(|| EvalFault::arity_error("/ expects at least one argument"))?;
                let mut quotient = first;
                for divisor in numbers {
                    if divisor == 0 {
                        return Err(EvalFault::arithmetic("divide by zero"));
                    }
                    quotient = quotient
                        .checked_div(divisor)
                        .ok_or_else(|| EvalFault::arithmetic("integer overflow"))?;
                }
                Ok(Datum::Int(quotient))
            }
            "println" | "print" => {
                let rendered: Vec<String> = args.iter().map(Datum::display).collect();
                let mut chunk = rendered.join(" ");
                if name == "println" {
                    chunk.push('\n');
                }
                state.writes.push(chunk);
                Ok(Datum::Nil)
            }
            "in-ns" => {
                let [Datum::Sym(target)] = args.as_slice() else {
                    return Err(EvalFault::type_error("in-ns expects a namespace symbol"));
                };
                self.registry.ensure_namespace(target);
                state.namespace = target.clone();
                Ok(Datum::Sym(target.clone()))
            }
            "alias" => {
                let [Datum::Sym(alias), Datum::Sym(target)] = args.as_slice() else {
                    return Err(EvalFault::type_error("alias expects two namespace symbols"));
                };
                self.registry
                    .add_alias(&state.namespace, alias, target)
                    .map_err(|error| EvalFault::name_error(error.to_string()))?;
                Ok(Datum::Nil)
            }
            _ => Err(EvalFault::name_error(format!("unknown builtin '{name}'"))),
        }
    }
}

fn eval_lambda(name: Option<String>, args: &[Form]) -> Result<Datum, EvalFault> {
    let Some(Form::Vector(params)) = args.first() else {
        return Err(EvalFault::type_error("fn expects a parameter vector"));
    };
    let mut names = Vec::with_capacity(params.len());
    for param in params {
        let Form::Sym(param) = param else {
            return Err(EvalFault::type_error("fn parameters are symbols"));
        };
        names.push(param.clone());
    }
    Ok(Datum::Fn(Arc::new(Lambda {
        name,
        params: names,
        body: args[1..].to_vec(),
    })))
}

fn integers(args: Vec<Datum>) -> Result<Vec<i64>, EvalFault> {
    args.into_iter()
        .map(|arg| match arg {
            Datum::Int(value) => Ok(value),
            other => Err(EvalFault::type_error(format!(
                "expected an integer, got {}",
                other.print()
            ))),
        })
        .collect()
}

fn fold_arithmetic(
    identity: i64,
    args: Vec<Datum>,
    combine: impl Fn(i64, i64) -> Option<i64>,
) -> Result<Datum, EvalFault> {
    integers(args)?
        .into_iter()
        .try_fold(identity, |acc, next| combine(acc, next))
        .map(Datum::Int)
        .ok_or_else(|| EvalFault::arithmetic("integer overflow"))
}

fn datum_of_form(form: &Form) -> Datum {
    match form {
        Form::Nil => Datum::Nil,
        Form::Bool(value) => Datum::Bool(*value),
        Form::Int(value) => Datum::Int(*value),
        Form::Str(text) => Datum::Str(text.clone()),
        Form::Keyword(text) => Datum::Keyword(text.clone()),
        Form::Sym(name) => Datum::Sym(name.clone()),
        Form::List(items) | Form::Vector(items) => {
            Datum::List(items.iter().map(datum_of_form).collect())
        }
    }
}

impl Evaluator for Interpreter {
    fn evaluate(&self, namespace: &str, code: &str, source: &SourceLabel) -> Evaluation {
        let mut state = EvalState {
            namespace: namespace.to_owned(),
            writes: Vec::new(),
            location: source.location().to_owned(),
        };
        self.registry.ensure_namespace(&state.namespace);
        let forms = match reader::read_all(code) {
            Ok(forms) => forms,
            Err(error) => {
                let fault =
                    EvalFault::new("SyntaxError", error.to_string()).into_fault(&state.namespace, source);
                return Evaluation {
                    writes: state.writes,
                    namespace: state.namespace,
                    outcome: Err(fault),
                };
            }
        };
        let env = Env::new();
        let mut last = Datum::Nil;
        for form in &forms {
            match self.eval_form(&mut state, &env, form) {
                Ok(datum) => last = datum,
                Err(fault) => {
                    let fault = fault.into_fault(&state.namespace, source);
                    return Evaluation {
                        writes: state.writes,
                        namespace: state.namespace,
                        outcome: Err(fault),
                    };
                }
            }
        }
        Evaluation {
            writes: state.writes,
            namespace: state.namespace,
            outcome: Ok(last.print()),
        }
    }
}

/// Seeds the core namespace's metadata: name, kind, doc, arglists, line.
fn seed_core(registry: &NamespaceRegistry) {
    type CoreDef = (&'static str, VarKind, &'static str, &'static [&'static [&'static str]], u32);
    const CORE_DEFS: &[CoreDef] = &[
        (
            "+",
            VarKind::Function,
            "Returns the sum of its arguments; (+) is 0.",
            &[&[], &["x"], &["x", "y", "& more"]],
            7,
        ),
        (
            "-",
            VarKind::Function,
            "Subtracts the remaining arguments from the first; negates a single argument.",
            &[&["x"], &["x", "y", "& more"]],
            13,
        ),
        (
            "*",
            VarKind::Function,
            "Returns the product of its arguments; (*) is 1.",
            &[&[], &["x"], &["x", "y", "& more"]],
            19,
        ),
        (
            "/",
            VarKind::Function,
            "Divides the first argument by the remaining arguments.",
            &[&["x"], &["x", "y", "& more"]],
            25,
        ),
        (
            "println",
            VarKind::Function,
            "Prints its arguments separated by spaces, followed by a newline.",
            &[&["& args"]],
            32,
        ),
        (
            "print",
            VarKind::Function,
            "Prints its arguments separated by spaces.",
            &[&["& args"]],
            38,
        ),
        (
            "in-ns",
            VarKind::Function,
            "Switches the active namespace, creating it when missing.",
            &[&["ns-sym"]],
            44,
        ),
        (
            "alias",
            VarKind::Function,
            "Adds an alias for another namespace in the active namespace.",
            &[&["alias-sym", "ns-sym"]],
            50,
        ),
        (
            "defn",
            VarKind::Macro,
            "Defines a named function and interns it in the active namespace.",
            &[&["name", "doc-string?", "params", "& body"]],
            57,
        ),
        (
            "defmacro",
            VarKind::Macro,
            "Defines a macro and interns it in the active namespace.",
            &[&["name", "doc-string?", "params", "& body"]],
            64,
        ),
    ];

    for (name, kind, doc, arglists, line) in CORE_DEFS {
        registry.intern(
            CORE_NAMESPACE,
            name,
            VarMeta {
                kind: *kind,
                doc: Some((*doc).to_owned()),
                file: Some(CORE_FILE.to_owned()),
                line: Some(*line),
                arglists: arglists
                    .iter()
                    .map(|params| params.iter().map(|param| (*param).to_owned()).collect())
                    .collect(),
            },
        );
    }
}
