//! Registered callables.
//!
//! This module provides the types user code is written against:
//!
//! - [`Callback`]: a named function plus its declared parameters, tagged as
//!   either instance-aware ([`Callback::method`]) or free
//!   ([`Callback::function`]).
//! - [`Args`]: the keyword view a callback receives, filtered down to the
//!   parameters it declared.
//! - [`HandlerResult`] / [`IntoHandlerResult`]: the return convention.
//!
//! # Instance-aware vs free functions
//!
//! A method receives the owning [`TyperCommand`] as its first argument; a free
//! function does not. The tag is chosen by the constructor rather than inferred
//! from the closure, so a function whose first parameter happens to be typed is
//! never mistaken for a method:
//!
//! ```rust,ignore
//! let multiply = Callback::method("multiply", |cmd, args| {
//!     let precision = cmd.state::<Precision>().map(|p| p.0).unwrap_or(2);
//!     let numbers: Vec<f64> = args.get("numbers")?;
//!     Ok::<_, anyhow::Error>(format!("{:.*}", precision, numbers.iter().product::<f64>()))
//! })
//! .param(Param::argument("numbers").float().multiple());
//!
//! let ping = Callback::function("ping", |_args| Ok::<_, anyhow::Error>("pong"));
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::command::TyperCommand;
use crate::context::Context;
use crate::param::Param;

/// Per-instance state keyed by type.
///
/// Initializers store values; subcommands read them back through
/// [`TyperCommand::state`].
#[derive(Default)]
pub(crate) struct StateMap {
    map: HashMap<TypeId, Box<dyn Any>>,
}

impl StateMap {
    /// Inserts a value, returning the previous value of the same type.
    pub(crate) fn insert<T: 'static>(&mut self, val: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(val))
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    pub(crate) fn get<T: 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }
}

impl fmt::Debug for StateMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMap")
            .field("len", &self.map.len())
            .finish_non_exhaustive()
    }
}

/// The result type for callbacks.
pub type HandlerResult = Result<Value, anyhow::Error>;

/// Trait for types that can be converted into a [`HandlerResult`].
///
/// Any `Result<T, E>` with a serializable `T` qualifies; `()` becomes
/// `Value::Null`, which the command treats as "no output".
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> HandlerResult;
}

impl<T, E> IntoHandlerResult for Result<T, E>
where
    T: Serialize,
    E: Into<anyhow::Error>,
{
    fn into_handler_result(self) -> HandlerResult {
        let value = self.map_err(Into::into)?;
        serde_json::to_value(value)
            .map_err(|e| anyhow::anyhow!("Failed to serialize handler result: {}", e))
    }
}

/// Whether a callback expects the owning command as its first argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    Instance,
    Free,
}

type MethodFn = Rc<dyn Fn(&TyperCommand, &Args) -> HandlerResult>;
type FreeFn = Rc<dyn Fn(&Args) -> HandlerResult>;

#[derive(Clone)]
pub(crate) enum Func {
    Method(MethodFn),
    Free(FreeFn),
}

/// A named, registered function.
#[derive(Clone)]
pub struct Callback {
    name: String,
    params: Vec<Param>,
    doc: Option<String>,
    func: Func,
    synthetic: bool,
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("name", &self.name)
            .field("receiver", &self.receiver())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Callback {
    /// An instance-aware function; receives the owning command first.
    pub fn method<F, R>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&TyperCommand, &Args) -> R + 'static,
        R: IntoHandlerResult,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            doc: None,
            func: Func::Method(Rc::new(move |cmd, args| f(cmd, args).into_handler_result())),
            synthetic: false,
        }
    }

    /// A free function that does not take the owning command.
    pub fn function<F, R>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Args) -> R + 'static,
        R: IntoHandlerResult,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            doc: None,
            func: Func::Free(Rc::new(move |args| f(args).into_handler_result())),
            synthetic: false,
        }
    }

    /// Placeholder initializer that does nothing.
    pub(crate) fn noop(name: impl Into<String>) -> Self {
        let mut cb = Self::function(name, |_args| Ok::<_, anyhow::Error>(()));
        cb.synthetic = true;
        cb
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn params<I: IntoIterator<Item = Param>>(mut self, params: I) -> Self {
        self.params.extend(params);
        self
    }

    /// Documentation, used as help text when nothing more specific is set.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_params(&self) -> &[Param] {
        &self.params
    }

    pub fn doc_text(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn receiver(&self) -> Receiver {
        match self.func {
            Func::Method(_) => Receiver::Instance,
            Func::Free(_) => Receiver::Free,
        }
    }

    pub(crate) fn func(&self) -> &Func {
        &self.func
    }

    /// True for the initializer the class assembly inserts on its own.
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Builds the argument view for this callback from a resolved context,
    /// keeping only the parameters the callback declared.
    pub fn collect_args(&self, ctx: &Rc<Context>, results: Vec<Value>) -> Args {
        let mut values = Map::new();
        for p in &self.params {
            let value = ctx.get(p.name()).unwrap_or(Value::Null);
            values.insert(p.name().to_string(), value);
        }
        Args {
            values,
            context: Some(ctx.clone()),
            results,
        }
    }
}

/// Arguments handed to a callback.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Map<String, Value>,
    context: Option<Rc<Context>>,
    results: Vec<Value>,
}

impl Args {
    /// Builds a standalone argument set, mostly useful in tests.
    pub fn from_values(values: Map<String, Value>) -> Self {
        Self {
            values,
            context: None,
            results: Vec::new(),
        }
    }

    pub(crate) fn with_context(mut self, ctx: Rc<Context>) -> Self {
        self.context = Some(ctx);
        self
    }

    pub(crate) fn with_results(mut self, results: Vec<Value>) -> Self {
        self.results = results;
        self
    }

    /// Deserializes the named value. A parameter that resolved to nothing
    /// reads as `null`, so `Option<T>` targets see `None`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, anyhow::Error> {
        let value = self.values.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| anyhow::anyhow!("argument '{}' has an unexpected type: {}", name, e))
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// The invocation context, when invoked through the tree.
    pub fn context(&self) -> Option<&Rc<Context>> {
        self.context.as_ref()
    }

    /// Results of the subcommands, for finalizers.
    pub fn results(&self) -> &[Value] {
        &self.results
    }

    /// All values as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }
}
