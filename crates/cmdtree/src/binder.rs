//! Binding callbacks to their owning command.
//!
//! [`bind`] pairs a [`Callback`] with the [`TyperCommand`] it belongs to and
//! produces a [`BoundCallback`], a unit that can be called directly. The
//! bound unit passes the owner as the first argument when the callback is
//! instance-aware and calls the raw function unchanged otherwise.
//!
//! Calling a bound callback programmatically skips token parsing: positional
//! and keyword values are matched against the declared parameters, coerced,
//! defaulted, and checked for completeness before the function runs.

use serde_json::{Map, Value};
use std::rc::Rc;

use crate::command::TyperCommand;
use crate::context::{Context, ParamSource};
use crate::current::CurrentCommand;
use crate::error::{Error, UsageError, UsageKind};
use crate::handler::{Args, Callback, Func, HandlerResult, Receiver};

/// Positional and keyword values for a programmatic call.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: Map<String, Value>,
    results: Vec<Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional value.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a keyword value.
    pub fn kw(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Results handed to a finalizer.
    pub fn results(mut self, results: Vec<Value>) -> Self {
        self.results = results;
        self
    }

    pub fn from_map(keyword: Map<String, Value>) -> Self {
        Self {
            keyword,
            ..Self::default()
        }
    }
}

/// A callback bound to its owner.
#[derive(Clone)]
pub struct BoundCallback {
    callback: Callback,
    owner: TyperCommand,
}

impl std::fmt::Debug for BoundCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCallback")
            .field("callback", &self.callback)
            .finish_non_exhaustive()
    }
}

/// Binds `callback` to `owner`.
pub fn bind(callback: &Callback, owner: &TyperCommand) -> BoundCallback {
    BoundCallback {
        callback: callback.clone(),
        owner: owner.clone(),
    }
}

impl BoundCallback {
    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    pub fn name(&self) -> &str {
        self.callback.name()
    }

    pub fn receiver(&self) -> Receiver {
        self.callback.receiver()
    }

    pub fn owner(&self) -> &TyperCommand {
        &self.owner
    }

    /// Runs the function with already-resolved arguments.
    pub fn invoke(&self, args: &Args) -> HandlerResult {
        match self.callback.func() {
            Func::Method(f) => f(&self.owner, args),
            Func::Free(f) => f(args),
        }
    }

    /// Calls the function with typed values, bypassing token parsing.
    pub fn call(&self, call: CallArgs) -> Result<Value, Error> {
        let _guard = CurrentCommand::enter(&self.owner);
        let values = self.resolve(call.positional, call.keyword)?;

        let ctx = Context::root(self.callback.name(), self.owner.clone(), values.clone());
        for (name, value) in &values {
            ctx.set(name, value.clone(), ParamSource::Supplied);
        }
        let args = Args::from_values(values)
            .with_context(Rc::clone(&ctx))
            .with_results(call.results);
        self.invoke(&args).map_err(Error::Handler)
    }

    fn resolve(
        &self,
        positional: Vec<Value>,
        mut keyword: Map<String, Value>,
    ) -> Result<Map<String, Value>, UsageError> {
        let params = self.callback.declared_params();
        if positional.len() > params.len() {
            return Err(UsageError::new(
                UsageKind::Other,
                format!(
                    "{}() takes {} positional arguments but {} were given",
                    self.callback.name(),
                    params.len(),
                    positional.len()
                ),
            ));
        }

        let mut values = Map::new();
        let mut positional = positional.into_iter();
        for p in params {
            let from_position = positional.next();
            let from_keyword = keyword.remove(p.name());
            let value = match (from_position, from_keyword) {
                (Some(_), Some(_)) => {
                    return Err(UsageError::new(
                        UsageKind::Conflict,
                        format!("got multiple values for argument '{}'", p.name()),
                    ))
                }
                (Some(v), None) | (None, Some(v)) => p.coerce(v)?,
                (None, None) => match p.default_value() {
                    Some(default) => default.clone(),
                    None if p.is_required() => return Err(UsageError::missing(p.name())),
                    None => Value::Null,
                },
            };
            values.insert(p.name().to_string(), value);
        }

        if let Some(unknown) = keyword.keys().next() {
            return Err(UsageError::no_such_option(unknown));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::CommandClass;
    use crate::param::Param;
    use serde_json::json;

    fn owner() -> TyperCommand {
        let class = CommandClass::define("bind")
            .command(Callback::function("noop", |_a| Ok::<_, anyhow::Error>(())))
            .build()
            .unwrap();
        TyperCommand::new(class)
    }

    fn divide() -> Callback {
        Callback::function("divide", |args| -> anyhow::Result<f64> {
            let n: f64 = args.get("numerator")?;
            let d: f64 = args.get("denominator")?;
            let floor: bool = args.get("floor")?;
            Ok(if floor { (n / d).floor() } else { n / d })
        })
        .param(Param::argument("numerator").float())
        .param(Param::argument("denominator").float())
        .param(Param::flag("floor"))
    }

    #[test]
    fn test_free_function_ignores_owner() {
        let bound = bind(&divide(), &owner());
        assert_eq!(bound.receiver(), Receiver::Free);
        let v = bound.call(CallArgs::new().arg(3).arg(2)).unwrap();
        assert_eq!(v, json!(1.5));
    }

    #[test]
    fn test_method_receives_owner() {
        let cb = Callback::method("whoami", |cmd, _args| {
            Ok::<_, anyhow::Error>(cmd.name().to_string())
        });
        let bound = bind(&cb, &owner());
        assert_eq!(bound.receiver(), Receiver::Instance);
        assert_eq!(bound.call(CallArgs::new()).unwrap(), json!("bind"));
    }

    #[test]
    fn test_keyword_and_defaults() {
        let bound = bind(&divide(), &owner());
        let v = bound
            .call(CallArgs::new().arg(7).kw("denominator", 2).kw("floor", true))
            .unwrap();
        assert_eq!(v, json!(3.0));
    }

    #[test]
    fn test_missing_required_is_usage_error() {
        let bound = bind(&divide(), &owner());
        let err = bound.call(CallArgs::new().arg(1)).unwrap_err();
        let usage = err.as_usage().unwrap();
        assert_eq!(usage.kind, UsageKind::MissingParameter);
        assert!(usage.message.contains("denominator"));
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let bound = bind(&divide(), &owner());
        let err = bound
            .call(CallArgs::new().arg(1).arg(2).kw("verbosity", 3))
            .unwrap_err();
        assert_eq!(err.as_usage().unwrap().kind, UsageKind::NoSuchOption);
    }

    #[test]
    fn test_duplicate_value_rejected() {
        let bound = bind(&divide(), &owner());
        let err = bound
            .call(CallArgs::new().arg(1).arg(2).kw("numerator", 5))
            .unwrap_err();
        assert_eq!(err.as_usage().unwrap().kind, UsageKind::Conflict);
    }

    #[test]
    fn test_too_many_positionals() {
        let bound = bind(&divide(), &owner());
        let err = bound
            .call(CallArgs::new().arg(1).arg(2).arg(true).arg(4))
            .unwrap_err();
        assert!(err.is_usage());
    }
}
