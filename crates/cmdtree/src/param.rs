//! Parameter descriptors.
//!
//! A [`Param`] is the unit the tree hands to clap. Callbacks declare their
//! parameters explicitly; each descriptor knows how to become one (or, for
//! toggles, two) `clap::Arg`s and how to pull a coerced [`Value`] back out of
//! the resulting [`ArgMatches`].
//!
//! Values travel as `serde_json::Value` so that command-line tokens, prompt
//! answers and programmatic keyword arguments all converge on the same
//! representation before a callback sees them.

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use clap::builder::{BoolishValueParser, PossibleValuesParser};
use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, ArgMatches};
use serde_json::Value;

use crate::context::Context;
use crate::error::UsageError;

/// Converts an attribute-style name into its CLI-facing form.
///
/// `grp1_cmd` becomes `grp1-cmd`.
pub fn cli_name(attr: &str) -> String {
    attr.replace('_', "-")
}

/// Normalizes a CLI-facing or flag name back into a parameter name.
///
/// `--no-color` becomes `no_color`.
pub fn normalize_name(name: &str) -> String {
    name.trim_start_matches('-').replace('-', "_")
}

/// The scalar type a parameter coerces to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Str,
    Int,
    Float,
    Bool,
    Path,
    Choice(Vec<String>),
}

/// How a parameter appears on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Positional argument.
    Argument,
    /// `--name VALUE` option.
    Option,
    /// `--name` boolean flag, false unless given.
    Flag,
    /// `--name / --no-name` pair.
    Toggle,
}

/// A shell completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    pub value: String,
    pub help: Option<String>,
}

impl CompletionItem {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            help: None,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// User supplied completer: receives the context, the parameter and the
/// partial input.
pub type Completer = Rc<dyn Fn(&Context, &Param, &str) -> Vec<CompletionItem>>;

/// A declared parameter of a command, group initializer or finalizer.
#[derive(Clone)]
pub struct Param {
    name: String,
    kind: ParamKind,
    value_type: ValueType,
    multiple: bool,
    required: bool,
    default: Option<Value>,
    help: Option<String>,
    panel: Option<String>,
    hidden: bool,
    long: Option<String>,
    short: Option<char>,
    prompt: Option<String>,
    env: Option<String>,
    completer: Option<Completer>,
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value_type", &self.value_type)
            .field("multiple", &self.multiple)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}

impl Param {
    fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value_type: ValueType::Str,
            multiple: false,
            required: false,
            default: None,
            help: None,
            panel: None,
            hidden: false,
            long: None,
            short: None,
            prompt: None,
            env: None,
            completer: None,
        }
    }

    /// A positional argument. Required unless a default is given.
    pub fn argument(name: impl Into<String>) -> Self {
        let mut p = Self::new(name, ParamKind::Argument);
        p.required = true;
        p
    }

    /// A named option, optional unless marked [`required`](Self::required).
    pub fn option(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Option)
    }

    /// A boolean flag defaulting to false.
    pub fn flag(name: impl Into<String>) -> Self {
        let mut p = Self::new(name, ParamKind::Flag);
        p.value_type = ValueType::Bool;
        p.default = Some(Value::Bool(false));
        p
    }

    /// A `--name / --no-name` boolean pair with the given default.
    pub fn toggle(name: impl Into<String>, default: bool) -> Self {
        let mut p = Self::new(name, ParamKind::Toggle);
        p.value_type = ValueType::Bool;
        p.default = Some(Value::Bool(default));
        p
    }

    pub fn str(mut self) -> Self {
        self.value_type = ValueType::Str;
        self
    }

    pub fn int(mut self) -> Self {
        self.value_type = ValueType::Int;
        self
    }

    pub fn float(mut self) -> Self {
        self.value_type = ValueType::Float;
        self
    }

    pub fn boolean(mut self) -> Self {
        self.value_type = ValueType::Bool;
        self
    }

    pub fn path(mut self) -> Self {
        self.value_type = ValueType::Path;
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.value_type = ValueType::Choice(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Accepts several values (positional `nargs=-1`, or a repeatable option).
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets a default, which also makes the parameter optional.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.required = false;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Help panel (clap help heading) this parameter is listed under.
    pub fn panel(mut self, panel: impl Into<String>) -> Self {
        self.panel = Some(panel.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Overrides the long flag name (without leading dashes).
    pub fn long(mut self, long: impl Into<String>) -> Self {
        self.long = Some(long.into());
        self
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Asks for the value interactively when it was not given.
    pub fn prompt(mut self, text: impl Into<String>) -> Self {
        self.prompt = Some(text.into());
        self
    }

    /// Falls back to an environment variable when absent from the command line.
    pub fn env(mut self, var: impl Into<String>) -> Self {
        self.env = Some(var.into());
        self
    }

    pub fn completer<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context, &Param, &str) -> Vec<CompletionItem> + 'static,
    {
        self.completer = Some(Rc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// True when the parameter must be given and has no default.
    pub fn is_required(&self) -> bool {
        self.required && self.default.is_none()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn completer_fn(&self) -> Option<&Completer> {
        self.completer.as_ref()
    }

    /// The long flag, without leading dashes.
    pub fn long_flag(&self) -> String {
        self.long.clone().unwrap_or_else(|| cli_name(&self.name))
    }

    /// Option strings as they appear on the command line.
    pub fn option_strings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.kind == ParamKind::Argument {
            return out;
        }
        if let Some(s) = self.short {
            out.push(format!("-{}", s));
        }
        out.push(format!("--{}", self.long_flag()));
        if self.kind == ParamKind::Toggle {
            out.push(format!("--no-{}", self.long_flag()));
        }
        out
    }

    /// True if `token` is one of this parameter's flags and expects a value
    /// in the following token.
    pub fn consumes_next(&self, token: &str) -> bool {
        matches!(self.kind, ParamKind::Option)
            && !token.contains('=')
            && self.option_strings().iter().any(|s| s == token)
    }

    fn negative_id(&self) -> String {
        format!("no_{}", self.name)
    }

    /// Builds the clap arguments for this parameter.
    ///
    /// With `relax` set, the argument is never marked required; the caller
    /// takes responsibility for the value (supplied or prompted).
    pub fn to_args(&self, relax: bool) -> Vec<Arg> {
        let required = self.is_required() && !relax && self.prompt.is_none();
        let mut arg = Arg::new(self.name.clone());

        match self.kind {
            ParamKind::Argument => {
                arg = arg
                    .value_name(self.name.to_uppercase())
                    .required(required)
                    .value_parser(self.value_parser());
                if self.multiple {
                    arg = arg.num_args(1..).action(ArgAction::Append);
                } else {
                    arg = arg.action(ArgAction::Set);
                }
                arg = self.with_default(arg);
            }
            ParamKind::Option => {
                arg = arg
                    .long(self.long_flag())
                    .value_name(self.name.to_uppercase())
                    .required(required)
                    .value_parser(self.value_parser());
                if self.multiple {
                    arg = arg.action(ArgAction::Append);
                } else {
                    arg = arg.action(ArgAction::Set);
                }
                arg = self.with_default(arg);
            }
            ParamKind::Flag | ParamKind::Toggle => {
                arg = arg.long(self.long_flag()).action(ArgAction::SetTrue);
            }
        }

        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        if let Some(help) = &self.help {
            arg = arg.help(help.clone());
        }
        if let Some(panel) = &self.panel {
            arg = arg.help_heading(panel.clone());
        }
        if let Some(var) = &self.env {
            arg = arg.env(var.clone());
        }
        if self.hidden {
            arg = arg.hide(true);
        }

        if self.kind != ParamKind::Toggle {
            return vec![arg];
        }

        let neg_id = self.negative_id();
        let arg = arg.overrides_with(neg_id.clone());
        let mut neg = Arg::new(neg_id)
            .long(format!("no-{}", self.long_flag()))
            .action(ArgAction::SetTrue)
            .overrides_with(self.name.clone())
            .help(format!("Negates --{}", self.long_flag()));
        if let Some(panel) = &self.panel {
            neg = neg.help_heading(panel.clone());
        }
        if self.hidden {
            neg = neg.hide(true);
        }
        vec![arg, neg]
    }

    fn with_default(&self, arg: Arg) -> Arg {
        match &self.default {
            Some(Value::Array(items)) if !items.is_empty() => {
                arg.default_values(items.iter().map(display_value).collect::<Vec<_>>())
            }
            Some(Value::Null) | Some(Value::Array(_)) | None => arg,
            Some(v) => arg.default_value(display_value(v)),
        }
    }

    fn value_parser(&self) -> clap::builder::ValueParser {
        match &self.value_type {
            ValueType::Str => value_parser!(String),
            ValueType::Int => value_parser!(i64).into(),
            ValueType::Float => value_parser!(f64).into(),
            ValueType::Bool => BoolishValueParser::new().into(),
            ValueType::Path => value_parser!(PathBuf),
            ValueType::Choice(choices) => PossibleValuesParser::new(choices.clone()).into(),
        }
    }

    /// Extracts this parameter's value from parsed matches.
    ///
    /// Returns `None` when clap holds no value at all (not given, no default).
    pub fn extract(&self, matches: &ArgMatches) -> Option<(Value, ValueSource)> {
        match self.kind {
            ParamKind::Flag => {
                let source = matches.value_source(&self.name)?;
                Some((Value::Bool(matches.get_flag(&self.name)), source))
            }
            ParamKind::Toggle => {
                let neg = self.negative_id();
                if matches.value_source(&self.name) == Some(ValueSource::CommandLine)
                    && matches.get_flag(&self.name)
                {
                    return Some((Value::Bool(true), ValueSource::CommandLine));
                }
                if matches.value_source(&neg) == Some(ValueSource::CommandLine)
                    && matches.get_flag(&neg)
                {
                    return Some((Value::Bool(false), ValueSource::CommandLine));
                }
                let default = self.default.clone().unwrap_or(Value::Bool(false));
                Some((default, ValueSource::DefaultValue))
            }
            ParamKind::Argument | ParamKind::Option => {
                let source = matches.value_source(&self.name)?;
                let value = match &self.value_type {
                    ValueType::Str | ValueType::Choice(_) => {
                        self.collect::<String>(matches, |s| Value::String(s.clone()))
                    }
                    ValueType::Int => self.collect::<i64>(matches, |n| Value::from(*n)),
                    ValueType::Float => self.collect::<f64>(matches, |f| float_value(*f)),
                    ValueType::Bool => self.collect::<bool>(matches, |b| Value::Bool(*b)),
                    ValueType::Path => self.collect::<PathBuf>(matches, |p| {
                        Value::String(p.to_string_lossy().into_owned())
                    }),
                }?;
                Some((value, source))
            }
        }
    }

    fn collect<T>(&self, matches: &ArgMatches, f: impl Fn(&T) -> Value) -> Option<Value>
    where
        T: Clone + Send + Sync + 'static,
    {
        if self.multiple {
            matches
                .get_many::<T>(&self.name)
                .map(|vals| Value::Array(vals.map(&f).collect()))
        } else {
            matches.get_one::<T>(&self.name).map(f)
        }
    }

    /// Coerces an already-typed value (programmatic invocation).
    ///
    /// Strings are parsed the way command-line tokens would be; numbers and
    /// booleans are checked against the declared type.
    pub fn coerce(&self, value: Value) -> Result<Value, UsageError> {
        if value.is_null() {
            return Ok(value);
        }
        if self.multiple {
            let items = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            return items
                .into_iter()
                .map(|v| self.coerce_scalar(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array);
        }
        self.coerce_scalar(value)
    }

    /// Parses a raw answer typed at a prompt.
    pub fn parse_answer(&self, raw: &str) -> Result<Value, UsageError> {
        if self.multiple {
            let items = raw
                .split_whitespace()
                .map(|s| Value::String(s.to_string()))
                .collect();
            return self.coerce(Value::Array(items));
        }
        self.coerce(Value::String(raw.to_string()))
    }

    fn coerce_scalar(&self, value: Value) -> Result<Value, UsageError> {
        let bad = |v: &Value, what: &str| {
            UsageError::bad_parameter(&self.name, format!("{} is not a valid {}", v, what))
        };
        match &self.value_type {
            ValueType::Str | ValueType::Path => match value {
                Value::String(_) => Ok(value),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(bad(&other, "string")),
            },
            ValueType::Int => match &value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 => Ok(Value::from(f as i64)),
                    _ => Err(bad(&value, "integer")),
                },
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| bad(&value, "integer")),
                _ => Err(bad(&value, "integer")),
            },
            ValueType::Float => match &value {
                Value::Number(n) => n.as_f64().map(float_value).ok_or_else(|| bad(&value, "float")),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(float_value)
                    .map_err(|_| bad(&value, "float")),
                _ => Err(bad(&value, "float")),
            },
            ValueType::Bool => match &value {
                Value::Bool(_) => Ok(value),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(Value::Bool(false)),
                    Some(1) => Ok(Value::Bool(true)),
                    _ => Err(bad(&value, "boolean")),
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "y" | "on" | "1" => Ok(Value::Bool(true)),
                    "false" | "no" | "n" | "off" | "0" => Ok(Value::Bool(false)),
                    _ => Err(bad(&value, "boolean")),
                },
                _ => Err(bad(&value, "boolean")),
            },
            ValueType::Choice(choices) => match &value {
                Value::String(s) if choices.iter().any(|c| c == s) => Ok(value),
                _ => Err(UsageError::bad_parameter(
                    &self.name,
                    format!("{} is not one of {}", value, choices.join(", ")),
                )),
            },
        }
    }
}

fn float_value(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Renders a value the way it would be typed on the command line.
pub(crate) fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
