//! Invocation contexts.
//!
//! One [`Context`] exists per level of an invocation (root, each group, the
//! leaf command). Contexts link to their parent and hold the resolved values
//! for the parameters declared at that level, together with where each value
//! came from.
//!
//! Only the root context records which values were supplied programmatically.
//! Every descendant answers [`Context::was_supplied`] by asking the root, so a
//! value handed to `call_command` is honored at whatever depth it is declared.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use clap::parser::ValueSource;
use serde_json::{Map, Value};

use crate::command::TyperCommand;

/// Where a resolved parameter value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    CommandLine,
    Environment,
    Default,
    /// Passed programmatically, bypassing token parsing.
    Supplied,
    /// Answered at an interactive prompt.
    Prompt,
}

impl From<ValueSource> for ParamSource {
    fn from(source: ValueSource) -> Self {
        match source {
            ValueSource::CommandLine => ParamSource::CommandLine,
            ValueSource::EnvVariable => ParamSource::Environment,
            _ => ParamSource::Default,
        }
    }
}

/// Parse-time state for one level of the command tree.
pub struct Context {
    name: String,
    path: Vec<String>,
    owner: TyperCommand,
    parent: Option<Rc<Context>>,
    supplied: Map<String, Value>,
    params: RefCell<Map<String, Value>>,
    sources: RefCell<HashMap<String, ParamSource>>,
    invoked_subcommand: RefCell<Option<String>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("params", &self.params.borrow())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Creates a root context holding the programmatically supplied values.
    pub fn root(name: impl Into<String>, owner: TyperCommand, supplied: Map<String, Value>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            path: Vec::new(),
            owner,
            parent: None,
            supplied,
            params: RefCell::new(Map::new()),
            sources: RefCell::new(HashMap::new()),
            invoked_subcommand: RefCell::new(None),
        })
    }

    /// Creates a child context one level below `parent`.
    pub fn child(parent: &Rc<Context>, name: impl Into<String>) -> Rc<Self> {
        let name = name.into();
        let mut path = parent.path.clone();
        path.push(name.clone());
        parent.invoked_subcommand.replace(Some(name.clone()));
        Rc::new(Self {
            name,
            path,
            owner: parent.owner.clone(),
            parent: Some(parent.clone()),
            supplied: Map::new(),
            params: RefCell::new(Map::new()),
            sources: RefCell::new(HashMap::new()),
            invoked_subcommand: RefCell::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of CLI names below the root (empty for the root itself).
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The command instance this invocation executes against.
    pub fn owner(&self) -> &TyperCommand {
        &self.owner
    }

    pub fn parent(&self) -> Option<&Rc<Context>> {
        self.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Walks up to the root context.
    pub fn root_context(&self) -> &Context {
        let mut ctx = self;
        while let Some(parent) = ctx.parent.as_deref() {
            ctx = parent;
        }
        ctx
    }

    /// True if `name` was supplied programmatically for this invocation.
    pub fn was_supplied(&self, name: &str) -> bool {
        self.root_context().supplied.contains_key(name)
    }

    /// The programmatically supplied value for `name`, if any.
    pub fn supplied_value(&self, name: &str) -> Option<Value> {
        self.root_context().supplied.get(name).cloned()
    }

    /// All programmatically supplied values.
    pub fn supplied(&self) -> Map<String, Value> {
        self.root_context().supplied.clone()
    }

    pub fn set(&self, name: &str, value: Value, source: ParamSource) {
        self.params.borrow_mut().insert(name.to_string(), value);
        self.sources.borrow_mut().insert(name.to_string(), source);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.params.borrow().get(name).cloned()
    }

    pub fn source(&self, name: &str) -> Option<ParamSource> {
        self.sources.borrow().get(name).copied()
    }

    /// Snapshot of every value resolved at this level.
    pub fn params(&self) -> Map<String, Value> {
        self.params.borrow().clone()
    }

    /// The subcommand invoked below this level, if any.
    pub fn invoked_subcommand(&self) -> Option<String> {
        self.invoked_subcommand.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::CommandClass;
    use crate::handler::Callback;
    use serde_json::json;

    fn owner() -> TyperCommand {
        let class = CommandClass::define("ctx")
            .command(Callback::function("noop", |_args| Ok::<_, anyhow::Error>(())))
            .build()
            .unwrap();
        TyperCommand::new(class)
    }

    #[test]
    fn test_supplied_lookup_delegates_to_root() {
        let mut supplied = Map::new();
        supplied.insert("precision".into(), json!(4));
        let root = Context::root("hierarchy", owner(), supplied);
        let math = Context::child(&root, "math");
        let divide = Context::child(&math, "divide");

        assert!(divide.was_supplied("precision"));
        assert_eq!(divide.supplied_value("precision"), Some(json!(4)));
        assert!(!divide.was_supplied("floor"));
        assert_eq!(divide.path(), ["math", "divide"]);
        assert_eq!(root.invoked_subcommand().as_deref(), Some("math"));
    }

    #[test]
    fn test_values_stay_at_their_level() {
        let root = Context::root("r", owner(), Map::new());
        root.set("verbosity", json!(2), ParamSource::CommandLine);
        let child = Context::child(&root, "c");
        child.set("flag1", json!(true), ParamSource::Default);

        assert_eq!(root.get("verbosity"), Some(json!(2)));
        assert_eq!(child.get("verbosity"), None);
        assert_eq!(child.source("flag1"), Some(ParamSource::Default));
        assert_eq!(root.source("verbosity"), Some(ParamSource::CommandLine));
    }
}
