//! Command instances.
//!
//! A [`TyperCommand`] is one instance of a [`CommandClass`]. It is the
//! receiver every method-style callback is bound to, carries per-instance
//! state keyed by type (initializers write, subcommands read),
//! and owns the output streams and the terminal used for prompting.
//!
//! `TyperCommand` implements [`BaseCommand`], so a command tree runs through
//! the same two-phase protocol as any plain management command.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::adapter::{self, TyperParser};
use crate::binder::{bind, BoundCallback, CallArgs};
use crate::class::CommandClass;
use crate::context::Context;
use crate::current::CurrentCommand;
use crate::error::{Error, UsageError};
use crate::handler::StateMap;
use crate::management::{BaseCommand, CommandParser, Namespace};
use crate::node::CommandNode;
use crate::output::OutputWrapper;
use crate::param::{CompletionItem, Param, ValueType};
use crate::prompt::{self, RealTerminal, TerminalIO};

/// Construction options for a [`TyperCommand`].
#[derive(Default, Clone)]
pub struct CommandOptions {
    stdout: Option<OutputWrapper>,
    stderr: Option<OutputWrapper>,
    no_color: bool,
    force_color: bool,
    terminal: Option<Rc<dyn TerminalIO>>,
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(mut self, out: OutputWrapper) -> Self {
        self.stdout = Some(out);
        self
    }

    pub fn stderr(mut self, err: OutputWrapper) -> Self {
        self.stderr = Some(err);
        self
    }

    pub fn no_color(mut self, yes: bool) -> Self {
        self.no_color = yes;
        self
    }

    pub fn force_color(mut self, yes: bool) -> Self {
        self.force_color = yes;
        self
    }

    /// Terminal used to prompt for missing values.
    pub fn terminal(mut self, terminal: Rc<dyn TerminalIO>) -> Self {
        self.terminal = Some(terminal);
        self
    }
}

struct CommandInner {
    class: CommandClass,
    state: RefCell<StateMap>,
    stdout: OutputWrapper,
    stderr: OutputWrapper,
    no_color: Cell<bool>,
    force_color: Cell<bool>,
    terminal: Rc<dyn TerminalIO>,
}

/// An instance of a command class.
///
/// Cheap to clone; clones are the same instance.
#[derive(Clone)]
pub struct TyperCommand {
    inner: Rc<CommandInner>,
}

impl fmt::Debug for TyperCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TyperCommand")
            .field("class", &self.inner.class.name())
            .field("state", &self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl TyperCommand {
    pub fn new(class: CommandClass) -> Self {
        Self::with_options(class, CommandOptions::default())
    }

    pub fn with_options(class: CommandClass, options: CommandOptions) -> Self {
        Self {
            inner: Rc::new(CommandInner {
                class,
                state: RefCell::new(StateMap::default()),
                stdout: options.stdout.unwrap_or_else(OutputWrapper::stdout),
                stderr: options.stderr.unwrap_or_else(OutputWrapper::stderr),
                no_color: Cell::new(options.no_color),
                force_color: Cell::new(options.force_color),
                terminal: options.terminal.unwrap_or_else(|| Rc::new(RealTerminal)),
            }),
        }
    }

    /// True if both handles are the same instance.
    pub fn ptr_eq(&self, other: &TyperCommand) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The class name, which is also the name the command is registered under.
    pub fn name(&self) -> &str {
        self.inner.class.name()
    }

    pub fn class(&self) -> &CommandClass {
        &self.inner.class
    }

    /// Name the program root shows on the command line.
    pub fn prog_name(&self) -> String {
        self.inner.class.root().cli_name()
    }

    /// Reads a piece of per-instance state.
    pub fn state<T: Clone + 'static>(&self) -> Option<T> {
        self.inner.state.borrow().get::<T>().cloned()
    }

    /// Stores a piece of per-instance state, returning the previous value.
    pub fn set_state<T: 'static>(&self, value: T) -> Option<T> {
        self.inner.state.borrow_mut().insert(value)
    }

    pub fn stdout(&self) -> &OutputWrapper {
        &self.inner.stdout
    }

    pub fn stderr(&self) -> &OutputWrapper {
        &self.inner.stderr
    }

    /// Whether help and errors are colorized.
    pub fn use_color(&self) -> bool {
        if self.inner.force_color.get() {
            return true;
        }
        if self.inner.no_color.get() {
            return false;
        }
        self.inner.stdout.is_terminal() && console::colors_enabled()
    }

    /// Applies `--no-color` / `--force-color` from a parsed namespace.
    pub(crate) fn apply_color_options(&self, options: &Namespace) {
        if options.get_bool("no_color") {
            self.inner.no_color.set(true);
        }
        if options.get_bool("force_color") {
            self.inner.force_color.set(true);
        }
    }

    /// Prompts for `param` on this command's terminal.
    pub fn prompt(&self, param: &Param) -> Result<Option<Value>, UsageError> {
        prompt::ask(self.inner.terminal.as_ref(), param)
    }

    fn ensure_implemented(&self) -> Result<(), Error> {
        if self.inner.class.is_empty() {
            return Err(Error::NotImplemented(self.name().to_string()));
        }
        Ok(())
    }

    /// The root of this instance's command tree.
    pub fn root_node(&self) -> CommandNode {
        CommandNode::root(self)
    }

    /// Resolves a command path to a node.
    pub fn node<S: AsRef<str>>(&self, path: &[S]) -> Result<CommandNode, Error> {
        self.ensure_implemented()?;
        Ok(self.root_node().get_command(path)?)
    }

    /// Resolves a command path to its function, bound to this instance.
    ///
    /// An empty path returns the root function. Each call builds a fresh
    /// view of the tree and never registers anything.
    pub fn get_command<S: AsRef<str>>(&self, path: &[S]) -> Result<BoundCallback, Error> {
        Ok(self.node(path)?.callback())
    }

    /// Calls the command directly with typed values.
    ///
    /// Runs the primary handler, or the single command of a simple class, or
    /// the root initializer of a compound class.
    pub fn call(&self, args: CallArgs) -> Result<Value, Error> {
        self.ensure_implemented()?;
        let class = &self.inner.class;
        match class.primary_handler().cloned().or_else(|| class.single_command()) {
            Some(info) => bind(info.callback(), self).call(args),
            None => self.root_node().callback().call(args),
        }
    }

    /// Prints help for the command at `path` to stdout.
    pub fn print_help<S: AsRef<str>>(&self, path: &[S]) -> Result<(), Error> {
        self.node(path)?.print_help()
    }

    /// Completions for `param` of the command at `path`.
    ///
    /// Uses the parameter's completer when it has one and falls back to the
    /// declared choices otherwise.
    pub fn complete<S: AsRef<str>>(
        &self,
        path: &[S],
        param: &str,
        incomplete: &str,
    ) -> Result<Vec<CompletionItem>, Error> {
        let node = self.node(path)?;
        let param = node
            .params()
            .into_iter()
            .find(|p| p.name() == param)
            .ok_or_else(|| UsageError::no_such_option(param).at(&node.path()))?;

        let _guard = CurrentCommand::enter(self);
        let mut ctx = Context::root(self.prog_name(), self.clone(), Map::new());
        for segment in node.path() {
            ctx = Context::child(&ctx, segment);
        }
        if let Some(completer) = param.completer_fn() {
            return Ok(completer(&*ctx, &param, incomplete));
        }
        Ok(match param.value_type() {
            ValueType::Choice(choices) => choices
                .iter()
                .filter(|c| c.starts_with(incomplete))
                .map(CompletionItem::new)
                .collect(),
            _ => Vec::new(),
        })
    }

}

impl BaseCommand for TyperCommand {
    fn name(&self) -> &str {
        TyperCommand::name(self)
    }

    fn help(&self) -> Option<String> {
        self.inner.class.resolved_help()
    }

    fn stdout(&self) -> &OutputWrapper {
        &self.inner.stdout
    }

    fn stderr(&self) -> &OutputWrapper {
        &self.inner.stderr
    }

    fn use_color(&self) -> bool {
        TyperCommand::use_color(self)
    }

    fn suppressed_base_arguments(&self) -> Vec<String> {
        self.inner.class.config().suppressed_base_arguments().to_vec()
    }

    /// Command trees declare parameters on their callbacks.
    fn add_arguments(&self, _parser: &mut dyn CommandParser) -> Result<(), Error> {
        Err(Error::NotSupported("add_arguments on a command tree".into()))
    }

    fn create_parser(&self, prog_name: &str, subcommand: &str) -> Result<Box<dyn CommandParser>, Error> {
        let prog = format!("{} {}", prog_name, subcommand).trim().to_string();
        Ok(Box::new(TyperParser::new(self, prog)?))
    }

    fn handle(&self, options: &Namespace) -> Result<Value, Error> {
        self.apply_color_options(options);
        adapter::execute(self, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::current::current_command;
    use crate::handler::Callback;
    use crate::prompt::ScriptedTerminal;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    struct Precision(i64);

    fn math() -> CommandClass {
        CommandClass::define("calc")
            .group(
                Callback::method("math", |cmd, args| {
                    cmd.set_state(Precision(args.get("precision")?));
                    Ok::<_, anyhow::Error>(())
                })
                .param(Param::option("precision").int().default(2)),
            )
            .command_in(
                "math",
                Callback::method("shape", |cmd, args| {
                    let Precision(p) = cmd.state::<Precision>().unwrap_or(Precision(0));
                    let kind: String = args.get("kind")?;
                    Ok::<_, anyhow::Error>(format!("{}@{}", kind, p))
                })
                .param(Param::argument("kind").choices(["square", "circle", "star"])),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_state_round_trip() {
        let cmd = TyperCommand::new(math());
        assert_eq!(cmd.state::<Precision>(), None);
        cmd.set_state(Precision(3));
        assert_eq!(cmd.state::<Precision>(), Some(Precision(3)));
    }

    #[test]
    fn test_get_command_binds_to_instance() {
        let cmd = TyperCommand::new(math());
        cmd.set_state(Precision(5));
        let shape = cmd.get_command(&["math", "shape"]).unwrap();
        let out = shape.call(CallArgs::new().arg("star")).unwrap();
        assert_eq!(out, json!("star@5"));
    }

    #[test]
    fn test_get_command_root_runs_initializer() {
        let cmd = TyperCommand::new(math());
        let math = cmd.get_command(&["math"]).unwrap();
        math.call(CallArgs::new().kw("precision", 7)).unwrap();
        assert_eq!(cmd.state::<Precision>(), Some(Precision(7)));
    }

    #[test]
    fn test_complete_choices() {
        let cmd = TyperCommand::new(math());
        let items = cmd.complete(&["math", "shape"], "kind", "s").unwrap();
        let values: Vec<&str> = items.iter().map(|i| i.value.as_str()).collect();
        assert_eq!(values, vec!["square", "star"]);
    }

    #[test]
    fn test_completer_sees_current_command() {
        let class = CommandClass::define("comp")
            .command(
                Callback::function("pick", |_a| Ok::<_, anyhow::Error>(())).param(
                    Param::argument("thing").completer(|ctx, _p, incomplete| {
                        let owner = current_command().map(|c| c.name().to_string());
                        vec![CompletionItem::new(format!("{}{}", incomplete, ctx.owner().name()))
                            .help(owner.unwrap_or_default())]
                    }),
                ),
            )
            .build()
            .unwrap();
        let cmd = TyperCommand::new(class);
        let items = cmd.complete::<&str>(&[], "thing", "x").unwrap();
        assert_eq!(items[0].value, "xcomp");
        assert_eq!(items[0].help.as_deref(), Some("comp"));
    }

    #[test]
    fn test_empty_class_is_not_implemented() {
        let cmd = TyperCommand::new(CommandClass::define("noimpl").build().unwrap());
        assert!(matches!(cmd.get_command::<&str>(&[]), Err(Error::NotImplemented(_))));
        assert!(matches!(cmd.call(CallArgs::new()), Err(Error::NotImplemented(_))));
    }

    #[test]
    fn test_add_arguments_is_disabled() {
        let cmd = TyperCommand::new(math());
        let mut parser = crate::management::ArgumentParser::new("x");
        let err = BaseCommand::add_arguments(&cmd, &mut parser).unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[test]
    fn test_prompt_uses_configured_terminal() {
        let terminal = Rc::new(ScriptedTerminal::new(["4"]));
        let cmd = TyperCommand::with_options(
            math(),
            CommandOptions::new().terminal(terminal.clone()),
        );
        let p = Param::option("n").int().prompt("N");
        assert_eq!(cmd.prompt(&p).unwrap(), Some(json!(4)));
        assert_eq!(terminal.remaining(), 0);
    }

    #[test]
    fn test_color_flags() {
        let cmd = TyperCommand::with_options(
            math(),
            CommandOptions::new().stdout(OutputWrapper::buffer()).force_color(true),
        );
        assert!(cmd.use_color());
        let plain = TyperCommand::with_options(math(), CommandOptions::new().stdout(OutputWrapper::buffer()));
        assert!(!plain.use_color());
    }
}
