//! Bridges a command tree into the two-phase management protocol.
//!
//! [`TyperParser`] is the parser a [`TyperCommand`] hands out from
//! `create_parser`. Its parse phase runs the whole tree through clap, resolves
//! every parameter at every level (supplied, command line, environment,
//! prompt, default) and flattens the result into a [`Namespace`]. The execute
//! phase ([`execute`]) re-resolves from the namespace's raw tokens plus its
//! supplied values and runs the callbacks from the root down.
//!
//! Values answered at a prompt during parsing travel in the namespace's
//! supplied map, so executing never asks twice.

use std::collections::HashSet;
use std::iter;
use std::rc::Rc;

use clap::error::ErrorKind;
use serde_json::{Map, Value};

use crate::binder::bind;
use crate::command::TyperCommand;
use crate::context::{Context, ParamSource};
use crate::current::CurrentCommand;
use crate::dispatch::{matches_chain, split_chain, ChainShape};
use crate::error::{Error, LookupError, UsageError};
use crate::handler::Callback;
use crate::management::{ArgShim, CommandParser, Namespace};
use crate::node::{CommandNode, NodeTarget};
use crate::param::{Param, ParamKind};
use crate::shared::{shared_defaults, VERSION};

/// One resolved level of an invocation.
#[derive(Debug, Clone)]
struct Level {
    node: CommandNode,
    ctx: Rc<Context>,
}

/// The levels of one root-to-leaf invocation.
#[derive(Debug, Clone)]
struct Invocation {
    levels: Vec<Level>,
}

impl Invocation {
    fn root(&self) -> &Level {
        &self.levels[0]
    }
}

/// A fully resolved command line.
#[derive(Debug)]
struct Plan {
    invocations: Vec<Invocation>,
    chained: bool,
}

/// The parser of a command tree.
#[derive(Debug)]
pub struct TyperParser {
    prog: String,
    command: TyperCommand,
    shims: Vec<ArgShim>,
}

impl TyperParser {
    pub fn new(command: &TyperCommand, prog: impl Into<String>) -> Result<Self, Error> {
        if command.class().is_empty() {
            return Err(Error::NotImplemented(command.name().to_string()));
        }
        let mut shims = Vec::new();
        collect_shims(&CommandNode::root(command), &mut shims);
        Ok(Self {
            prog: prog.into(),
            command: command.clone(),
            shims,
        })
    }

    pub fn command(&self) -> &TyperCommand {
        &self.command
    }
}

fn collect_shims(node: &CommandNode, shims: &mut Vec<ArgShim>) {
    for p in node.params() {
        if !shims.iter().any(|s| s.dest == p.name()) {
            shims.push(ArgShim::from(&p));
        }
    }
    for child in node.children() {
        collect_shims(&child, shims);
    }
}

impl CommandParser for TyperParser {
    fn prog(&self) -> &str {
        &self.prog
    }

    /// Every parameter anywhere in the tree, first declaration wins.
    fn arguments(&self) -> &[ArgShim] {
        &self.shims
    }

    fn add_argument(&mut self, _param: Param) -> Result<(), Error> {
        Err(Error::NotSupported("add_argument on a command tree parser".into()))
    }

    fn parse_args(&self, args: &[String], supplied: &Map<String, Value>) -> Result<Namespace, Error> {
        let command = &self.command;
        let _guard = CurrentCommand::enter(command);
        let plan = resolve(command, args, supplied)?;

        let mut values = shared_defaults(command.class());
        let mut carried = supplied.clone();
        for invocation in &plan.invocations {
            for level in &invocation.levels {
                for (name, value) in level.ctx.params() {
                    if level.ctx.source(&name) == Some(ParamSource::Prompt) {
                        carried.insert(name.clone(), value.clone());
                    }
                    values.insert(name, value);
                }
            }
        }
        tracing::debug!(command = command.name(), args = ?args, "parsed");
        Ok(Namespace::new(values)
            .with_args(args.to_vec())
            .with_supplied(carried))
    }

    fn render_help(&self, path: &[String]) -> String {
        CommandNode::root(&self.command)
            .deepest(path)
            .render_help(self.command.use_color())
    }
}

/// Runs `command` from a parsed namespace.
pub fn execute(command: &TyperCommand, options: &Namespace) -> Result<Value, Error> {
    let _guard = CurrentCommand::enter(command);
    let plan = resolve(command, options.args(), options.supplied())?;
    run(command, &plan)
}

fn resolve(command: &TyperCommand, args: &[String], supplied: &Map<String, Value>) -> Result<Plan, Error> {
    if command.class().is_empty() {
        return Err(Error::NotImplemented(command.name().to_string()));
    }
    let root = CommandNode::root(command);
    if !root.is_chain() {
        return Ok(Plan {
            invocations: vec![parse_once(command, &root, args, supplied)?],
            chained: false,
        });
    }

    let shape = ChainTree {
        root: &root,
        supplied,
    };
    let (prefix, segments) = split_chain(args, &shape);
    if segments.is_empty() {
        return Ok(Plan {
            invocations: vec![parse_once(command, &root, &prefix, supplied)?],
            chained: true,
        });
    }

    // Root values from the first segment carry over so later segments
    // neither re-prompt nor re-require them.
    let mut carried = supplied.clone();
    let mut invocations = Vec::with_capacity(segments.len());
    for segment in segments {
        let tokens: Vec<String> = prefix.iter().chain(segment.iter()).cloned().collect();
        let invocation = parse_once(command, &root, &tokens, &carried)?;
        for (name, value) in invocation.root().ctx.params() {
            carried.entry(name).or_insert(value);
        }
        invocations.push(invocation);
    }
    Ok(Plan {
        invocations,
        chained: true,
    })
}

/// The root of a chained class as seen by [`split_chain`].
struct ChainTree<'a> {
    root: &'a CommandNode,
    supplied: &'a Map<String, Value>,
}

impl ChainTree<'_> {
    fn node(&self, head: Option<&str>) -> CommandNode {
        head.and_then(|h| self.root.child(h))
            .unwrap_or_else(|| self.root.clone())
    }
}

impl ChainShape for ChainTree<'_> {
    fn is_child(&self, token: &str) -> bool {
        self.root.child(token).is_some()
    }

    fn takes_value(&self, head: Option<&str>, token: &str) -> bool {
        self.node(head).params().iter().any(|p| p.consumes_next(token))
    }

    /// Required positionals not already supplied.
    fn positionals(&self, head: Option<&str>) -> usize {
        self.node(head)
            .params()
            .iter()
            .filter(|p| {
                p.kind() == ParamKind::Argument && p.is_required() && !self.supplied.contains_key(p.name())
            })
            .count()
    }
}

fn parse_once(
    command: &TyperCommand,
    root: &CommandNode,
    tokens: &[String],
    supplied: &Map<String, Value>,
) -> Result<Invocation, Error> {
    let relax: HashSet<String> = supplied.keys().cloned().collect();
    let argv = iter::once(root.name().to_string()).chain(tokens.iter().cloned());
    let matches = root
        .clap_command(&relax)
        .try_get_matches_from(argv)
        .map_err(|e| translate_clap(command, root, tokens, e))?;

    let mut levels: Vec<Level> = Vec::new();
    let mut node = root.clone();
    let mut ctx = Context::root(root.name(), command.clone(), supplied.clone());
    for (depth, (name, sub_matches)) in matches_chain(&matches).into_iter().enumerate() {
        if depth > 0 {
            node = node
                .child(&name)
                .ok_or_else(|| LookupError::new(name.clone(), &node.path()))?;
            ctx = Context::child(&ctx, name);
        }
        resolve_level(command, &node, &ctx, sub_matches)?;
        if depth == 0 && ctx.get("version") == Some(Value::Bool(true)) {
            return Err(Error::Exit {
                code: 0,
                output: format!("{}\n", VERSION),
            });
        }
        levels.push(Level {
            node: node.clone(),
            ctx: ctx.clone(),
        });
    }
    Ok(Invocation { levels })
}

/// Resolves every parameter declared at one level.
///
/// Precedence: supplied, command line or environment, prompt, default.
fn resolve_level(
    command: &TyperCommand,
    node: &CommandNode,
    ctx: &Rc<Context>,
    matches: &clap::ArgMatches,
) -> Result<(), Error> {
    for p in node.params() {
        let name = p.name();
        if let Some(value) = ctx.supplied_value(name) {
            let value = p.coerce(value).map_err(|e| e.at(ctx.path()))?;
            ctx.set(name, value, ParamSource::Supplied);
            continue;
        }

        let found = p.extract(matches);
        if let Some((value, source)) = &found {
            let source = ParamSource::from(*source);
            if matches!(source, ParamSource::CommandLine | ParamSource::Environment) {
                ctx.set(name, value.clone(), source);
                continue;
            }
        }
        if p.prompt_text().is_some() {
            if let Some(answer) = command.prompt(&p).map_err(|e| e.at(ctx.path()))? {
                ctx.set(name, answer, ParamSource::Prompt);
                continue;
            }
        }
        match found {
            Some((value, source)) => ctx.set(name, value, source.into()),
            None if p.is_required() => return Err(UsageError::missing(name).at(ctx.path()).into()),
            None => ctx.set(name, Value::Null, ParamSource::Default),
        }
    }
    Ok(())
}

fn translate_clap(command: &TyperCommand, root: &CommandNode, tokens: &[String], err: clap::Error) -> Error {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            let rendered = err.render();
            let output = if command.use_color() {
                rendered.ansi().to_string()
            } else {
                rendered.to_string()
            };
            Error::Exit {
                code: err.exit_code(),
                output,
            }
        }
        _ => UsageError::from_clap(&err, &guess_path(root, tokens)).into(),
    }
}

/// The command path the tokens reached, for choosing which help to show.
fn guess_path(root: &CommandNode, tokens: &[String]) -> Vec<String> {
    let mut node = root.clone();
    for token in tokens.iter().filter(|t| !t.starts_with('-')) {
        if !node.is_group() {
            break;
        }
        if let Some(child) = node.child(token) {
            node = child;
        }
    }
    node.path()
}

fn run(command: &TyperCommand, plan: &Plan) -> Result<Value, Error> {
    let Some(first) = plan.invocations.first() else {
        return Ok(Value::Null);
    };
    if !plan.chained {
        return run_levels(command, &first.levels);
    }

    let root = first.root();
    let init = invoke(command, &root.node.function(), &root.ctx, Vec::new())?;
    if plan.invocations.iter().all(|inv| inv.levels.len() == 1) {
        return match root.node.primary_handler() {
            Some(primary) => invoke(command, primary.callback(), &root.ctx, Vec::new()),
            None => Ok(init),
        };
    }

    let mut results = Vec::with_capacity(plan.invocations.len());
    for invocation in &plan.invocations {
        results.push(run_levels(command, &invocation.levels[1..])?);
    }
    match root.node.finalizer() {
        Some(finalizer) => invoke(command, &finalizer, &root.ctx, results),
        None => Ok(Value::Array(results)),
    }
}

/// Runs a level and everything below it.
fn run_levels(command: &TyperCommand, levels: &[Level]) -> Result<Value, Error> {
    let Some((level, rest)) = levels.split_first() else {
        return Ok(Value::Null);
    };
    let node = &level.node;
    if node.is_deprecated() {
        command.stderr().write(&format!(
            "DeprecationWarning: The command '{}' is deprecated.",
            node.name()
        ));
    }

    match node.target() {
        NodeTarget::Command(_) => invoke(command, &node.function(), &level.ctx, Vec::new()),
        NodeTarget::Group(_) => {
            let init = invoke(command, &node.function(), &level.ctx, Vec::new())?;
            if rest.is_empty() {
                return match node.primary_handler() {
                    Some(primary) => invoke(command, primary.callback(), &level.ctx, Vec::new()),
                    None => Ok(init),
                };
            }
            let result = run_levels(command, rest)?;
            match node.finalizer() {
                Some(finalizer) => invoke(command, &finalizer, &level.ctx, vec![result]),
                None => Ok(result),
            }
        }
    }
}

fn invoke(command: &TyperCommand, callback: &Callback, ctx: &Rc<Context>, results: Vec<Value>) -> Result<Value, Error> {
    tracing::debug!(callback = callback.name(), path = ?ctx.path(), "invoking");
    let args = callback.collect_args(ctx, results);
    bind(callback, command).invoke(&args).map_err(Error::Handler)
}
