//! Hierarchical command trees for two-phase management commands.
//!
//! `cmdtree` lets a management command be declared as a tree of groups and
//! subcommands, with typed parameters on every level, while still running
//! through the two-phase (`create_parser` then `execute`) protocol of the
//! surrounding framework. The same command can be run three ways with
//! identical semantics:
//!
//! - from a command line (`manage hierarchy math --precision 4 divide 3 7`)
//! - through [`call_command`] with string tokens and typed options
//! - by fetching a bound function with [`TyperCommand::get_command`] and
//!   calling it directly
//!
//! # Features
//!
//! - **Class assembly**: [`CommandClass`] merges the registrations of a class
//!   and its bases in C3 method resolution order. Subclasses override by
//!   attribute name and never mutate their bases.
//! - **Lazy resolution**: the tree is read fresh for every parse, lookup and
//!   help request, so extension modules can add commands at any time.
//! - **Shared options**: the framework-wide options (`--verbosity`,
//!   `--settings`, ...) appear once, on the root, under their own help panel.
//! - **Programmatic values**: values passed to `call_command` bypass token
//!   parsing and are never required on the command line.
//! - **Prompting**: parameters can prompt for missing values, once.
//!
//! # Example
//!
//! ```rust,ignore
//! use cmdtree::{call_command, Callback, CommandClass, Param, TyperCommand};
//!
//! let class = CommandClass::define("hierarchy")
//!     .group(
//!         Callback::method("math", |cmd, args| {
//!             cmd.set_state(Precision(args.get("precision")?));
//!             Ok::<_, anyhow::Error>(())
//!         })
//!         .param(Param::option("precision").int().default(2)),
//!     )
//!     .command_in("math", Callback::method("divide", divide).params([
//!         Param::argument("numerator").float(),
//!         Param::argument("denominator").float(),
//!     ]))
//!     .build()?;
//!
//! let cmd = TyperCommand::new(class);
//! call_command(&cmd, &["math", "divide", "3", "7"], Default::default())?;
//! ```

mod adapter;
mod binder;
mod class;
mod command;
mod context;
mod current;
mod dispatch;
mod error;
mod group;
mod handler;
mod management;
mod node;
mod output;
mod param;
mod prompt;
mod shared;

pub use adapter::{execute, TyperParser};

pub use binder::{bind, BoundCallback, CallArgs};

pub use class::{ClassBuilder, ClassConfig, CommandClass, Member};

pub use command::{CommandOptions, TyperCommand};

pub use context::{Context, ParamSource};

pub use current::{current_command, depth as current_depth, CurrentCommand};

pub use dispatch::{matches_chain, split_chain, ChainShape};

pub use error::{DefinitionError, Error, LookupError, Result, UsageError, UsageKind};

pub use group::{CommandConfig, CommandInfo, Group, GroupConfig};

pub use handler::{Args, Callback, HandlerResult, IntoHandlerResult, Receiver};

pub use management::{
    call_command, write_output, ArgShim, ArgumentParser, BaseCommand, CommandError,
    CommandFactory, CommandParser, CommandRegistry, ManagementUtility, Namespace, Nargs,
};

pub use node::{CommandNode, NodeTarget};

pub use output::{FlushGuard, OutputDestination, OutputWrapper};

pub use param::{cli_name, normalize_name, Completer, CompletionItem, Param, ParamKind, ValueType};

pub use prompt::{ask, RealTerminal, ScriptedTerminal, TerminalIO};

pub use shared::{
    injected_params, shared_defaults, shared_params, SETTINGS_ENV, SHARED_PANEL, VERSION,
};
