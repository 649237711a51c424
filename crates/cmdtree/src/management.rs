//! The two-phase management command framework.
//!
//! Commands in this framework are invoked in two steps: a parser built by
//! [`BaseCommand::create_parser`] turns raw tokens into a flat [`Namespace`],
//! then [`BaseCommand::execute`] runs the command with it. The same protocol
//! serves three entry points:
//!
//! - [`BaseCommand::run_from_argv`]: a literal command line. Usage errors are
//!   printed with help and become an exit status.
//! - [`call_command`]: programmatic invocation with string tokens plus typed
//!   keyword overrides. Failures come back as [`CommandError`].
//! - [`ManagementUtility`]: the program entry point, `prog <command> ...`,
//!   which looks commands up in a [`CommandRegistry`].
//!
//! Plain commands declare their arguments imperatively through
//! [`BaseCommand::add_arguments`] and are parsed by [`ArgumentParser`]. Command
//! trees plug in their own parser (see [`crate::adapter::TyperParser`]).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use console::Style;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{Error, UsageError};
use crate::output::OutputWrapper;
use crate::param::{normalize_name, Param, ParamKind};
use crate::shared::{shared_params, VERSION};

/// Options `call_command` accepts even though no parser declares them.
static STEALTH_OPTIONS: Lazy<BTreeSet<&'static str>> =
    Lazy::new(|| ["skip_checks", "stderr", "stdout"].into_iter().collect());

/// The user-facing failure of a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
    pub returncode: i32,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            returncode: 1,
        }
    }

    pub fn with_returncode(mut self, returncode: i32) -> Self {
        self.returncode = returncode;
        self
    }
}

impl From<Error> for CommandError {
    fn from(err: Error) -> Self {
        match err {
            Error::Usage(u) => CommandError::new(format!("Error: {}", u.message)),
            Error::Lookup(l) => CommandError::new(format!("Error: {}", l)),
            Error::Exit { code, output } => CommandError::new(output).with_returncode(code),
            Error::Handler(e) => match e.downcast::<CommandError>() {
                Ok(ce) => ce,
                Err(e) => CommandError::new(e.to_string()),
            },
            other => CommandError::new(other.to_string()),
        }
    }
}

/// Result of the parse phase: a flat map of option values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    values: Map<String, Value>,
    args: Vec<String>,
    supplied: Map<String, Value>,
}

impl Namespace {
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// The raw tokens the namespace was parsed from.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Values that bypass token parsing in the execute phase.
    pub fn with_supplied(mut self, supplied: Map<String, Value>) -> Self {
        self.supplied = supplied;
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, anyhow::Error> {
        let value = self.values.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| anyhow::anyhow!("option '{}' has an unexpected type: {}", name, e))
    }

    /// Reads a boolean option, treating anything else as false.
    pub fn get_bool(&self, name: &str) -> bool {
        self.values.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn supplied(&self) -> &Map<String, Value> {
        &self.supplied
    }
}

/// How many values an argument consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nargs {
    /// A flag.
    Zero,
    One,
    /// One or more values.
    Many,
}

/// The parts of an argument the framework introspects.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgShim {
    pub dest: String,
    pub option_strings: Vec<String>,
    pub required: bool,
    pub nargs: Nargs,
    pub default: Option<Value>,
}

impl From<&Param> for ArgShim {
    fn from(p: &Param) -> Self {
        let nargs = match p.kind() {
            ParamKind::Flag | ParamKind::Toggle => Nargs::Zero,
            _ if p.is_multiple() => Nargs::Many,
            _ => Nargs::One,
        };
        Self {
            dest: p.name().to_string(),
            option_strings: p.option_strings(),
            required: p.is_required(),
            nargs,
            default: p.default_value().cloned(),
        }
    }
}

/// The parser half of the two-phase protocol.
pub trait CommandParser {
    fn prog(&self) -> &str;

    /// Every argument the parser knows about.
    fn arguments(&self) -> &[ArgShim];

    /// Declares another argument.
    fn add_argument(&mut self, param: Param) -> Result<(), Error>;

    /// Parses `args`. Values in `supplied` are taken as given and are not
    /// required on the command line.
    fn parse_args(&self, args: &[String], supplied: &Map<String, Value>) -> Result<Namespace, Error>;

    /// Help for the command at `path` (or the closest existing ancestor).
    fn render_help(&self, path: &[String]) -> String;
}

/// A plain parser for commands that declare their arguments imperatively.
#[derive(Debug, Clone)]
pub struct ArgumentParser {
    prog: String,
    about: Option<String>,
    params: Vec<Param>,
    shims: Vec<ArgShim>,
}

impl ArgumentParser {
    pub fn new(prog: impl Into<String>) -> Self {
        Self {
            prog: prog.into(),
            about: None,
            params: Vec::new(),
            shims: Vec::new(),
        }
    }

    pub fn about(mut self, about: Option<String>) -> Self {
        self.about = about;
        self
    }

    fn clap_command(&self, relax: &HashSet<String>) -> clap::Command {
        let mut cmd = clap::Command::new(self.prog.clone())
            .no_binary_name(true)
            .disable_version_flag(true);
        if let Some(about) = &self.about {
            cmd = cmd.about(about.clone());
        }
        for p in &self.params {
            cmd = cmd.args(p.to_args(relax.contains(p.name())));
        }
        cmd
    }
}

impl CommandParser for ArgumentParser {
    fn prog(&self) -> &str {
        &self.prog
    }

    fn arguments(&self) -> &[ArgShim] {
        &self.shims
    }

    fn add_argument(&mut self, param: Param) -> Result<(), Error> {
        self.shims.retain(|s| s.dest != param.name());
        self.params.retain(|p| p.name() != param.name());
        self.shims.push(ArgShim::from(&param));
        self.params.push(param);
        Ok(())
    }

    fn parse_args(&self, args: &[String], supplied: &Map<String, Value>) -> Result<Namespace, Error> {
        use clap::error::ErrorKind;

        let relax: HashSet<String> = supplied.keys().cloned().collect();
        let matches = match self.clap_command(&relax).try_get_matches_from(args) {
            Ok(m) => m,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                return Err(Error::Exit {
                    code: e.exit_code(),
                    output: e.render().to_string(),
                })
            }
            Err(e) => return Err(UsageError::from_clap(&e, &[]).into()),
        };

        let mut values = Map::new();
        for p in &self.params {
            let value = match supplied.get(p.name()) {
                Some(v) => p.coerce(v.clone())?,
                None => match p.extract(&matches) {
                    Some((v, _)) => v,
                    None if p.is_required() => return Err(UsageError::missing(p.name()).into()),
                    None => Value::Null,
                },
            };
            values.insert(p.name().to_string(), value);
        }
        Ok(Namespace::new(values)
            .with_args(args.to_vec())
            .with_supplied(supplied.clone()))
    }

    fn render_help(&self, _path: &[String]) -> String {
        self.clap_command(&HashSet::new()).render_help().to_string()
    }
}

/// A management command.
pub trait BaseCommand {
    /// Name the command is registered under.
    fn name(&self) -> &str;

    fn help(&self) -> Option<String> {
        None
    }

    fn stdout(&self) -> &OutputWrapper;

    fn stderr(&self) -> &OutputWrapper;

    fn use_color(&self) -> bool {
        false
    }

    /// Shared options this command does not take.
    fn suppressed_base_arguments(&self) -> Vec<String> {
        Vec::new()
    }

    /// Declares command-specific arguments on `parser`.
    fn add_arguments(&self, parser: &mut dyn CommandParser) -> Result<(), Error> {
        let _ = parser;
        Ok(())
    }

    fn create_parser(&self, prog_name: &str, subcommand: &str) -> Result<Box<dyn CommandParser>, Error> {
        let mut parser = ArgumentParser::new(format!("{} {}", prog_name, subcommand).trim().to_string())
            .about(self.help());
        let suppressed: Vec<String> = self
            .suppressed_base_arguments()
            .iter()
            .map(|s| normalize_name(s))
            .collect();
        for p in shared_params() {
            if !suppressed.iter().any(|s| s == p.name()) {
                parser.add_argument(p)?;
            }
        }
        self.add_arguments(&mut parser)?;
        Ok(Box::new(parser))
    }

    /// The command's work.
    fn handle(&self, options: &Namespace) -> Result<Value, Error>;

    /// Runs [`handle`](Self::handle) and writes its output.
    fn execute(&self, options: &Namespace) -> Result<Value, Error> {
        let _flush = self.stdout().flush_on_drop();
        let output = self.handle(options)?;
        write_output(self.stdout(), &output);
        Ok(output)
    }

    /// Runs the command from a full command line (`prog name args...`) and
    /// returns the process exit status.
    fn run_from_argv(&self, argv: &[String]) -> i32 {
        let prog = argv.first().map(String::as_str).unwrap_or("manage");
        let subcommand = argv.get(1).map(String::as_str).unwrap_or(self.name());
        let rest = argv.get(2..).unwrap_or(&[]);
        tracing::debug!(command = self.name(), args = ?rest, "running from command line");

        let parser = match self.create_parser(prog, subcommand) {
            Ok(p) => p,
            Err(e) => return report_failure(self, None, &e, false),
        };
        let options = match parser.parse_args(rest, &Map::new()) {
            Ok(o) => o,
            Err(e) => return report_failure(self, Some(&*parser), &e, false),
        };
        match self.execute(&options) {
            Ok(_) => 0,
            Err(e) => report_failure(self, Some(&*parser), &e, options.get_bool("traceback")),
        }
    }
}

/// Writes a handler's return value: strings verbatim, `null` not at all,
/// anything else as compact JSON.
pub fn write_output(out: &OutputWrapper, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) if s.is_empty() => {}
        Value::String(s) => out.write(s),
        other => out.write(&other.to_string()),
    }
}

fn report_failure<C: BaseCommand + ?Sized>(
    command: &C,
    parser: Option<&dyn CommandParser>,
    err: &Error,
    traceback: bool,
) -> i32 {
    let color = command.use_color();
    let red = Style::new().red();
    match err {
        Error::Exit { code, output } => {
            if *code == 0 {
                command.stdout().write_raw(output);
            } else {
                command.stderr().write_raw(output);
            }
            *code
        }
        Error::Usage(usage) => usage_failure(command, parser, usage, color),
        Error::Lookup(l) => {
            let usage = UsageError::no_such_command(&l.segment).at(&l.path);
            usage_failure(command, parser, &usage, color)
        }
        Error::Handler(e) => {
            let returncode = e.downcast_ref::<CommandError>().map_or(1, |c| c.returncode);
            let message = if traceback {
                format!("{:?}", e)
            } else {
                format!("CommandError: {}", e)
            };
            command.stderr().write_styled(&message, &red, color);
            returncode
        }
        other => {
            command
                .stderr()
                .write_styled(&format!("CommandError: {}", other), &red, color);
            1
        }
    }
}

fn usage_failure<C: BaseCommand + ?Sized>(
    command: &C,
    parser: Option<&dyn CommandParser>,
    usage: &UsageError,
    color: bool,
) -> i32 {
    if let Some(parser) = parser {
        command.stderr().write(&parser.render_help(&usage.path));
    }
    command
        .stderr()
        .write_styled(&format!("Error: {}", usage.message), &Style::new().red(), color);
    2
}

/// Calls `command` programmatically.
///
/// `args` are unparsed tokens; `options` are typed values keyed by
/// destination (or by flag name), which bypass string coercion.
pub fn call_command(
    command: &dyn BaseCommand,
    args: &[&str],
    options: Map<String, Value>,
) -> Result<Value, CommandError> {
    let parser = command.create_parser("", command.name())?;

    let mut mapping: HashMap<String, String> = HashMap::new();
    for shim in parser.arguments() {
        mapping.insert(shim.dest.clone(), shim.dest.clone());
        if let Some(flag) = shim.option_strings.iter().filter(|s| s.starts_with("--")).min() {
            mapping.insert(normalize_name(flag), shim.dest.clone());
        }
    }
    let mut arg_options = Map::new();
    for (key, value) in options {
        let dest = mapping
            .get(&key)
            .or_else(|| mapping.get(&normalize_name(&key)))
            .cloned()
            .unwrap_or(key);
        arg_options.insert(dest, value);
    }

    let mut valid: BTreeSet<String> = parser.arguments().iter().map(|s| s.dest.clone()).collect();
    valid.extend(STEALTH_OPTIONS.iter().map(|s| s.to_string()));
    let unknown: Vec<&str> = arg_options
        .keys()
        .filter(|k| !valid.contains(k.as_str()))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(CommandError::new(format!(
            "Unknown option(s) for {} command: {}. Valid options are: {}.",
            command.name(),
            unknown.join(", "),
            valid.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
        )));
    }

    let tokens: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    tracing::debug!(command = command.name(), args = ?tokens, "call_command");
    let parsed = parser.parse_args(&tokens, &arg_options)?;

    let mut values = parsed.values().clone();
    values.extend(arg_options.clone());
    values.entry("skip_checks").or_insert(Value::Bool(true));
    let mut supplied = parsed.supplied().clone();
    supplied.extend(arg_options);

    let options = Namespace::new(values).with_args(tokens).with_supplied(supplied);
    Ok(command.execute(&options)?)
}

/// Creates a fresh command instance.
pub type CommandFactory = Box<dyn Fn() -> Box<dyn BaseCommand>>;

/// Maps command names to the app that provides them.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, (String, CommandFactory)>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.commands.iter().map(|(name, (app, _))| (name, app)))
            .finish()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a command.
    pub fn register<F>(&mut self, name: impl Into<String>, app: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn BaseCommand> + 'static,
    {
        self.commands.insert(name.into(), (app.into(), Box::new(factory)));
        self
    }

    /// Instantiates the command registered as `name`.
    pub fn load(&self, name: &str) -> Option<Box<dyn BaseCommand>> {
        self.commands.get(name).map(|(_, factory)| factory())
    }

    pub fn app_for(&self, name: &str) -> Option<&str> {
        self.commands.get(name).map(|(app, _)| app.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// [`call_command`] by name.
    pub fn call(&self, name: &str, args: &[&str], options: Map<String, Value>) -> Result<Value, CommandError> {
        let command = self
            .load(name)
            .ok_or_else(|| CommandError::new(format!("Unknown command: '{}'", name)))?;
        call_command(command.as_ref(), args, options)
    }
}

/// The program entry point: `prog <command> [args...]`.
pub struct ManagementUtility {
    registry: CommandRegistry,
    stdout: OutputWrapper,
    stderr: OutputWrapper,
}

impl ManagementUtility {
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            registry,
            stdout: OutputWrapper::stdout(),
            stderr: OutputWrapper::stderr(),
        }
    }

    pub fn with_output(mut self, stdout: OutputWrapper, stderr: OutputWrapper) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Runs the command line and returns the exit status.
    pub fn execute<I, S>(&self, argv: I) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        if argv.is_empty() {
            argv.push("manage".to_string());
        }
        let prog = std::path::Path::new(&argv[0])
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| argv[0].clone());
        argv[0] = prog.clone();

        let Some(subcommand) = argv.get(1).cloned() else {
            self.stdout.write(&self.main_help(&prog));
            return 0;
        };
        match subcommand.as_str() {
            "help" | "--help" | "-h" => match argv.get(2) {
                None => {
                    self.stdout.write(&self.main_help(&prog));
                    0
                }
                Some(name) => match self.registry.load(name) {
                    Some(command) => match command.create_parser(&prog, name) {
                        Ok(parser) => {
                            let path = argv.get(3..).unwrap_or(&[]).to_vec();
                            self.stdout.write(&parser.render_help(&path));
                            0
                        }
                        Err(e) => {
                            self.stderr.write(&format!("CommandError: {}", e));
                            1
                        }
                    },
                    None => self.unknown(&prog, name),
                },
            },
            "version" | "--version" => {
                self.stdout.write(VERSION);
                0
            }
            name => match self.registry.load(name) {
                Some(command) => command.run_from_argv(&argv),
                None => self.unknown(&prog, name),
            },
        }
    }

    fn unknown(&self, prog: &str, name: &str) -> i32 {
        self.stderr.write(&format!(
            "Unknown command: '{}'\nType '{} help' for usage.",
            name, prog
        ));
        1
    }

    fn main_help(&self, prog: &str) -> String {
        let mut by_app: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for name in self.registry.names() {
            let app = self.registry.app_for(name).unwrap_or_default();
            by_app.entry(app).or_default().push(name);
        }
        let mut lines = vec![
            String::new(),
            format!("Type '{} help <subcommand>' for help on a specific subcommand.", prog),
            String::new(),
            "Available subcommands:".to_string(),
        ];
        for (app, names) in by_app {
            lines.push(String::new());
            lines.push(format!("[{}]", app));
            for name in names {
                lines.push(format!("    {}", name));
            }
        }
        lines.join("\n")
    }
}
