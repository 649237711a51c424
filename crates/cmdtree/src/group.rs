//! Command groups: one level of the command hierarchy.
//!
//! A [`Group`] is a shared handle to a mutable builder holding the commands,
//! child groups, initializer and finalizer registered at one level. Groups are
//! created in two ways:
//!
//! - by class assembly, for the dispatch root and for every group declared on
//!   the class (see [`crate::class`]);
//! - directly with [`Group::new`], for the decoupled style where an app object
//!   is built at module level and attached to a class with
//!   [`ClassBuilder::app`](crate::class::ClassBuilder::app).
//!
//! Registration at the same level is last-wins by CLI name, so a subclass or
//! an extension can replace a command without first removing it.
//!
//! ```rust,ignore
//! let reports = Group::new("reports");
//! reports.command(Callback::function("daily", daily));
//! reports.command_with(Callback::function("weekly", weekly), |c| c.help("Weekly digest"));
//! let archive = reports.group(Callback::function("archive", archive_init));
//! archive.command(Callback::function("purge", purge));
//! ```

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::class::{ClassInner, CommandClass};
use crate::handler::Callback;
use crate::param::cli_name;

/// Configuration for a group (or for the class-level dispatch root).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupConfig {
    pub(crate) name: Option<String>,
    pub(crate) help: Option<String>,
    pub(crate) short_help: Option<String>,
    pub(crate) epilog: Option<String>,
    pub(crate) hidden: bool,
    pub(crate) deprecated: bool,
    pub(crate) chain: bool,
    pub(crate) invoke_without_command: bool,
    pub(crate) no_args_is_help: bool,
    pub(crate) panel: Option<String>,
    pub(crate) allow_interspersed_args: bool,
}

impl GroupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// CLI-facing name; defaults to the attribute name with dashes.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn short_help(mut self, help: impl Into<String>) -> Self {
        self.short_help = Some(help.into());
        self
    }

    pub fn epilog(mut self, epilog: impl Into<String>) -> Self {
        self.epilog = Some(epilog.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// Accept several subcommands in one invocation.
    pub fn chain(mut self, chain: bool) -> Self {
        self.chain = chain;
        self
    }

    /// Run the initializer even when no subcommand is given.
    pub fn invoke_without_command(mut self, yes: bool) -> Self {
        self.invoke_without_command = yes;
        self
    }

    pub fn no_args_is_help(mut self, yes: bool) -> Self {
        self.no_args_is_help = yes;
        self
    }

    /// Help panel this group is listed under in its parent's help.
    pub fn panel(mut self, panel: impl Into<String>) -> Self {
        self.panel = Some(panel.into());
        self
    }

    /// Allow this group's options to appear after its subcommand.
    pub fn allow_interspersed_args(mut self, yes: bool) -> Self {
        self.allow_interspersed_args = yes;
        self
    }

    pub fn is_chain(&self) -> bool {
        self.chain
    }
}

/// Configuration for a single command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandConfig {
    pub(crate) name: Option<String>,
    pub(crate) help: Option<String>,
    pub(crate) short_help: Option<String>,
    pub(crate) epilog: Option<String>,
    pub(crate) hidden: bool,
    pub(crate) deprecated: bool,
    pub(crate) no_args_is_help: bool,
    pub(crate) panel: Option<String>,
}

impl CommandConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn short_help(mut self, help: impl Into<String>) -> Self {
        self.short_help = Some(help.into());
        self
    }

    pub fn epilog(mut self, epilog: impl Into<String>) -> Self {
        self.epilog = Some(epilog.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    pub fn no_args_is_help(mut self, yes: bool) -> Self {
        self.no_args_is_help = yes;
        self
    }

    pub fn panel(mut self, panel: impl Into<String>) -> Self {
        self.panel = Some(panel.into());
        self
    }
}

/// A registered leaf command.
#[derive(Debug, Clone)]
pub struct CommandInfo {
    callback: Callback,
    config: CommandConfig,
}

impl CommandInfo {
    pub fn new(callback: Callback, config: CommandConfig) -> Self {
        Self { callback, config }
    }

    /// The function (attribute) name.
    pub fn attr_name(&self) -> &str {
        self.callback.name()
    }

    /// The name used on the command line.
    pub fn cli_name(&self) -> String {
        self.config
            .name
            .clone()
            .unwrap_or_else(|| cli_name(self.callback.name()))
    }

    /// True if `name` is either the function name or the CLI name.
    pub fn answers_to(&self, name: &str) -> bool {
        self.attr_name() == name || self.cli_name() == name
    }

    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    /// Explicit help wins over the function's documentation.
    pub fn help(&self) -> Option<String> {
        self.config
            .help
            .clone()
            .or_else(|| self.callback.doc_text().map(String::from))
    }
}

pub(crate) struct GroupInner {
    attr: Option<String>,
    config: GroupConfig,
    callback: Option<Callback>,
    finalizer: Option<Callback>,
    commands: Vec<CommandInfo>,
    groups: Vec<Group>,
    parent: Weak<RefCell<GroupInner>>,
    owner_class: Option<Weak<ClassInner>>,
    standalone: bool,
}

/// Shared handle to one level of the command hierarchy.
///
/// Cloning the handle aliases the same group; use [`Group::deep_clone`] for an
/// independent copy.
#[derive(Clone)]
pub struct Group {
    inner: Rc<RefCell<GroupInner>>,
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Group")
            .field("attr", &inner.attr)
            .field("commands", &inner.commands.iter().map(|c| c.cli_name()).collect::<Vec<_>>())
            .field("groups", &inner.groups)
            .finish_non_exhaustive()
    }
}

impl Group {
    fn from_inner(inner: GroupInner) -> Self {
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// Creates a free-standing app group that can later be attached to a
    /// command class or to another group.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, GroupConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: GroupConfig) -> Self {
        Self::from_inner(GroupInner {
            attr: Some(name.into()),
            config,
            callback: None,
            finalizer: None,
            commands: Vec::new(),
            groups: Vec::new(),
            parent: Weak::new(),
            owner_class: None,
            standalone: true,
        })
    }

    /// Creates the dispatch root for a class.
    pub(crate) fn root(config: GroupConfig, owner: Weak<ClassInner>) -> Self {
        Self::from_inner(GroupInner {
            attr: None,
            config,
            callback: None,
            finalizer: None,
            commands: Vec::new(),
            groups: Vec::new(),
            parent: Weak::new(),
            owner_class: Some(owner),
            standalone: false,
        })
    }

    /// Group created by a group registration: the callback is the initializer.
    fn for_callback(callback: Callback, config: GroupConfig) -> Self {
        let group = Self::from_inner(GroupInner {
            attr: Some(callback.name().to_string()),
            config,
            callback: None,
            finalizer: None,
            commands: Vec::new(),
            groups: Vec::new(),
            parent: Weak::new(),
            owner_class: None,
            standalone: false,
        });
        group.inner.borrow_mut().callback = Some(callback);
        group
    }

    /// True if both handles point at the same group.
    pub fn ptr_eq(&self, other: &Group) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The attribute name (`None` for a dispatch root).
    pub fn attr_name(&self) -> Option<String> {
        self.inner.borrow().attr.clone()
    }

    /// The name used on the command line.
    pub fn cli_name(&self) -> String {
        let inner = self.inner.borrow();
        inner
            .config
            .name
            .clone()
            .or_else(|| inner.attr.as_deref().map(cli_name))
            .unwrap_or_default()
    }

    /// True if `name` is either the attribute name or the CLI name.
    pub fn answers_to(&self, name: &str) -> bool {
        self.attr_name().as_deref() == Some(name) || self.cli_name() == name
    }

    pub fn config(&self) -> GroupConfig {
        self.inner.borrow().config.clone()
    }

    /// Help text: explicit help first, then the initializer's documentation.
    pub fn help(&self) -> Option<String> {
        let inner = self.inner.borrow();
        inner.config.help.clone().or_else(|| {
            inner
                .callback
                .as_ref()
                .and_then(|c| c.doc_text().map(String::from))
        })
    }

    /// True for groups built with [`Group::new`] (decoupled app objects).
    pub fn is_standalone(&self) -> bool {
        self.inner.borrow().standalone
    }

    pub fn parent(&self) -> Option<Group> {
        self.inner
            .borrow()
            .parent
            .upgrade()
            .map(|inner| Group { inner })
    }

    /// The class this group belongs to, found by walking up the parents.
    pub fn owner_class(&self) -> Option<CommandClass> {
        let mut current = Some(self.clone());
        while let Some(group) = current {
            let owner = group.inner.borrow().owner_class.clone();
            if let Some(weak) = owner {
                return weak.upgrade().map(CommandClass::from_inner);
            }
            current = group.parent();
        }
        None
    }

    /// Registers a command; replaces any command with the same CLI name.
    pub fn command(&self, callback: Callback) -> &Self {
        self.add_command(CommandInfo::new(callback, CommandConfig::default()))
    }

    /// Registers a command with inline configuration.
    pub fn command_with<C>(&self, callback: Callback, configure: C) -> &Self
    where
        C: FnOnce(CommandConfig) -> CommandConfig,
    {
        self.add_command(CommandInfo::new(callback, configure(CommandConfig::default())))
    }

    pub fn add_command(&self, info: CommandInfo) -> &Self {
        let cli = info.cli_name();
        self.log_registration("command", &cli);
        let mut inner = self.inner.borrow_mut();
        match inner.commands.iter().position(|c| c.cli_name() == cli) {
            Some(idx) => inner.commands[idx] = info,
            None => inner.commands.push(info),
        }
        self
    }

    /// Registers a subgroup whose initializer is `callback` and returns it.
    pub fn group(&self, callback: Callback) -> Group {
        self.group_with(callback, |g| g)
    }

    pub fn group_with<C>(&self, callback: Callback, configure: C) -> Group
    where
        C: FnOnce(GroupConfig) -> GroupConfig,
    {
        let child = Group::for_callback(callback, configure(GroupConfig::default()));
        self.add_group(child.clone());
        child
    }

    /// Attaches an existing group as a child; replaces any child group with
    /// the same CLI name.
    pub fn add_group(&self, group: Group) -> &Self {
        group.inner.borrow_mut().parent = Rc::downgrade(&self.inner);
        let cli = group.cli_name();
        self.log_registration("group", &cli);
        let mut inner = self.inner.borrow_mut();
        match inner.groups.iter().position(|g| g.cli_name() == cli) {
            Some(idx) => inner.groups[idx] = group,
            None => inner.groups.push(group),
        }
        self
    }

    /// Sets the initializer run before any subcommand of this group.
    pub fn callback(&self, callback: Callback) -> &Self {
        self.inner.borrow_mut().callback = Some(callback);
        self
    }

    /// Alias of [`callback`](Self::callback).
    pub fn initialize(&self, callback: Callback) -> &Self {
        self.callback(callback)
    }

    /// Sets the finalizer that receives this group's subcommand results.
    pub fn finalize(&self, callback: Callback) -> &Self {
        self.inner.borrow_mut().finalizer = Some(callback);
        self
    }

    pub fn initializer(&self) -> Option<Callback> {
        self.inner.borrow().callback.clone()
    }

    pub fn finalizer(&self) -> Option<Callback> {
        self.inner.borrow().finalizer.clone()
    }

    pub fn commands(&self) -> Vec<CommandInfo> {
        self.inner.borrow().commands.clone()
    }

    pub fn groups(&self) -> Vec<Group> {
        self.inner.borrow().groups.clone()
    }

    pub fn find_command(&self, name: &str) -> Option<CommandInfo> {
        self.inner
            .borrow()
            .commands
            .iter()
            .find(|c| c.answers_to(name))
            .cloned()
    }

    /// Finds a direct child group by attribute or CLI name.
    pub fn child_group(&self, name: &str) -> Option<Group> {
        self.inner
            .borrow()
            .groups
            .iter()
            .find(|g| g.answers_to(name))
            .cloned()
    }

    /// Breadth-first search for a group anywhere below this one.
    ///
    /// When two siblings share a CLI name only the first is descended into,
    /// so a shadowed branch is never resolved.
    pub fn find_group(&self, name: &str) -> Option<Group> {
        let mut queue: VecDeque<Group> = VecDeque::new();
        queue.push_back(self.clone());
        while let Some(group) = queue.pop_front() {
            let mut seen = HashSet::new();
            for child in group.groups() {
                if !seen.insert(child.cli_name()) {
                    continue;
                }
                if child.answers_to(name) {
                    return Some(child);
                }
                queue.push_back(child);
            }
        }
        None
    }

    /// Independent copy: commands are copied shallowly (callbacks are
    /// shared), child groups are copied deeply so that later registrations on
    /// the copy never reach the original.
    pub fn deep_clone(&self) -> Group {
        let inner = self.inner.borrow();
        let copy = Group::from_inner(GroupInner {
            attr: inner.attr.clone(),
            config: inner.config.clone(),
            callback: inner.callback.clone(),
            finalizer: inner.finalizer.clone(),
            commands: inner.commands.clone(),
            groups: Vec::new(),
            parent: Weak::new(),
            owner_class: None,
            standalone: inner.standalone,
        });
        for child in &inner.groups {
            copy.add_group(child.deep_clone());
        }
        copy
    }

    /// Total number of registrations at this level.
    pub fn len(&self) -> usize {
        let inner = self.inner.borrow();
        inner.commands.len() + inner.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn log_registration(&self, kind: &str, name: &str) {
        let owner = self.owner_class().map(|c| c.name().to_string());
        tracing::debug!(
            kind,
            name,
            group = %self.cli_name(),
            owner = owner.as_deref().unwrap_or("<unattached>"),
            "registered"
        );
    }
}
