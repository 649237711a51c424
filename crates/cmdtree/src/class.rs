//! Command classes and their one-time assembly.
//!
//! A [`CommandClass`] is declared with [`CommandClass::define`], which returns
//! a [`ClassBuilder`]. Every registration on the builder (initializer,
//! commands, groups, finalizers, attached apps, the primary handler) is
//! recorded as a pending member keyed by its attribute name. Nothing touches
//! a tree until [`ClassBuilder::build`] runs the assembly:
//!
//! 1. linearize the bases (C3) and collect their members oldest first;
//! 2. overlay the members declared on the class itself;
//! 3. create the dispatch root from the class configuration;
//! 4. graft deep copies of attached apps;
//! 5. record every group under its attribute name in a side table;
//! 6. run the pending registrations against the new tree, retrying members
//!    whose parent group is declared later;
//! 7. resolve the primary handler.
//!
//! A member redefined further down the hierarchy replaces the inherited one
//! but keeps its original position, so help listings stay in first-declared
//! order. Because each class replays its members into a fresh tree, nothing a
//! subclass registers ever reaches its bases.
//!
//! ```rust,ignore
//! let base = CommandClass::define("upstream")
//!     .group(Callback::function("grp1", |_a| Ok::<_, anyhow::Error>(())))
//!     .command_in("grp1", Callback::function("sub", sub))
//!     .build()?;
//!
//! let derived = CommandClass::define("downstream")
//!     .base(&base)
//!     .command_in("grp1", Callback::function("extra", extra))
//!     .build()?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{DefinitionError, LookupError};
use crate::group::{CommandConfig, CommandInfo, Group, GroupConfig};
use crate::handler::Callback;
use crate::param::normalize_name;

/// Class-level configuration, applied to the dispatch root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassConfig {
    pub(crate) name: Option<String>,
    pub(crate) help: Option<String>,
    pub(crate) short_help: Option<String>,
    pub(crate) epilog: Option<String>,
    pub(crate) chain: bool,
    pub(crate) invoke_without_command: bool,
    pub(crate) no_args_is_help: bool,
    pub(crate) deprecated: bool,
    pub(crate) hidden: bool,
    pub(crate) allow_interspersed_args: bool,
    pub(crate) suppressed_base_arguments: Vec<String>,
}

impl ClassConfig {
    fn group_config(&self, class_name: &str) -> GroupConfig {
        GroupConfig {
            name: Some(self.name.clone().unwrap_or_else(|| class_name.to_string())),
            help: self.help.clone(),
            short_help: self.short_help.clone(),
            epilog: self.epilog.clone(),
            hidden: self.hidden,
            deprecated: self.deprecated,
            chain: self.chain,
            invoke_without_command: self.invoke_without_command,
            no_args_is_help: self.no_args_is_help,
            panel: None,
            allow_interspersed_args: self.allow_interspersed_args,
        }
    }

    /// Shared option names removed from this class, normalized.
    pub fn suppressed_base_arguments(&self) -> &[String] {
        &self.suppressed_base_arguments
    }
}

/// Settings given explicitly on one class. Unset fields are looked up along
/// the resolution order, one field at a time.
#[derive(Debug, Clone, Default)]
struct ClassSettings {
    name: Option<String>,
    help: Option<String>,
    short_help: Option<String>,
    epilog: Option<String>,
    chain: Option<bool>,
    invoke_without_command: Option<bool>,
    no_args_is_help: Option<bool>,
    deprecated: Option<bool>,
    hidden: Option<bool>,
    allow_interspersed_args: Option<bool>,
    suppressed_base_arguments: Option<Vec<String>>,
}

impl ClassSettings {
    /// Resolves against `mro`, nearest ancestor first. The CLI name is never
    /// inherited.
    fn resolve(&self, mro: &[CommandClass]) -> ClassConfig {
        let layers: Vec<&ClassSettings> = std::iter::once(self)
            .chain(mro.iter().map(|c| &c.inner.settings))
            .collect();
        let text = |f: fn(&ClassSettings) -> &Option<String>| layers.iter().find_map(|l| f(l).clone());
        let flag = |f: fn(&ClassSettings) -> Option<bool>| layers.iter().find_map(|l| f(l)).unwrap_or(false);
        ClassConfig {
            name: self.name.clone(),
            help: text(|l| &l.help),
            short_help: text(|l| &l.short_help),
            epilog: text(|l| &l.epilog),
            chain: flag(|l| l.chain),
            invoke_without_command: flag(|l| l.invoke_without_command),
            no_args_is_help: flag(|l| l.no_args_is_help),
            deprecated: flag(|l| l.deprecated),
            hidden: flag(|l| l.hidden),
            allow_interspersed_args: flag(|l| l.allow_interspersed_args),
            suppressed_base_arguments: layers
                .iter()
                .find_map(|l| l.suppressed_base_arguments.clone())
                .unwrap_or_default(),
        }
    }
}

/// A pending registration recorded on a class.
#[derive(Debug, Clone)]
pub enum Member {
    /// Initializer of the dispatch root.
    Initializer(Callback),
    Command {
        parent: Option<String>,
        info: CommandInfo,
    },
    /// A group whose initializer is `callback`.
    Group {
        parent: Option<String>,
        callback: Callback,
        config: GroupConfig,
    },
    Finalizer {
        parent: Option<String>,
        callback: Callback,
    },
    /// A free-standing app attached to the root under an attribute name.
    App(Group),
    /// The primary handler.
    Handle(CommandInfo),
}

impl Member {
    fn parent(&self) -> Option<&str> {
        match self {
            Member::Command { parent, .. }
            | Member::Group { parent, .. }
            | Member::Finalizer { parent, .. } => parent.as_deref(),
            Member::Initializer(_) | Member::App(_) | Member::Handle(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Member::Initializer(_) => "initializer",
            Member::Command { .. } => "command",
            Member::Group { .. } => "group",
            Member::Finalizer { .. } => "finalizer",
            Member::App(_) => "app",
            Member::Handle(_) => "handle",
        }
    }
}

pub(crate) struct ClassInner {
    name: String,
    bases: Vec<CommandClass>,
    mro: Vec<CommandClass>,
    members: Vec<(String, Member)>,
    settings: ClassSettings,
    config: ClassConfig,
    root: Group,
    side_table: HashMap<String, Group>,
    primary: Option<CommandInfo>,
    explicit_initializer: bool,
}

/// An assembled command class.
///
/// Cheap to clone; clones share the same assembled tree.
#[derive(Clone)]
pub struct CommandClass {
    inner: Rc<ClassInner>,
}

impl fmt::Debug for CommandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandClass")
            .field("name", &self.inner.name)
            .field("root", &self.inner.root)
            .finish_non_exhaustive()
    }
}

impl CommandClass {
    /// Starts declaring a class.
    pub fn define(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            bases: Vec::new(),
            members: Vec::new(),
            settings: ClassSettings::default(),
        }
    }

    pub(crate) fn from_inner(inner: Rc<ClassInner>) -> Self {
        Self { inner }
    }

    pub fn ptr_eq(&self, other: &CommandClass) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The class name, which is also the default CLI name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn bases(&self) -> &[CommandClass] {
        &self.inner.bases
    }

    /// Linearized ancestors, nearest first, excluding the class itself.
    pub fn mro(&self) -> &[CommandClass] {
        &self.inner.mro
    }

    /// Names along the resolution order, starting with this class.
    pub fn mro_names(&self) -> Vec<String> {
        std::iter::once(self.name().to_string())
            .chain(self.inner.mro.iter().map(|c| c.name().to_string()))
            .collect()
    }

    pub fn is_subclass_of(&self, other: &CommandClass) -> bool {
        self.ptr_eq(other) || self.inner.mro.iter().any(|c| c.ptr_eq(other))
    }

    pub fn config(&self) -> &ClassConfig {
        &self.inner.config
    }

    /// The dispatch root.
    pub fn root(&self) -> Group {
        self.inner.root.clone()
    }

    /// Live handle to a group in the assembled tree.
    ///
    /// The attribute side table is consulted first, then a breadth-first
    /// search by name. Registrations made through the handle are visible to
    /// every later invocation of this class.
    pub fn group(&self, name: &str) -> Result<Group, LookupError> {
        self.inner
            .side_table
            .get(name)
            .cloned()
            .or_else(|| self.inner.root.find_group(name))
            .ok_or_else(|| LookupError::new(name, &[name.to_string()]))
    }

    /// The primary handler, if one was declared.
    pub fn primary_handler(&self) -> Option<&CommandInfo> {
        self.inner.primary.as_ref()
    }

    /// True if an initializer was explicitly registered on the root.
    pub fn has_explicit_initializer(&self) -> bool {
        self.inner.explicit_initializer
    }

    /// More than one command, any subgroup, or an explicit initializer.
    ///
    /// Recomputed on every call so that late registrations count.
    pub fn is_compound(&self) -> bool {
        let root = &self.inner.root;
        let commands = root.commands().len() + usize::from(self.inner.primary.is_some());
        commands > 1 || !root.groups().is_empty() || self.inner.explicit_initializer
    }

    /// Nothing was ever registered on the class.
    pub fn is_empty(&self) -> bool {
        self.inner.root.is_empty() && self.inner.primary.is_none() && !self.inner.explicit_initializer
    }

    /// The root initializer: the explicit one, or a no-op synthesized for
    /// compound classes so that shared options have a level to live on.
    pub fn root_initializer(&self) -> Option<Callback> {
        match self.inner.root.initializer() {
            Some(cb) => Some(cb),
            None if self.is_compound() => Some(Callback::noop("init")),
            None => None,
        }
    }

    /// For simple classes, the one command that forms the whole CLI.
    pub fn single_command(&self) -> Option<CommandInfo> {
        if self.is_compound() {
            return None;
        }
        self.inner
            .primary
            .clone()
            .or_else(|| self.inner.root.commands().into_iter().next())
    }

    /// Help text: class help, then the root initializer's documentation,
    /// then the primary handler's.
    pub fn resolved_help(&self) -> Option<String> {
        if let Some(help) = &self.inner.config.help {
            return Some(help.clone());
        }
        if let Some(doc) = self
            .inner
            .root
            .initializer()
            .and_then(|cb| cb.doc_text().map(String::from))
        {
            return Some(doc);
        }
        if let Some(primary) = &self.inner.primary {
            return primary.help();
        }
        self.single_command().and_then(|c| c.help())
    }

    /// True if the shared option `name` was suppressed on this class.
    pub fn suppresses(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.inner
            .config
            .suppressed_base_arguments
            .iter()
            .any(|s| *s == name)
    }
}

/// Declares a command class. See the module documentation.
#[must_use = "a class is only assembled by calling build()"]
pub struct ClassBuilder {
    name: String,
    bases: Vec<CommandClass>,
    members: Vec<(String, Member)>,
    settings: ClassSettings,
}

impl ClassBuilder {
    /// Adds a base class. Earlier bases take precedence over later ones.
    pub fn base(mut self, base: &CommandClass) -> Self {
        self.bases.push(base.clone());
        self
    }

    fn member(mut self, attr: impl Into<String>, member: Member) -> Self {
        let attr = attr.into();
        match self.members.iter().position(|(k, _)| *k == attr) {
            Some(idx) => self.members[idx].1 = member,
            None => self.members.push((attr, member)),
        }
        self
    }

    /// Registers the root initializer.
    pub fn initialize(self, callback: Callback) -> Self {
        self.member(callback.name().to_string(), Member::Initializer(callback))
    }

    /// Alias of [`initialize`](Self::initialize).
    pub fn callback(self, callback: Callback) -> Self {
        self.initialize(callback)
    }

    pub fn command(self, callback: Callback) -> Self {
        self.command_with(callback, |c| c)
    }

    pub fn command_with<C>(self, callback: Callback, configure: C) -> Self
    where
        C: FnOnce(CommandConfig) -> CommandConfig,
    {
        self.add_command(None, callback, configure(CommandConfig::default()))
    }

    /// Registers a command on the group with attribute (or CLI) name `parent`.
    pub fn command_in(self, parent: impl Into<String>, callback: Callback) -> Self {
        self.command_in_with(parent, callback, |c| c)
    }

    pub fn command_in_with<C>(self, parent: impl Into<String>, callback: Callback, configure: C) -> Self
    where
        C: FnOnce(CommandConfig) -> CommandConfig,
    {
        self.add_command(Some(parent.into()), callback, configure(CommandConfig::default()))
    }

    fn add_command(self, parent: Option<String>, callback: Callback, config: CommandConfig) -> Self {
        let attr = callback.name().to_string();
        let info = CommandInfo::new(callback, config);
        self.member(attr, Member::Command { parent, info })
    }

    /// Registers a root-level group whose initializer is `callback`.
    pub fn group(self, callback: Callback) -> Self {
        self.group_with(callback, |g| g)
    }

    pub fn group_with<C>(self, callback: Callback, configure: C) -> Self
    where
        C: FnOnce(GroupConfig) -> GroupConfig,
    {
        self.add_group(None, callback, configure(GroupConfig::default()))
    }

    /// Registers a group nested under `parent`.
    pub fn group_in(self, parent: impl Into<String>, callback: Callback) -> Self {
        self.group_in_with(parent, callback, |g| g)
    }

    pub fn group_in_with<C>(self, parent: impl Into<String>, callback: Callback, configure: C) -> Self
    where
        C: FnOnce(GroupConfig) -> GroupConfig,
    {
        self.add_group(Some(parent.into()), callback, configure(GroupConfig::default()))
    }

    fn add_group(self, parent: Option<String>, callback: Callback, config: GroupConfig) -> Self {
        let attr = callback.name().to_string();
        self.member(
            attr,
            Member::Group {
                parent,
                callback,
                config,
            },
        )
    }

    /// Registers the root finalizer.
    pub fn finalize(self, callback: Callback) -> Self {
        let attr = callback.name().to_string();
        self.member(attr, Member::Finalizer { parent: None, callback })
    }

    /// Registers a finalizer on the group named `parent`.
    pub fn finalize_in(self, parent: impl Into<String>, callback: Callback) -> Self {
        let attr = callback.name().to_string();
        self.member(
            attr,
            Member::Finalizer {
                parent: Some(parent.into()),
                callback,
            },
        )
    }

    /// Declares the primary handler.
    pub fn handle(self, callback: Callback) -> Self {
        self.handle_with(callback, |c| c)
    }

    pub fn handle_with<C>(self, callback: Callback, configure: C) -> Self
    where
        C: FnOnce(CommandConfig) -> CommandConfig,
    {
        let info = CommandInfo::new(callback, configure(CommandConfig::default()));
        self.member("handle", Member::Handle(info))
    }

    /// Attaches a free-standing app under `attr`. The app is copied at
    /// assembly, so the original stays untouched.
    pub fn app(self, attr: impl Into<String>, group: Group) -> Self {
        self.member(attr, Member::App(group))
    }

    fn configure(mut self, f: impl FnOnce(&mut ClassSettings)) -> Self {
        f(&mut self.settings);
        self
    }

    /// CLI name of the class (defaults to the class name).
    pub fn name(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.configure(|c| c.name = Some(name))
    }

    pub fn help(self, help: impl Into<String>) -> Self {
        let help = help.into();
        self.configure(|c| c.help = Some(help))
    }

    pub fn short_help(self, help: impl Into<String>) -> Self {
        let help = help.into();
        self.configure(|c| c.short_help = Some(help))
    }

    pub fn epilog(self, epilog: impl Into<String>) -> Self {
        let epilog = epilog.into();
        self.configure(|c| c.epilog = Some(epilog))
    }

    pub fn chain(self, chain: bool) -> Self {
        self.configure(|c| c.chain = Some(chain))
    }

    pub fn invoke_without_command(self, yes: bool) -> Self {
        self.configure(|c| c.invoke_without_command = Some(yes))
    }

    pub fn no_args_is_help(self, yes: bool) -> Self {
        self.configure(|c| c.no_args_is_help = Some(yes))
    }

    pub fn deprecated(self, yes: bool) -> Self {
        self.configure(|c| c.deprecated = Some(yes))
    }

    pub fn hidden(self, yes: bool) -> Self {
        self.configure(|c| c.hidden = Some(yes))
    }

    pub fn allow_interspersed_args(self, yes: bool) -> Self {
        self.configure(|c| c.allow_interspersed_args = Some(yes))
    }

    /// Removes shared options from this class, by name (`--no-color` and
    /// `no_color` are equivalent).
    pub fn suppressed_base_arguments<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names.into_iter().map(|s| normalize_name(s.as_ref())).collect();
        self.configure(|c| c.suppressed_base_arguments = Some(names))
    }

    /// Runs the assembly and returns the finished class.
    pub fn build(self) -> Result<CommandClass, DefinitionError> {
        let ClassBuilder {
            name,
            bases,
            members,
            settings,
        } = self;

        let mro = linearize(&name, &bases)?;
        let config = settings.resolve(&mro);

        let mut collected: Vec<(String, Member)> = Vec::new();
        for ancestor in mro.iter().rev() {
            for (attr, member) in &ancestor.inner.members {
                merge_member(&mut collected, &name, attr, member.clone());
            }
        }
        for (attr, member) in &members {
            merge_member(&mut collected, &name, attr, member.clone());
        }
        tracing::debug!(
            class = %name,
            mro = ?mro.iter().map(|c| c.name()).collect::<Vec<_>>(),
            members = ?collected.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            "assembling command class"
        );

        let mut failure = None;
        let inner = Rc::new_cyclic(|weak: &Weak<ClassInner>| {
            let root = Group::root(config.group_config(&name), weak.clone());
            let mut assembly = Assembly {
                class: &name,
                root: root.clone(),
                side_table: HashMap::new(),
                primary: None,
                explicit_initializer: false,
            };
            if let Err(e) = assembly.register_all(collected) {
                failure = Some(e);
            }
            ClassInner {
                name: name.clone(),
                bases,
                mro,
                members,
                settings,
                config,
                root,
                side_table: assembly.side_table,
                primary: assembly.primary,
                explicit_initializer: assembly.explicit_initializer,
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        Ok(CommandClass { inner })
    }
}

fn merge_member(collected: &mut Vec<(String, Member)>, class: &str, attr: &str, member: Member) {
    match collected.iter().position(|(k, _)| k == attr) {
        Some(idx) => {
            tracing::trace!(class, attr, kind = member.kind(), "member overridden");
            collected[idx].1 = member;
        }
        None => collected.push((attr.to_string(), member)),
    }
}

struct Assembly<'a> {
    class: &'a str,
    root: Group,
    side_table: HashMap<String, Group>,
    primary: Option<CommandInfo>,
    explicit_initializer: bool,
}

impl Assembly<'_> {
    fn register_all(&mut self, members: Vec<(String, Member)>) -> Result<(), DefinitionError> {
        let mut pending = members;
        loop {
            let mut deferred = Vec::new();
            let before = pending.len();
            for (attr, member) in pending {
                let parent = match member.parent() {
                    None => Some(self.root.clone()),
                    Some(p) => self.resolve(p),
                };
                match parent {
                    Some(parent) => self.register(&parent, &attr, member),
                    None => deferred.push((attr, member)),
                }
            }
            if deferred.is_empty() {
                return Ok(());
            }
            if deferred.len() == before {
                let (attr, member) = deferred.swap_remove(0);
                return Err(DefinitionError::UnknownParent {
                    class: self.class.to_string(),
                    parent: member.parent().unwrap_or_default().to_string(),
                    member: attr,
                });
            }
            pending = deferred;
        }
    }

    fn resolve(&self, name: &str) -> Option<Group> {
        self.side_table
            .get(name)
            .cloned()
            .or_else(|| self.root.find_group(name))
    }

    fn register(&mut self, parent: &Group, attr: &str, member: Member) {
        match member {
            Member::Initializer(cb) => {
                self.root.callback(cb);
                self.explicit_initializer = true;
            }
            Member::Command { info, .. } => {
                parent.add_command(info);
            }
            Member::Group {
                callback, config, ..
            } => {
                let group = parent.group_with(callback, |_| config);
                self.side_table.insert(attr.to_string(), group);
            }
            Member::Finalizer { callback, .. } => {
                parent.finalize(callback);
            }
            Member::App(group) => {
                let copy = group.deep_clone();
                parent.add_group(copy.clone());
                tracing::debug!(class = self.class, attr, "grafted app");
                self.side_table.insert(attr.to_string(), copy);
            }
            Member::Handle(info) => {
                self.primary = Some(info);
            }
        }
    }
}

/// C3 linearization of `bases`, excluding the class being defined.
fn linearize(class: &str, bases: &[CommandClass]) -> Result<Vec<CommandClass>, DefinitionError> {
    for (i, base) in bases.iter().enumerate() {
        if bases[..i].iter().any(|b| b.ptr_eq(base)) {
            return Err(DefinitionError::DuplicateBase {
                class: class.to_string(),
                base: base.name().to_string(),
            });
        }
    }

    let mut seqs: Vec<Vec<CommandClass>> = bases
        .iter()
        .map(|b| std::iter::once(b.clone()).chain(b.mro().iter().cloned()).collect())
        .collect();
    seqs.push(bases.to_vec());

    let mut result = Vec::new();
    loop {
        seqs.retain(|s| !s.is_empty());
        if seqs.is_empty() {
            return Ok(result);
        }
        let candidate = seqs
            .iter()
            .map(|s| &s[0])
            .find(|head| !seqs.iter().any(|s| s[1..].iter().any(|c| c.ptr_eq(head))))
            .cloned()
            .ok_or_else(|| DefinitionError::InconsistentHierarchy(class.to_string()))?;
        for seq in seqs.iter_mut() {
            if seq[0].ptr_eq(&candidate) {
                seq.remove(0);
            }
        }
        result.push(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cb(name: &str) -> Callback {
        Callback::function(name, |_a| Ok::<_, anyhow::Error>(()))
    }

    fn tagged(name: &str, tag: &str) -> Callback {
        let value = tag.to_string();
        Callback::function(name, move |_a| Ok::<_, anyhow::Error>(value.clone())).doc(tag)
    }

    fn command_tag(class: &CommandClass, name: &str) -> Option<String> {
        class
            .root()
            .find_command(name)
            .and_then(|c| c.callback().doc_text().map(String::from))
    }

    #[test]
    fn test_mro_diamond() {
        let a = CommandClass::define("A").command(cb("a")).build().unwrap();
        let b = CommandClass::define("B").base(&a).build().unwrap();
        let c = CommandClass::define("C").base(&a).build().unwrap();
        let d = CommandClass::define("D").base(&b).base(&c).build().unwrap();

        assert_eq!(d.mro_names(), vec!["D", "B", "C", "A"]);
        assert!(d.is_subclass_of(&a));
        assert!(!a.is_subclass_of(&d));
    }

    #[test]
    fn test_inconsistent_hierarchy_rejected() {
        let a = CommandClass::define("A").build().unwrap();
        let b = CommandClass::define("B").base(&a).build().unwrap();
        let err = CommandClass::define("X").base(&a).base(&b).build().unwrap_err();
        assert!(matches!(err, DefinitionError::InconsistentHierarchy(_)));

        let err = CommandClass::define("Y").base(&a).base(&a).build().unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateBase { .. }));
    }

    #[test]
    fn test_derived_definition_wins() {
        let a = CommandClass::define("A")
            .command(Callback::function("cmd", |_a| Ok::<_, anyhow::Error>("a")).doc("A"))
            .command(cb("other"))
            .build()
            .unwrap();
        let b = CommandClass::define("B")
            .base(&a)
            .command(Callback::function("cmd", |_a| Ok::<_, anyhow::Error>("b")).doc("B"))
            .build()
            .unwrap();

        assert_eq!(command_tag(&b, "cmd").as_deref(), Some("B"));
        assert_eq!(command_tag(&a, "cmd").as_deref(), Some("A"));
        // Position of the first declaration is kept.
        let names: Vec<String> = b.root().commands().iter().map(|c| c.cli_name()).collect();
        assert_eq!(names, vec!["cmd", "other"]);
    }

    #[test]
    fn test_diamond_prefers_earlier_base() {
        let a = CommandClass::define("A")
            .command(tagged("shared", "A"))
            .command(tagged("only_a", "A"))
            .build()
            .unwrap();
        let b = CommandClass::define("B")
            .base(&a)
            .command(Callback::function("shared", |_a| Ok::<_, anyhow::Error>(())).doc("B"))
            .build()
            .unwrap();
        let c = CommandClass::define("C")
            .base(&a)
            .command(Callback::function("shared", |_a| Ok::<_, anyhow::Error>(())).doc("C"))
            .build()
            .unwrap();
        let d = CommandClass::define("D").base(&b).base(&c).build().unwrap();
        let e = CommandClass::define("E").base(&c).base(&b).build().unwrap();

        assert_eq!(command_tag(&d, "shared").as_deref(), Some("B"));
        assert_eq!(command_tag(&e, "shared").as_deref(), Some("C"));
        assert!(d.root().find_command("only-a").is_some());
    }

    #[test]
    fn test_command_in_does_not_touch_base() {
        let base = CommandClass::define("upstream")
            .group(cb("grp1"))
            .command_in("grp1", cb("sub"))
            .build()
            .unwrap();
        let derived = CommandClass::define("downstream")
            .base(&base)
            .command_in("grp1", cb("extra"))
            .build()
            .unwrap();

        assert_eq!(base.group("grp1").unwrap().commands().len(), 1);
        assert_eq!(derived.group("grp1").unwrap().commands().len(), 2);
        assert!(!base.group("grp1").unwrap().ptr_eq(&derived.group("grp1").unwrap()));
    }

    #[test]
    fn test_parent_declared_later_is_resolved() {
        let class = CommandClass::define("late")
            .command_in("inner", cb("leaf"))
            .group_in("outer", cb("inner"))
            .group(cb("outer"))
            .build()
            .unwrap();

        let inner = class.group("inner").unwrap();
        assert!(inner.find_command("leaf").is_some());
        assert_eq!(inner.parent().unwrap().cli_name(), "outer");
    }

    #[test]
    fn test_unknown_parent_is_definition_error() {
        let err = CommandClass::define("broken")
            .command_in("missing", cb("leaf"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::UnknownParent {
                class: "broken".into(),
                parent: "missing".into(),
                member: "leaf".into(),
            }
        );
    }

    #[test]
    fn test_app_is_copied_per_class() {
        let app = Group::new("grp2");
        app.command(cb("x"));

        let one = CommandClass::define("one").app("grp2", app.clone()).build().unwrap();
        let two = CommandClass::define("two").app("grp2", app.clone()).build().unwrap();
        one.group("grp2").unwrap().command(cb("y"));

        assert_eq!(one.group("grp2").unwrap().commands().len(), 2);
        assert_eq!(two.group("grp2").unwrap().commands().len(), 1);
        assert_eq!(app.commands().len(), 1);
        assert!(one.group("grp2").unwrap().owner_class().unwrap().ptr_eq(&one));
    }

    #[test]
    fn test_compound_classification() {
        let simple = CommandClass::define("basic").handle(cb("handle")).build().unwrap();
        assert!(!simple.is_compound());
        assert!(simple.root_initializer().is_none());
        assert_eq!(simple.single_command().unwrap().attr_name(), "handle");

        let single = CommandClass::define("one").command(cb("only")).build().unwrap();
        assert!(!single.is_compound());

        let multi = CommandClass::define("multi")
            .command(cb("cmd1"))
            .command(cb("sum"))
            .build()
            .unwrap();
        assert!(multi.is_compound());
        assert!(multi.root_initializer().unwrap().is_synthetic());
        assert!(!multi.has_explicit_initializer());

        let init = CommandClass::define("init")
            .initialize(cb("init"))
            .command(cb("only"))
            .build()
            .unwrap();
        assert!(init.is_compound());
        assert!(!init.root_initializer().unwrap().is_synthetic());
    }

    #[test]
    fn test_late_registration_changes_classification() {
        let class = CommandClass::define("grows").command(cb("first")).build().unwrap();
        assert!(!class.is_compound());
        class.root().command(cb("second"));
        assert!(class.is_compound());
    }

    #[test]
    fn test_empty_class() {
        let class = CommandClass::define("noimpl").build().unwrap();
        assert!(class.is_empty());
    }

    #[test]
    fn test_help_precedence() {
        let explicit = CommandClass::define("x")
            .help("class help")
            .initialize(cb("init").doc("init doc"))
            .build()
            .unwrap();
        assert_eq!(explicit.resolved_help().as_deref(), Some("class help"));

        let from_init = CommandClass::define("y")
            .initialize(cb("init").doc("init doc"))
            .handle(cb("handle").doc("handle doc"))
            .build()
            .unwrap();
        assert_eq!(from_init.resolved_help().as_deref(), Some("init doc"));

        let from_handle = CommandClass::define("z")
            .handle(cb("handle").doc("handle doc"))
            .build()
            .unwrap();
        assert_eq!(from_handle.resolved_help().as_deref(), Some("handle doc"));
    }

    #[test]
    fn test_config_inherited_and_suppression_normalized() {
        let base = CommandClass::define("base")
            .help("base help")
            .suppressed_base_arguments(["--verbosity", "no-color"])
            .command(cb("a"))
            .build()
            .unwrap();
        let derived = CommandClass::define("derived").base(&base).build().unwrap();

        assert!(derived.suppresses("verbosity"));
        assert!(derived.suppresses("--no-color"));
        assert!(!derived.suppresses("settings"));
        assert_eq!(derived.root().cli_name(), "derived");
        assert_eq!(base.root().cli_name(), "base");
    }
}
