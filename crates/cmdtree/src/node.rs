//! Resolution and help over the assembled tree.
//!
//! A [`CommandNode`] is a short-lived view of one point in a command's tree,
//! bound to the owning [`TyperCommand`]. Nodes are built on demand for each
//! lookup or help request and their children are read fresh from the live
//! groups every time, so commands registered by extension modules after the
//! class was assembled are always visible.
//!
//! Nodes also produce the clap command for their subtree; the tree is rebuilt
//! for every parse and never cached.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use clap::Command;

use crate::binder::{bind, BoundCallback};
use crate::command::TyperCommand;
use crate::error::{Error, LookupError};
use crate::group::{CommandInfo, Group};
use crate::handler::Callback;
use crate::param::Param;
use crate::shared::injected_params;

/// What a node stands for.
#[derive(Debug, Clone)]
pub enum NodeTarget {
    Group(Group),
    Command(CommandInfo),
}

/// One point in the command tree.
#[derive(Clone)]
pub struct CommandNode {
    name: String,
    target: NodeTarget,
    owner: TyperCommand,
    parent: Option<Rc<CommandNode>>,
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNode")
            .field("name", &self.name)
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

impl CommandNode {
    /// The root node of `owner`'s tree.
    ///
    /// A simple class (one command, no groups, no initializer) is rooted at
    /// its single command, so that command's parameters sit directly on the
    /// program.
    pub fn root(owner: &TyperCommand) -> Self {
        let class = owner.class();
        let target = match class.single_command() {
            Some(info) => NodeTarget::Command(info),
            None => NodeTarget::Group(class.root()),
        };
        Self {
            name: class.root().cli_name(),
            target,
            owner: owner.clone(),
            parent: None,
        }
    }

    /// CLI-facing name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &NodeTarget {
        &self.target
    }

    pub fn owner(&self) -> &TyperCommand {
        &self.owner
    }

    pub fn parent(&self) -> Option<&CommandNode> {
        self.parent.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_group(&self) -> bool {
        matches!(self.target, NodeTarget::Group(_))
    }

    /// Names from the root down to this node, excluding the root.
    pub fn path(&self) -> Vec<String> {
        let mut path = Vec::new();
        let mut node = self;
        while let Some(parent) = node.parent.as_deref() {
            path.push(node.name.clone());
            node = parent;
        }
        path.reverse();
        path
    }

    /// Child nodes, read fresh from the live tree.
    pub fn children(&self) -> Vec<CommandNode> {
        let NodeTarget::Group(group) = &self.target else {
            return Vec::new();
        };
        let parent = Rc::new(self.clone());
        let commands = group.commands().into_iter().map(|info| CommandNode {
            name: info.cli_name(),
            target: NodeTarget::Command(info),
            owner: self.owner.clone(),
            parent: Some(parent.clone()),
        });
        let groups = group.groups().into_iter().map(|g| CommandNode {
            name: g.cli_name(),
            target: NodeTarget::Group(g),
            owner: self.owner.clone(),
            parent: Some(parent.clone()),
        });
        commands.chain(groups).collect()
    }

    /// Finds a direct child by function name or CLI name.
    pub fn child(&self, name: &str) -> Option<CommandNode> {
        if let NodeTarget::Command(info) = &self.target {
            // A simple root answers to its own command's names.
            if self.is_root() && info.answers_to(name) {
                return Some(self.clone());
            }
            return None;
        }
        self.children().into_iter().find(|c| c.answers_to(name))
    }

    fn answers_to(&self, name: &str) -> bool {
        match &self.target {
            NodeTarget::Command(info) => info.answers_to(name),
            NodeTarget::Group(g) => g.answers_to(name),
        }
    }

    /// Descends one level per path segment.
    pub fn get_command<S: AsRef<str>>(&self, path: &[S]) -> Result<CommandNode, LookupError> {
        let requested: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        let mut node = self.clone();
        for segment in &requested {
            node = node
                .child(segment)
                .ok_or_else(|| LookupError::new(segment.clone(), &requested))?;
        }
        Ok(node)
    }

    /// The longest prefix of `path` that resolves.
    pub fn deepest(&self, path: &[String]) -> CommandNode {
        let mut node = self.clone();
        for segment in path {
            match node.child(segment) {
                Some(child) => node = child,
                None => break,
            }
        }
        node
    }

    /// The function this node runs, bound to the owner.
    ///
    /// Groups without an initializer (and compound roots without one) bind a
    /// no-op.
    pub fn callback(&self) -> BoundCallback {
        bind(&self.function(), &self.owner)
    }

    pub(crate) fn function(&self) -> Callback {
        match &self.target {
            NodeTarget::Command(info) => info.callback().clone(),
            NodeTarget::Group(_) if self.is_root() => self
                .owner
                .class()
                .root_initializer()
                .unwrap_or_else(|| Callback::noop("init")),
            NodeTarget::Group(g) => g
                .initializer()
                .unwrap_or_else(|| Callback::noop(g.attr_name().unwrap_or_default())),
        }
    }

    /// The group finalizer, if any.
    pub fn finalizer(&self) -> Option<Callback> {
        match &self.target {
            NodeTarget::Group(g) => g.finalizer(),
            NodeTarget::Command(_) => None,
        }
    }

    /// Primary handler run by a compound root invoked without a subcommand.
    pub fn primary_handler(&self) -> Option<CommandInfo> {
        match &self.target {
            NodeTarget::Group(_) if self.is_root() => {
                self.owner.class().primary_handler().cloned()
            }
            _ => None,
        }
    }

    pub fn is_chain(&self) -> bool {
        matches!(&self.target, NodeTarget::Group(g) if g.config().is_chain())
    }

    pub fn is_deprecated(&self) -> bool {
        match &self.target {
            NodeTarget::Command(info) => info.config().deprecated,
            NodeTarget::Group(g) => g.config().deprecated,
        }
    }

    /// Parameters declared at this level, including the shared options on
    /// the level that carries them.
    pub fn params(&self) -> Vec<Param> {
        let mut params: Vec<Param> = Vec::new();
        let mut push = |p: &Param| {
            if !params.iter().any(|q| q.name() == p.name()) {
                params.push(p.clone());
            }
        };

        let own = self.function();
        for p in own.declared_params() {
            push(p);
        }
        if let Some(primary) = self.primary_handler() {
            for p in primary.callback().declared_params() {
                push(p);
            }
        }
        if let Some(fin) = self.finalizer() {
            for p in fin.declared_params() {
                push(p);
            }
        }
        if self.is_root() {
            for p in &injected_params(self.owner.class()) {
                push(p);
            }
        }
        params
    }

    /// Help text for this node.
    pub fn help(&self) -> Option<String> {
        if self.is_root() {
            return self.owner.class().resolved_help();
        }
        match &self.target {
            NodeTarget::Command(info) => info.help(),
            NodeTarget::Group(g) => g.help(),
        }
    }

    /// Builds the clap command for this subtree.
    ///
    /// Parameters named in `relax` are never required; their values come
    /// from somewhere other than the command line.
    pub fn clap_command(&self, relax: &HashSet<String>) -> Command {
        let mut cmd = Command::new(self.name.clone())
            .disable_help_subcommand(true)
            .disable_version_flag(true);

        let (short_help, epilog, hidden, deprecated, no_args_is_help) = match &self.target {
            NodeTarget::Command(info) => {
                let c = info.config();
                (c.short_help.clone(), c.epilog.clone(), c.hidden, c.deprecated, c.no_args_is_help)
            }
            NodeTarget::Group(g) => {
                let c = g.config();
                (c.short_help.clone(), c.epilog.clone(), c.hidden, c.deprecated, c.no_args_is_help)
            }
        };
        let mut help = self.help();
        if deprecated {
            help = Some(match help {
                Some(h) => format!("{} (Deprecated)", h),
                None => "(Deprecated)".to_string(),
            });
        }
        if let Some(help) = help {
            let about = short_help.unwrap_or_else(|| first_line(&help));
            cmd = cmd.about(about).long_about(help);
        }
        if let Some(epilog) = epilog {
            cmd = cmd.after_help(epilog);
        }
        if hidden {
            cmd = cmd.hide(true);
        }
        if no_args_is_help {
            cmd = cmd.arg_required_else_help(true);
        }
        if let NodeTarget::Command(info) = &self.target {
            if info.attr_name() != info.cli_name() {
                cmd = cmd.alias(info.attr_name().to_string());
            }
        }

        let interspersed = match &self.target {
            NodeTarget::Group(g) => g.config().allow_interspersed_args,
            NodeTarget::Command(_) => false,
        };
        for p in self.params() {
            for arg in p.to_args(relax.contains(p.name())) {
                let arg = if interspersed && !arg.is_positional() {
                    arg.global(true)
                } else {
                    arg
                };
                cmd = cmd.arg(arg);
            }
        }

        if let NodeTarget::Group(g) = &self.target {
            if let Some(attr) = g.attr_name().filter(|a| *a != self.name) {
                cmd = cmd.alias(attr);
            }
            let children = self.children();
            let optional = g.config().invoke_without_command
                || self.primary_handler().is_some()
                || children.is_empty();
            cmd = cmd
                .subcommand_required(!optional)
                .subcommand_value_name("COMMAND")
                .subcommand_help_heading("Commands");
            for child in children {
                cmd = cmd.subcommand(child.clap_command(relax));
            }
        }
        cmd
    }

    /// Renders this node's help through clap.
    pub fn render_help(&self, color: bool) -> String {
        let root = self.root_node();
        let mut cmd = root.clap_command(&HashSet::new());
        cmd.build();
        let mut target = cmd;
        for segment in self.path() {
            match target.find_subcommand(&segment).cloned() {
                Some(sub) => target = sub,
                None => break,
            }
        }
        let help = target.render_help();
        if color {
            help.ansi().to_string()
        } else {
            help.to_string()
        }
    }

    /// Writes this node's help to the owner's stdout.
    pub fn print_help(&self) -> Result<(), Error> {
        let help = self.render_help(self.owner.use_color());
        self.owner.stdout().write(&help);
        Ok(())
    }

    fn root_node(&self) -> CommandNode {
        let mut node = self;
        while let Some(parent) = node.parent.as_deref() {
            node = parent;
        }
        node.clone()
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::CommandClass;

    fn cb(name: &str) -> Callback {
        Callback::function(name, |_a| Ok::<_, anyhow::Error>(()))
    }

    fn hierarchy() -> TyperCommand {
        let class = CommandClass::define("hierarchy")
            .group(cb("math").doc("Do some math at the given precision.").param(
                Param::option("precision").int().default(2),
            ))
            .command_in(
                "math",
                cb("multiply").param(Param::argument("numbers").float().multiple()),
            )
            .command_in("math", cb("divide"))
            .command(cb("grp1_cmd"))
            .build()
            .unwrap();
        TyperCommand::new(class)
    }

    #[test]
    fn test_get_command_descends() {
        let cmd = hierarchy();
        let root = CommandNode::root(&cmd);
        let node = root.get_command(&["math", "divide"]).unwrap();
        assert_eq!(node.name(), "divide");
        assert_eq!(node.path(), vec!["math", "divide"]);
        assert_eq!(node.parent().unwrap().name(), "math");
        assert!(root.get_command::<&str>(&[]).unwrap().is_root());
    }

    #[test]
    fn test_get_command_by_either_name() {
        let root = CommandNode::root(&hierarchy());
        assert_eq!(root.get_command(&["grp1_cmd"]).unwrap().name(), "grp1-cmd");
        assert_eq!(root.get_command(&["grp1-cmd"]).unwrap().name(), "grp1-cmd");
    }

    #[test]
    fn test_missing_segment_is_named() {
        let root = CommandNode::root(&hierarchy());
        let err = root.get_command(&["math", "subtract"]).unwrap_err();
        assert_eq!(err.segment, "subtract");
        assert_eq!(err.path, vec!["math", "subtract"]);
    }

    #[test]
    fn test_children_see_late_registration() {
        let cmd = hierarchy();
        let root = CommandNode::root(&cmd);
        let math = root.get_command(&["math"]).unwrap();
        assert_eq!(math.children().len(), 2);

        cmd.class().group("math").unwrap().command(cb("add"));
        assert_eq!(math.children().len(), 3);
        assert!(root.get_command(&["math", "add"]).is_ok());
    }

    #[test]
    fn test_shared_options_only_on_root() {
        let cmd = hierarchy();
        let root = CommandNode::root(&cmd);
        let names: Vec<String> = root.params().iter().map(|p| p.name().to_string()).collect();
        assert!(names.contains(&"verbosity".to_string()));
        let math = root.get_command(&["math"]).unwrap();
        let names: Vec<String> = math.params().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["precision"]);
    }

    #[test]
    fn test_render_help_for_nested_node() {
        let root = CommandNode::root(&hierarchy());
        let help = root.get_command(&["math"]).unwrap().render_help(false);
        assert!(help.contains("Do some math at the given precision."));
        assert!(help.contains("multiply"));
        assert!(help.contains("--precision"));
        assert!(help.contains("hierarchy math"));

        let root_help = root.render_help(false);
        assert!(root_help.contains("Django"));
        assert!(root_help.contains("--verbosity"));
    }

    #[test]
    fn test_simple_class_is_rooted_at_command() {
        let class = CommandClass::define("basic")
            .handle(cb("handle").param(Param::argument("arg1")))
            .build()
            .unwrap();
        let cmd = TyperCommand::new(class);
        let root = CommandNode::root(&cmd);
        assert!(!root.is_group());
        let names: Vec<String> = root.params().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names[0], "arg1");
        assert!(names.contains(&"settings".to_string()));
    }
}
