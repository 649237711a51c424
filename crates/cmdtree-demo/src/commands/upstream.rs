//! A command other modules extend after the fact.
//!
//! `grp1` is looked up through [`CommandClass::group`] by the extension
//! modules in [`super::plugin_one`] and [`super::plugin_two`].

use cmdtree::{Callback, CommandClass, DefinitionError, Param};

pub fn class() -> Result<CommandClass, DefinitionError> {
    CommandClass::define("upstream")
        .help("A command extension modules add subcommands to.")
        .command(
            Callback::function("cmd1", |_args| Ok::<_, anyhow::Error>("upstream:cmd1"))
                .doc("A root level command."),
        )
        .group(Callback::function("grp1", |_args| Ok::<_, anyhow::Error>(())).doc("A group extension modules add to."))
        .command_in(
            "grp1",
            Callback::function("sub1", |args| {
                let name: String = args.get("name")?;
                Ok::<_, anyhow::Error>(format!("upstream:sub1 {}", name))
            })
            .param(Param::argument("name")),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standalone_grp1_has_only_its_own_commands() {
        let class = class().unwrap();
        let names: Vec<String> = class
            .group("grp1")
            .unwrap()
            .commands()
            .iter()
            .map(|c| c.cli_name())
            .collect();
        assert_eq!(names, vec!["sub1"]);
    }
}
