//! A group that accepts its own options after the subcommand name.

use cmdtree::{Callback, CommandClass, DefinitionError, Param};

/// Label set by `report --label`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label(pub String);

pub fn class() -> Result<CommandClass, DefinitionError> {
    CommandClass::define("interspersed")
        .help("Group options may follow the subcommand.")
        .group_with(
            Callback::method("report", |cmd, args| {
                let label: String = args.get("label")?;
                cmd.set_state(Label(label));
                Ok::<_, anyhow::Error>(())
            })
            .doc("Report on the given items.")
            .param(Param::option("label").default("report").help("Prefix for every line.")),
            |g| g.allow_interspersed_args(true),
        )
        .command_in(
            "report",
            Callback::method("count", |cmd, args| {
                let items: Vec<String> = args.get("items")?;
                let Label(label) = cmd.state::<Label>().unwrap_or_default();
                Ok::<_, anyhow::Error>(format!("{}: {}", label, items.len()))
            })
            .doc("Count the items.")
            .param(Param::argument("items").multiple()),
        )
        .build()
}
