//! Several sibling subcommands on the root.

use cmdtree::{Callback, CommandClass, DefinitionError, Param};

pub fn class() -> Result<CommandClass, DefinitionError> {
    CommandClass::define("multi")
        .help("A command that defines subcommands.")
        .command(
            Callback::function("cmd1", |args| Ok::<_, anyhow::Error>(args.to_json()))
                .doc("A command that takes a list of files and a flag.")
                .params([
                    Param::argument("files").multiple().help("The files to process."),
                    Param::flag("flag1").help("A flag."),
                ]),
        )
        .command(
            Callback::function("sum", |args| {
                let numbers: Vec<f64> = args.get("numbers")?;
                Ok::<_, anyhow::Error>(numbers.iter().sum::<f64>())
            })
            .doc("Sum the given numbers.")
            .param(Param::argument("numbers").float().multiple()),
        )
        .command_with(
            Callback::function("total", |args| {
                let numbers: Vec<f64> = args.get("numbers")?;
                Ok::<_, anyhow::Error>(numbers.iter().sum::<f64>())
            })
            .doc("Sum the given numbers.")
            .param(Param::argument("numbers").float().multiple()),
            |c| c.deprecated(true).help("Use sum instead."),
        )
        .build()
}
