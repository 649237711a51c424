//! A simple command: one handler, so its parameters sit on the program.

use cmdtree::{Callback, CommandClass, DefinitionError, Param};

pub fn class() -> Result<CommandClass, DefinitionError> {
    CommandClass::define("basic")
        .help("A basic command.")
        .handle(
            Callback::function("handle", |args| Ok::<_, anyhow::Error>(args.to_json())).params([
                Param::argument("arg1").help("The first argument."),
                Param::argument("arg2").int().help("The second argument."),
                Param::option("arg3").float().default(0.5).help("The third argument."),
                Param::option("arg4").int().default(1).help("The fourth argument."),
            ]),
        )
        .build()
}
