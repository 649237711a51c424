//! A command that never registers anything.

use cmdtree::{CommandClass, DefinitionError};

pub fn class() -> Result<CommandClass, DefinitionError> {
    CommandClass::define("noimpl")
        .help("Registers nothing; invoking it is an error.")
        .build()
}
