//! A chained command: every subcommand runs in order and the finalizer
//! joins their results.

use cmdtree::{Callback, CommandClass, DefinitionError, Param};
use serde_json::Value;

/// Separator set by `--sep`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Separator(pub String);

pub fn class() -> Result<CommandClass, DefinitionError> {
    CommandClass::define("pipeline")
        .help("Transform text through a chain of subcommands.")
        .chain(true)
        .initialize(
            Callback::method("init", |cmd, args| {
                let sep: String = args.get("sep")?;
                cmd.set_state(Separator(sep));
                Ok::<_, anyhow::Error>(())
            })
            .param(Param::option("sep").default(" ").help("Joins the results.")),
        )
        .command(
            Callback::function("upper", |args| {
                let text: String = args.get("text")?;
                Ok::<_, anyhow::Error>(text.to_uppercase())
            })
            .doc("Upper-case the text.")
            .param(Param::argument("text")),
        )
        .command(
            Callback::function("lower", |args| {
                let text: String = args.get("text")?;
                Ok::<_, anyhow::Error>(text.to_lowercase())
            })
            .doc("Lower-case the text.")
            .param(Param::argument("text")),
        )
        .command(
            Callback::function("reverse", |args| {
                let text: String = args.get("text")?;
                Ok::<_, anyhow::Error>(text.chars().rev().collect::<String>())
            })
            .doc("Reverse the text.")
            .param(Param::argument("text")),
        )
        .finalize(Callback::method("collect", |cmd, args| {
            let sep = cmd.state::<Separator>().map_or_else(|| " ".to_string(), |s| s.0);
            let parts: Vec<&str> = args.results().iter().filter_map(Value::as_str).collect();
            Ok::<_, anyhow::Error>(parts.join(&sep))
        }))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdtree::{call_command, CommandOptions, OutputWrapper, TyperCommand};
    use serde_json::{json, Map};

    #[test]
    fn test_pipeline_joins_results() {
        let cmd = TyperCommand::with_options(
            class().unwrap(),
            CommandOptions::new()
                .stdout(OutputWrapper::buffer())
                .stderr(OutputWrapper::buffer()),
        );
        let out = call_command(&cmd, &["--sep", ",", "upper", "ab", "lower", "CD", "reverse", "ef"], Map::new())
            .unwrap();
        assert_eq!(out, json!("AB,cd,fe"));
    }

    #[test]
    fn test_pipeline_value_may_name_a_subcommand() {
        let cmd = TyperCommand::with_options(
            class().unwrap(),
            CommandOptions::new()
                .stdout(OutputWrapper::buffer())
                .stderr(OutputWrapper::buffer()),
        );
        assert_eq!(call_command(&cmd, &["upper", "lower"], Map::new()).unwrap(), json!("LOWER"));
        let out = call_command(&cmd, &["upper", "lower", "lower", "UPPER"], Map::new()).unwrap();
        assert_eq!(out, json!("LOWER upper"));
    }
}
