//! A simple command that prompts for a value the caller left out.

use cmdtree::{Callback, CommandClass, DefinitionError, Param};

pub fn class() -> Result<CommandClass, DefinitionError> {
    CommandClass::define("prompted")
        .handle(
            Callback::function("handle", |args| {
                let name: String = args.get("name")?;
                let times: usize = args.get("times")?;
                Ok::<_, anyhow::Error>(vec![format!("hello {}", name); times].join(" "))
            })
            .doc("Greet someone, asking for their name if needed.")
            .params([
                Param::option("name").prompt("Name").help("Who to greet."),
                Param::option("times").int().default(1),
            ]),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdtree::{call_command, CommandOptions, OutputWrapper, ScriptedTerminal, TyperCommand};
    use serde_json::{json, Map};
    use std::rc::Rc;

    fn with_answers(answers: &[&str]) -> (TyperCommand, Rc<ScriptedTerminal>) {
        let terminal = Rc::new(ScriptedTerminal::new(answers.iter().copied()));
        let cmd = TyperCommand::with_options(
            class().unwrap(),
            CommandOptions::new()
                .stdout(OutputWrapper::buffer())
                .stderr(OutputWrapper::buffer())
                .terminal(terminal.clone()),
        );
        (cmd, terminal)
    }

    #[test]
    fn test_missing_name_is_prompted() {
        let (cmd, terminal) = with_answers(&["ada"]);
        let out = call_command(&cmd, &["--times", "2"], Map::new()).unwrap();
        assert_eq!(out, json!("hello ada hello ada"));
        assert_eq!(terminal.asked().len(), 1);
    }

    #[test]
    fn test_given_name_is_not_prompted() {
        let (cmd, terminal) = with_answers(&[]);
        let out = call_command(&cmd, &["--name", "bob"], Map::new()).unwrap();
        assert_eq!(out, json!("hello bob"));
        assert!(terminal.asked().is_empty());
    }
}
