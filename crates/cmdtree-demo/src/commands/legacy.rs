//! A plain two-phase command with no command tree, listed beside the tree
//! commands to show both kinds share one registry.

use cmdtree::{BaseCommand, CommandParser, Error, Namespace, OutputWrapper, Param};
use serde_json::Value;

pub struct Greet {
    stdout: OutputWrapper,
    stderr: OutputWrapper,
}

impl Greet {
    pub fn new() -> Self {
        Self::with_output(OutputWrapper::stdout(), OutputWrapper::stderr())
    }

    pub fn with_output(stdout: OutputWrapper, stderr: OutputWrapper) -> Self {
        Self { stdout, stderr }
    }
}

impl Default for Greet {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseCommand for Greet {
    fn name(&self) -> &str {
        "greet"
    }

    fn help(&self) -> Option<String> {
        Some("Say hello without a command tree.".into())
    }

    fn stdout(&self) -> &OutputWrapper {
        &self.stdout
    }

    fn stderr(&self) -> &OutputWrapper {
        &self.stderr
    }

    fn add_arguments(&self, parser: &mut dyn CommandParser) -> Result<(), Error> {
        parser.add_argument(Param::argument("name").help("Who to greet."))?;
        parser.add_argument(Param::flag("shout"))
    }

    fn handle(&self, options: &Namespace) -> Result<Value, Error> {
        let name: String = options.get_as("name")?;
        let greeting = format!("hello {}", name);
        Ok(Value::String(if options.get_bool("shout") {
            greeting.to_uppercase()
        } else {
            greeting
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_greet_runs_from_argv() {
        let greet = Greet::with_output(OutputWrapper::buffer(), OutputWrapper::buffer());
        assert_eq!(greet.run_from_argv(&argv(&["manage", "greet", "ada", "--shout"])), 0);
        assert_eq!(greet.stdout().contents(), "HELLO ADA\n");
    }

    #[test]
    fn test_greet_shares_framework_options() {
        let greet = Greet::with_output(OutputWrapper::buffer(), OutputWrapper::buffer());
        assert_eq!(greet.run_from_argv(&argv(&["manage", "greet", "ada", "--verbosity", "2"])), 0);
    }
}
