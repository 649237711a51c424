//! Interactive prompts for parameters that were not given.
//!
//! Prompting goes through the [`TerminalIO`] trait so tests can script the
//! answers. [`RealTerminal`] talks to stdin/stdout and only prompts when
//! stdin is a TTY; [`ScriptedTerminal`] replays canned answers and records
//! what was asked.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};

use serde_json::Value;

use crate::error::{UsageError, UsageKind};
use crate::param::{display_value, Param};

/// Abstraction over terminal I/O for testability.
pub trait TerminalIO {
    /// Check if stdin is a terminal.
    fn is_terminal(&self) -> bool;

    /// Write a prompt to stdout.
    fn write_prompt(&self, prompt: &str) -> io::Result<()>;

    /// Read a line from stdin. An empty string means end of input.
    fn read_line(&self) -> io::Result<String>;
}

/// Real terminal I/O.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealTerminal;

impl TerminalIO for RealTerminal {
    fn is_terminal(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    fn write_prompt(&self, prompt: &str) -> io::Result<()> {
        print!("{}", prompt);
        io::stdout().flush()
    }

    fn read_line(&self) -> io::Result<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

/// Replays a fixed list of answers.
#[derive(Debug, Default)]
pub struct ScriptedTerminal {
    answers: RefCell<VecDeque<String>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedTerminal {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    /// Every prompt written so far.
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.answers.borrow().len()
    }
}

impl TerminalIO for ScriptedTerminal {
    fn is_terminal(&self) -> bool {
        true
    }

    fn write_prompt(&self, prompt: &str) -> io::Result<()> {
        self.asked.borrow_mut().push(prompt.to_string());
        Ok(())
    }

    fn read_line(&self) -> io::Result<String> {
        Ok(self
            .answers
            .borrow_mut()
            .pop_front()
            .map(|a| format!("{}\n", a))
            .unwrap_or_default())
    }
}

/// Asks for `param` until a valid answer is given.
///
/// Returns `Ok(None)` when the terminal is not interactive. An empty answer
/// selects the default when there is one.
pub fn ask(io: &dyn TerminalIO, param: &Param) -> Result<Option<Value>, UsageError> {
    if !io.is_terminal() {
        return Ok(None);
    }
    let text = param.prompt_text().unwrap_or(param.name());
    let prompt = match param.default_value() {
        Some(default) if !default.is_null() => format!("{} [{}]: ", text, display_value(default)),
        _ => format!("{}: ", text),
    };

    loop {
        io.write_prompt(&prompt).map_err(prompt_failed)?;
        let line = io.read_line().map_err(prompt_failed)?;
        if line.is_empty() {
            tracing::debug!(param = param.name(), "prompt cancelled");
            return Err(UsageError::new(UsageKind::Other, "Aborted!"));
        }
        let answer = line.trim_end_matches(['\n', '\r']);
        if answer.trim().is_empty() {
            if let Some(default) = param.default_value() {
                return Ok(Some(default.clone()));
            }
            continue;
        }
        match param.parse_answer(answer) {
            Ok(value) => return Ok(Some(value)),
            Err(e) => {
                io.write_prompt(&format!("Error: {}\n", e)).map_err(prompt_failed)?;
            }
        }
    }
}

fn prompt_failed(e: io::Error) -> UsageError {
    UsageError::new(UsageKind::Other, format!("Prompt failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scripted_answer_is_coerced() {
        let io = ScriptedTerminal::new(["42"]);
        let p = Param::option("count").int().prompt("How many");
        assert_eq!(ask(&io, &p).unwrap(), Some(json!(42)));
        assert_eq!(io.asked(), vec!["How many: "]);
    }

    #[test]
    fn test_invalid_answer_reprompts() {
        let io = ScriptedTerminal::new(["many", "3"]);
        let p = Param::option("count").int().prompt("How many");
        assert_eq!(ask(&io, &p).unwrap(), Some(json!(3)));
        let asked = io.asked();
        assert_eq!(asked.len(), 3);
        assert!(asked[1].starts_with("Error: "));
    }

    #[test]
    fn test_empty_answer_takes_default() {
        let io = ScriptedTerminal::new([""]);
        let p = Param::option("name").prompt("Name").default("anon");
        assert_eq!(ask(&io, &p).unwrap(), Some(json!("anon")));
        assert_eq!(io.asked(), vec!["Name [anon]: "]);
    }

    #[test]
    fn test_end_of_input_aborts() {
        let io = ScriptedTerminal::new(Vec::<String>::new());
        let p = Param::option("name").prompt("Name");
        let err = ask(&io, &p).unwrap_err();
        assert_eq!(err.message, "Aborted!");
    }

    #[test]
    fn test_non_interactive_skips() {
        struct Piped;
        impl TerminalIO for Piped {
            fn is_terminal(&self) -> bool {
                false
            }
            fn write_prompt(&self, _prompt: &str) -> io::Result<()> {
                panic!("must not prompt")
            }
            fn read_line(&self) -> io::Result<String> {
                panic!("must not read")
            }
        }
        let p = Param::option("name").prompt("Name");
        assert_eq!(ask(&Piped, &p).unwrap(), None);
    }
}
