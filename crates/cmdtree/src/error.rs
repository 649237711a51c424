//! Error types for command trees.
//!
//! Errors fall into a handful of families:
//!
//! - [`DefinitionError`]: a command class was declared incorrectly (unknown
//!   parent group, inconsistent base ordering). Programmer errors, never
//!   retried.
//! - [`LookupError`]: a dotted command path names a node that does not exist.
//! - [`UsageError`]: the user supplied bad input. Raised by clap or by
//!   programmatic value coercion, and translated once at the adapter boundary.
//! - [`Error::NotImplemented`]: a command class never registered anything.
//! - [`Error::NotSupported`]: a deliberately disabled feature was used.
//! - [`Error::Exit`]: `--help` or `--version` asked the process to stop.

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error for the command tree engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Usage(#[from] UsageError),

    /// No command, group or handler was ever registered on the class.
    #[error("No commands or command groups were registered on {0}")]
    NotImplemented(String),

    /// An intentionally unsupported operation was attempted.
    #[error("{0} is not supported")]
    NotSupported(String),

    /// Clean termination requested by the parser (help or version output).
    #[error("exit with status {code}")]
    Exit { code: i32, output: String },

    /// A user handler failed.
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl Error {
    /// Returns true if this error is a usage error.
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_))
    }

    /// Returns the usage error, if this is one.
    pub fn as_usage(&self) -> Option<&UsageError> {
        match self {
            Error::Usage(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors raised while assembling a command class.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// A registration names a parent group that is not in the tree.
    #[error("{class} has no attribute '{parent}' to register '{member}' on")]
    UnknownParent {
        class: String,
        parent: String,
        member: String,
    },

    /// Base classes cannot be linearized.
    #[error("cannot create a consistent method resolution order for {0}")]
    InconsistentHierarchy(String),

    /// A class lists the same base twice.
    #[error("duplicate base class {base} in {class}")]
    DuplicateBase { class: String, base: String },
}

/// A dotted command path did not resolve.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("No such command '{segment}'")]
pub struct LookupError {
    /// The first segment that could not be found.
    pub segment: String,
    /// The full path that was requested.
    pub path: Vec<String>,
}

impl LookupError {
    pub fn new(segment: impl Into<String>, path: &[String]) -> Self {
        Self {
            segment: segment.into(),
            path: path.to_vec(),
        }
    }
}

/// Classification of a usage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    /// A required parameter was not given.
    MissingParameter,
    /// A value could not be converted to the parameter's type.
    BadParameter,
    /// An option or argument is unknown.
    NoSuchOption,
    /// A subcommand is unknown.
    NoSuchCommand,
    /// Two mutually exclusive values were supplied.
    Conflict,
    /// Anything else clap reports.
    Other,
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageKind::MissingParameter => write!(f, "missing parameter"),
            UsageKind::BadParameter => write!(f, "bad parameter"),
            UsageKind::NoSuchOption => write!(f, "no such option"),
            UsageKind::NoSuchCommand => write!(f, "no such command"),
            UsageKind::Conflict => write!(f, "conflicting parameters"),
            UsageKind::Other => write!(f, "usage error"),
        }
    }
}

/// User-facing parameter error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct UsageError {
    pub kind: UsageKind,
    pub message: String,
    /// Command path (below the root) where the error occurred.
    pub path: Vec<String>,
}

impl UsageError {
    pub fn new(kind: UsageKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: Vec::new(),
        }
    }

    pub fn missing(param: &str) -> Self {
        Self::new(
            UsageKind::MissingParameter,
            format!("Missing parameter: {}", param),
        )
    }

    pub fn bad_parameter(param: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            UsageKind::BadParameter,
            format!("Invalid value for '{}': {}", param, reason),
        )
    }

    pub fn no_such_option(name: &str) -> Self {
        Self::new(UsageKind::NoSuchOption, format!("No such option: {}", name))
    }

    pub fn no_such_command(name: &str) -> Self {
        Self::new(
            UsageKind::NoSuchCommand,
            format!("No such command '{}'.", name),
        )
    }

    /// Attaches the command path where the error happened.
    pub fn at(mut self, path: &[String]) -> Self {
        self.path = path.to_vec();
        self
    }

    /// Converts a clap parse failure. The message keeps every line clap
    /// wrote before its usage footer.
    pub fn from_clap(err: &clap::Error, path: &[String]) -> Self {
        use clap::error::ErrorKind;

        let kind = match err.kind() {
            ErrorKind::MissingRequiredArgument => UsageKind::MissingParameter,
            ErrorKind::InvalidValue | ErrorKind::ValueValidation | ErrorKind::WrongNumberOfValues => {
                UsageKind::BadParameter
            }
            ErrorKind::UnknownArgument => UsageKind::NoSuchOption,
            ErrorKind::InvalidSubcommand | ErrorKind::MissingSubcommand => {
                UsageKind::NoSuchCommand
            }
            ErrorKind::ArgumentConflict => UsageKind::Conflict,
            _ => UsageKind::Other,
        };
        let rendered = err.render().to_string();
        let body: Vec<&str> = rendered
            .lines()
            .take_while(|l| {
                let l = l.trim_start();
                !l.starts_with("Usage:") && !l.starts_with("For more information")
            })
            .collect();
        let message = body
            .join("\n")
            .trim()
            .trim_start_matches("error: ")
            .to_string();
        Self {
            kind,
            message,
            path: path.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_names_segment() {
        let err = LookupError::new("nope", &["grp1".into(), "nope".into()]);
        assert_eq!(err.to_string(), "No such command 'nope'");
        assert_eq!(err.path, vec!["grp1", "nope"]);
    }

    #[test]
    fn test_not_implemented_display() {
        let err = Error::NotImplemented("noimpl".into());
        assert_eq!(
            err.to_string(),
            "No commands or command groups were registered on noimpl"
        );
    }

    #[test]
    fn test_usage_from_clap_names_missing_argument() {
        let cmd = clap::Command::new("app").arg(clap::Arg::new("n").long("n").required(true));
        let err = cmd.try_get_matches_from(["app"]).unwrap_err();
        let usage = UsageError::from_clap(&err, &[]);
        assert_eq!(usage.kind, UsageKind::MissingParameter);
        assert!(usage.message.starts_with("the following required arguments were not provided:"));
        assert!(usage.message.contains("--n"));
        assert!(!usage.message.contains("Usage:"));
        assert!(!usage.message.contains("For more information"));
    }

    #[test]
    fn test_usage_from_clap_positional() {
        let cmd = clap::Command::new("app").arg(clap::Arg::new("text").required(true));
        let err = cmd.try_get_matches_from(["app"]).unwrap_err();
        let usage = UsageError::from_clap(&err, &["upper".into()]);
        assert!(usage.message.contains("<text>"));
        assert_eq!(usage.path, vec!["upper"]);
    }

    #[test]
    fn test_usage_path_attached() {
        let err = UsageError::missing("numbers").at(&["math".into()]);
        assert_eq!(err.path, vec!["math"]);
        assert_eq!(err.to_string(), "Missing parameter: numbers");
    }
}
