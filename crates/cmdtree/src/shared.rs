//! Framework-level options shared by every command.
//!
//! These are the options the surrounding management framework adds to all
//! of its commands (`--version`, `--verbosity`, `--settings`, ...). A command
//! tree exposes them exactly once: on the root initializer of a compound
//! class, or on the single command of a simple class. A class can drop any of
//! them with `suppressed_base_arguments`.

use serde_json::{Map, Value};

use crate::class::CommandClass;
use crate::param::Param;

/// Help panel the shared options are listed under.
pub const SHARED_PANEL: &str = "Django";

/// Environment variable `--settings` falls back to.
pub const SETTINGS_ENV: &str = "CMDTREE_SETTINGS";

/// Version reported by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Every shared option, in display order.
pub fn shared_params() -> Vec<Param> {
    vec![
        Param::flag("version").help("Show program's version number and exit."),
        Param::option("verbosity")
            .short('v')
            .int()
            .default(1)
            .help("Verbosity level; 0=minimal output, 1=normal output, 2=verbose output, 3=very verbose output"),
        Param::option("settings")
            .env(SETTINGS_ENV)
            .help("The settings module to use. If not provided, the CMDTREE_SETTINGS environment variable is used."),
        Param::option("pythonpath")
            .path()
            .help("A directory to add to the module search path."),
        Param::toggle("traceback", false).help("Print the full error chain when a command fails."),
        Param::flag("no_color").help("Don't colorize the command output."),
        Param::flag("force_color").help("Force colorization of the command output."),
        Param::flag("skip_checks").help("Skip system checks."),
    ]
    .into_iter()
    .map(|p| p.panel(SHARED_PANEL))
    .collect()
}

/// Shared options left after the class's suppressions.
pub fn injected_params(class: &CommandClass) -> Vec<Param> {
    shared_params()
        .into_iter()
        .filter(|p| !class.suppresses(p.name()))
        .collect()
}

/// Declared defaults of the non-suppressed shared options.
///
/// Options without a default map to `null` so that every key is present.
pub fn shared_defaults(class: &CommandClass) -> Map<String, Value> {
    injected_params(class)
        .into_iter()
        .map(|p| {
            let value = p.default_value().cloned().unwrap_or(Value::Null);
            (p.name().to_string(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Callback;
    use serde_json::json;

    fn class(suppressed: &[&str]) -> CommandClass {
        CommandClass::define("shared")
            .suppressed_base_arguments(suppressed.iter().copied())
            .command(Callback::function("a", |_a| Ok::<_, anyhow::Error>(())))
            .build()
            .unwrap()
    }

    #[test]
    fn test_all_shared_options_on_panel() {
        let params = shared_params();
        let names: Vec<&str> = params.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "version",
                "verbosity",
                "settings",
                "pythonpath",
                "traceback",
                "no_color",
                "force_color",
                "skip_checks"
            ]
        );
        let options: Vec<String> = params.iter().flat_map(|p| p.option_strings()).collect();
        assert!(options.contains(&"--no-traceback".to_string()));
        assert!(options.contains(&"-v".to_string()));
        assert!(options.contains(&"--skip-checks".to_string()));
    }

    #[test]
    fn test_suppression_removes_only_named() {
        let c = class(&["verbosity", "--no-color"]);
        let defaults = shared_defaults(&c);
        assert!(!defaults.contains_key("verbosity"));
        assert!(!defaults.contains_key("no_color"));
        assert_eq!(defaults.get("traceback"), Some(&json!(false)));
        assert_eq!(defaults.get("settings"), Some(&Value::Null));
        assert_eq!(defaults.len(), 6);
    }

    #[test]
    fn test_defaults_without_suppression() {
        let defaults = shared_defaults(&class(&[]));
        assert_eq!(defaults.get("verbosity"), Some(&json!(1)));
        assert_eq!(defaults.get("skip_checks"), Some(&json!(false)));
        assert!(defaults.contains_key("pythonpath"));
        assert!(!defaults.contains_key("precision"));
    }
}
