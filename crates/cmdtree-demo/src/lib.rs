//! Worked example management commands.
//!
//! Each module under [`commands`] defines one command class. [`registry`]
//! registers them all with a [`CommandRegistry`], installing the requested
//! extension modules onto `upstream` first.

pub mod commands;

use anyhow::{bail, Context as _};
use cmdtree::{CommandClass, CommandRegistry, TyperCommand};

/// Environment variable listing the extension modules to install.
pub const PLUGINS_ENV: &str = "CMDTREE_DEMO_PLUGINS";

/// App label the demo commands are listed under.
pub const APP: &str = "demo";

/// Extension module names read from [`PLUGINS_ENV`] (comma separated).
pub fn plugins_from_env() -> Vec<String> {
    std::env::var(PLUGINS_ENV)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// The `upstream` class with the named extension modules installed.
pub fn upstream_with(plugins: &[String]) -> anyhow::Result<CommandClass> {
    let class = commands::upstream::class()?;
    for plugin in plugins {
        match plugin.as_str() {
            "plugin_one" => commands::plugin_one::install(&class),
            "plugin_two" => commands::plugin_two::install(&class),
            other => bail!("unknown extension module '{}'", other),
        }
        .with_context(|| format!("installing {}", plugin))?;
        tracing::debug!(plugin = plugin.as_str(), "extension installed");
    }
    Ok(class)
}

/// Registers every demo command.
pub fn registry(plugins: &[String]) -> anyhow::Result<CommandRegistry> {
    let classes = [
        commands::basic::class()?,
        commands::hierarchy::class()?,
        commands::interspersed::class()?,
        commands::multi::class()?,
        commands::noimpl::class()?,
        commands::pipeline::class()?,
        commands::prompted::class()?,
        upstream_with(plugins)?,
    ];

    let mut registry = CommandRegistry::new();
    for class in classes {
        let name = class.name().to_string();
        registry.register(name, APP, move || Box::new(TyperCommand::new(class.clone())));
    }
    registry.register("greet", APP, || Box::new(commands::legacy::Greet::new()));
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lists_every_command() {
        let registry = registry(&[]).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "basic",
                "greet",
                "hierarchy",
                "interspersed",
                "multi",
                "noimpl",
                "pipeline",
                "prompted",
                "upstream"
            ]
        );
        assert_eq!(registry.app_for("multi"), Some(APP));
    }

    #[test]
    fn test_unknown_plugin_is_rejected() {
        let err = upstream_with(&["plugin_three".to_string()]).unwrap_err();
        assert!(err.to_string().contains("plugin_three"));
    }
}
