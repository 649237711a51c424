//! Extension module adding `grp1 plugin2` and overriding `cmd1` on
//! `upstream`.

use cmdtree::{Callback, CommandClass, LookupError};

pub fn install(upstream: &CommandClass) -> Result<(), LookupError> {
    upstream
        .group("grp1")?
        .command(Callback::method("plugin2", |cmd, _args| {
            Ok::<_, anyhow::Error>(format!("plugin_two:{}", cmd.name()))
        }));
    upstream.root().command(
        Callback::function("cmd1", |_args| Ok::<_, anyhow::Error>("plugin_two:cmd1"))
            .doc("Replaced by plugin_two."),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{plugin_one, upstream};
    use cmdtree::{CallArgs, TyperCommand};
    use serde_json::json;

    #[test]
    fn test_both_extensions_coexist() {
        let class = upstream::class().unwrap();
        plugin_one::install(&class).unwrap();
        install(&class).unwrap();

        let cmd = TyperCommand::new(class.clone());
        let one = cmd.get_command(&["grp1", "plugin1"]).unwrap();
        assert_eq!(one.call(CallArgs::new().kw("count", 3)).unwrap(), json!("plugin_one:3"));
        let two = cmd.get_command(&["grp1", "plugin2"]).unwrap();
        assert_eq!(two.call(CallArgs::new()).unwrap(), json!("plugin_two:upstream"));
        let sub = cmd.get_command(&["grp1", "sub1"]).unwrap();
        assert_eq!(sub.call(CallArgs::new().arg("x")).unwrap(), json!("upstream:sub1 x"));

        let root = cmd.get_command(&["cmd1"]).unwrap();
        assert_eq!(root.call(CallArgs::new()).unwrap(), json!("plugin_two:cmd1"));
        assert_eq!(class.root().commands().len(), 1);
    }

    #[test]
    fn test_installing_twice_does_not_duplicate() {
        let class = upstream::class().unwrap();
        install(&class).unwrap();
        install(&class).unwrap();
        assert_eq!(class.group("grp1").unwrap().commands().len(), 2);
    }
}
