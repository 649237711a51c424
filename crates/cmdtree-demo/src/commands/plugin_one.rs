//! Extension module adding `grp1 plugin1` to `upstream`.

use cmdtree::{Callback, CommandClass, LookupError, Param};

pub fn install(upstream: &CommandClass) -> Result<(), LookupError> {
    upstream.group("grp1")?.command(
        Callback::function("plugin1", |args| {
            let count: i64 = args.get("count")?;
            Ok::<_, anyhow::Error>(format!("plugin_one:{}", count))
        })
        .doc("Added by plugin_one.")
        .param(Param::option("count").int().default(1)),
    );
    Ok(())
}
