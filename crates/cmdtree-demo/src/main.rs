use cmdtree::ManagementUtility;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let registry = cmdtree_demo::registry(&cmdtree_demo::plugins_from_env())?;
    let code = ManagementUtility::new(registry).execute(std::env::args());
    std::process::exit(code)
}
