use anyhow::Context as _;

const DEFAULT_FILTER: &str = "info";

/// Progress and skip reasons go to stderr so stdout stays free for the URL
/// prompt and the final output location.
pub fn init() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    tracing::debug!(default = DEFAULT_FILTER, "logging initialized");
    Ok(())
}
