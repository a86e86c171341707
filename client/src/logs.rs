use anyhow::Context;
use tracing::subscriber::set_global_default;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Install a global subscriber writing compact lines to stderr.
///
/// `RUST_LOG` wins over `default_filter` when set. Fails if a subscriber is
/// already installed.
pub fn init_logging(default_filter: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let stderr = fmt::Layer::new()
        .with_writer(std::io::stderr)
        .compact()
        .with_target(false);
    LogTracer::init().context("Failed to set logger")?;
    set_global_default(Registry::default().with(env_filter).with(stderr))
        .context("Failed to set subscriber")?;
    Ok(())
}
