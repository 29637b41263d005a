use anyhow::Result;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    let log_file = match &config.file_path {
        Some(file_path) => Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?,
        ),
        None => None,
    };

    match (config.format.as_str(), log_file) {
        ("json", Some(file)) => {
            let fmt_layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(file);
            registry.with(fmt_layer).try_init()?;
        }
        ("json", None) => {
            let fmt_layer = fmt::layer().json().with_span_events(FmtSpan::CLOSE);
            registry.with(fmt_layer).try_init()?;
        }
        (_, Some(file)) => {
            let fmt_layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(file);
            registry.with(fmt_layer).try_init()?;
        }
        (_, None) => {
            registry.with(fmt::layer().with_target(true)).try_init()?;
        }
    }

    tracing::info!(level = %config.level, format = %config.format, "Logging initialized");
    Ok(())
}
