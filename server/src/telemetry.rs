//! Tracing setup: a console layer for everything, plus the append-only error log when a
//! data directory is configured.

use crate::config::Config;
use joblib::ERROR_LOG_TARGET;
use std::path::Path;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Targets, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Install the global subscriber.
///
/// The returned guard flushes the error log on drop and must outlive the server.
pub fn init(cfg: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = match cfg.log_filter.parse::<EnvFilter>() {
        Ok(f) => f,
        Err(e) => {
            eprintln!(
                "WARN: log filter '{}' is not valid ({}); falling back to 'info'",
                cfg.log_filter, e
            );
            EnvFilter::new("info")
        }
    };
    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_filter(env_filter);

    let (error_log, guard) = match &cfg.error_log {
        Some(path) => {
            let (layer, guard) = error_log_layer(path)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(error_log)
        .try_init()?;
    Ok(guard)
}

/// Append events on [`ERROR_LOG_TARGET`] to `path`, one timestamped line each.
///
/// Events reach the file only while the returned guard is alive; dropping it flushes.
pub fn error_log_layer<S>(path: &Path) -> anyhow::Result<(impl Layer<S>, WorkerGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("error log {} has no parent", path.display()))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("error log {} has no file name", path.display()))?;
    std::fs::create_dir_all(dir)?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(writer)
        .with_filter(Targets::new().with_target(ERROR_LOG_TARGET, Level::WARN));
    Ok((layer, guard))
}
