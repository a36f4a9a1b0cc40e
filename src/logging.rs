use crate::config::Config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing stack: stdout always, plus a daily-rolling file
/// when `--log-dir` is set. The returned guard must stay alive for the
/// process lifetime or buffered file output is lost.
pub fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);

    match &config.log_dir {
        Some(dir) => {
            let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
            let file_appender = tracing_appender::rolling::daily(dir, "loyaltyd.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_target(false)
                .with_writer(non_blocking)
                .with_ansi(false);
            registry.with(file_layer).with(stdout_layer).init();
            Some(guard)
        }
        None => {
            let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
            registry.with(stdout_layer).init();
            None
        }
    }
}
