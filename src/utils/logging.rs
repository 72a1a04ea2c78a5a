use std::{path::Path, sync::LazyLock};

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    EnvFilter,
};

pub const CLI_PREFIX: &str = "cli";
pub const WATCH_PREFIX: &str = "watch";

const LOG_DIR: &str = "logs";
const KEPT_LOG_FILES: usize = 5;
const DEFAULT_LEVEL: &str = "info";

/// How a command logs. Files always rotate daily under `<application dir>/logs`, prefixed by
/// the command kind so a long watch session does not mix with one shot commands.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub prefix: &'static str,
    pub level: Option<LevelFilter>,
    pub console: bool,
}

impl LogConfig {
    /// An explicit level wins over `RUST_LOG`. A bare level is scoped to this crate, while a
    /// value with its own directives (`usermetrics::store=trace`) is used as is.
    fn directives(&self, env: Option<&str>) -> String {
        if let Some(level) = self.level {
            return format!("{}={level}", crate_target());
        }
        match env.map(str::trim).filter(|v| !v.is_empty()) {
            Some(env) if env.contains('=') => env.to_string(),
            Some(level) => format!("{}={level}", crate_target()),
            None => format!("{}={DEFAULT_LEVEL}", crate_target()),
        }
    }
}

fn crate_target() -> String {
    env!("CARGO_PKG_NAME").replace('-', "_")
}

pub fn enable_logging(config: &LogConfig, application_data_path: &Path) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(config.prefix)
        .build(application_data_path.join(LOG_DIR))?;

    let console = config.console;
    let stderr = std::io::stderr.with_filter(move |_| console);

    let directives = config.directives(std::env::var("RUST_LOG").ok().as_deref());
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter {directives:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(stderr.and(appender))
        .pretty()
        .init();
    Ok(())
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .init()
});
