use tracing::Level;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` does not say otherwise
    pub level: Level,
    /// Emit one JSON object per line
    pub json: bool,
    /// Include file and line information
    pub file_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: Level::INFO, json: false, file_info: false }
    }
}

/// Installs the global subscriber. actix-web's `log` records are picked up
/// through tracing-subscriber's log bridge.
pub fn setup_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    let builder = fmt()
        .with_env_filter(filter)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}
