use safepost_core::config::{AppConfig, LogFormat};
use tracing::Level;

/// Installs the global subscriber. Later calls in the same process keep the
/// first subscriber.
pub fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt().with_target(false).with_max_level(log_level);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if installed.is_err() {
        tracing::debug!(
            event_name = "safepost.logging.already_initialized",
            "tracing subscriber already installed"
        );
    }
}
