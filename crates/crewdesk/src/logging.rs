//! Process-wide tracing subscriber setup.
//!
//! The library logs through the `log` facade; [`init`] forwards those
//! records into `tracing` so both end up in the same formatted output.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::CrewdeskError;

/// Installs the global subscriber, then bridges `log` records into it.
/// Fails if a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), CrewdeskError> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| CrewdeskError::Logging(format!("invalid filter '{}': {}", config.level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
    } else {
        tracing::subscriber::set_global_default(registry.with(fmt::layer()))
    };
    result.map_err(|e| CrewdeskError::Logging(e.to_string()))?;

    // Bridge `log` only once a subscriber is installed.
    tracing_log::LogTracer::init().map_err(|e| CrewdeskError::Logging(e.to_string()))?;

    log::debug!("Logging initialised at level '{}'", config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_invalid_filter_is_rejected_before_install() {
        let config = LoggingConfig {
            level: "crewdesk=loud".to_string(),
            json: false,
        };
        assert!(matches!(init(&config), Err(CrewdeskError::Logging(_))));
    }

    #[test]
    #[serial]
    fn test_init_installs_once() {
        let config = LoggingConfig::default();
        let first = init(&config);
        let second = init(&config);
        assert!(first.is_ok());
        assert!(second.is_err());

        // The subscriber went in before the log bridge, and both stayed.
        assert!(tracing::dispatcher::has_been_set());
        assert!(tracing::subscriber::set_global_default(tracing_subscriber::registry()).is_err());
        assert!(tracing_log::LogTracer::init().is_err());
    }
}
