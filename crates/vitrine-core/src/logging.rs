#![forbid(unsafe_code)]

//! Optional subscriber installation for hosts that do not bring their own.
//!
//! Library code only emits `tracing` events; nothing is printed unless a host
//! installs a subscriber. Native demo hosts and tests can call [`init`].
//!
//! The filter is read from `VITRINE_LOG`, then `RUST_LOG`, then `default`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Primary filter environment variable.
pub const LOG_ENV: &str = "VITRINE_LOG";

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line.
    #[cfg(feature = "log-json")]
    Json,
}

/// Build the env filter, falling back to `default` directives.
#[must_use]
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install a global subscriber. Fails if one is already set.
pub fn init(format: LogFormat, default: &str) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(default));
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        #[cfg(feature = "log-json")]
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directive_is_used_without_env() {
        // Only meaningful when neither variable is set in the test env.
        if std::env::var_os(LOG_ENV).is_none() && std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(env_filter("warn").to_string(), "warn");
        }
    }
}
