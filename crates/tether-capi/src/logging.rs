//! Opt-in diagnostics for C hosts.

use std::sync::OnceLock;

use tether_core::LoggingConfig;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::error::{set_last_error, LibdatabaseStatus};

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LoggingConfig::ENV_FILTER_VAR)
        .unwrap_or_else(|_| EnvFilter::new(LoggingConfig::DEFAULT_FILTER))
}

/// Install a stderr subscriber filtered by `TETHER_LOG` (default `warn`).
///
/// Safe to call more than once; later calls report the first outcome.
/// Returns `INTERNAL` if the host already installed a global subscriber.
#[no_mangle]
pub extern "C" fn libdatabase_init_logging() -> LibdatabaseStatus {
    let outcome = INIT.get_or_init(|| {
        FmtSubscriber::builder()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .try_init()
            .map_err(|e| e.to_string())
    });
    match outcome {
        Ok(()) => LibdatabaseStatus::Ok,
        Err(message) => {
            set_last_error(&format!("Failed to initialise logging: {}", message));
            LibdatabaseStatus::Internal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let first = libdatabase_init_logging();
        assert_eq!(libdatabase_init_logging(), first);
    }
}
