//! Logging initialization
//!
//! The crate only emits `tracing` events; applications that want to see
//! them either install their own subscriber or call [`init`] once.
//!
//! Filtering comes from `PGMANAGER_LOG`, then `RUST_LOG`, then the
//! profile's default. Generated statements are logged at `debug` under
//! the `pgmanager` target, so `PGMANAGER_LOG=pgmanager=debug` shows them.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Output profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output, statements included
    Development,
    /// JSON lines at info level
    Production,
    /// Output captured by the test harness
    Test,
}

impl Profile {
    fn default_directive(&self) -> &'static str {
        match self {
            Profile::Development | Profile::Test => "pgmanager=debug",
            Profile::Production => "pgmanager=info",
        }
    }
}

static INIT_ONCE: Once = Once::new();

fn env_filter(profile: Profile) -> EnvFilter {
    EnvFilter::try_from_env("PGMANAGER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(profile.default_directive()))
}

/// Install a global subscriber for `profile`.
///
/// Only the first call has any effect. If the application already set a
/// global subscriber that one is kept.
///
/// # Example
///
/// ```
/// use pgmanager::logging::{init, Profile};
///
/// init(Profile::Development);
/// ```
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let filter = env_filter(profile);
        // try_init: an existing global subscriber wins
        let _ = match profile {
            Profile::Development => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .try_init(),
            Profile::Test => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_test_writer()
                .try_init(),
        };
    });
}
