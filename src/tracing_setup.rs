//! Tracing setup for Ebbtide
//!
//! Console-only subscriber initialization for applications embedding the
//! library. The `RUST_LOG` environment variable overrides the given level.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initialize console tracing at `console_level`.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - If a global subscriber is already installed
pub fn init_tracing(console_level: Level) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()?;

    Ok(())
}
