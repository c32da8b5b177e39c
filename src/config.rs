//! Centralized configuration for Ebbtide.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

/// Central configuration for all Ebbtide components.
///
/// Groups related configuration settings into logical sections.
#[derive(Debug, Clone, Default)]
pub struct EbbtideConfig {
    pub network: NetworkConfig,
    pub identity: IdentityConfig,
}

/// Network communication and tracker configuration.
///
/// Controls HTTP timeouts and the parameters reported to trackers.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// HTTP request timeout for tracker communication
    pub tracker_timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: &'static str,
    /// TCP port reported to trackers in announce requests
    pub listen_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tracker_timeout: Duration::from_secs(30),
            user_agent: "ebbtide/0.1.0",
            listen_port: 6881,
        }
    }
}

/// Client identity configuration.
///
/// Controls the Azureus-style peer ID reported to trackers.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Client identifier prefix, eight characters
    pub client_prefix: &'static str,
    /// Seed hashed into the fixed portion of the peer ID
    pub identity_seed: &'static str,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            client_prefix: "-CS1000-",
            identity_seed: "ebbtide-identity-0001",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_network_config() {
        let config = NetworkConfig::default();
        assert_eq!(config.listen_port, 6881);
        assert_eq!(config.tracker_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_default_identity_prefix_length() {
        let config = IdentityConfig::default();
        assert_eq!(config.client_prefix.len(), 8);
    }
}
