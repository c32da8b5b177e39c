//! Client identity and peer-id generation.

use rand::Rng;
use rand::distr::Alphanumeric;
use sha1::{Digest, Sha1};

use crate::config::IdentityConfig;

const SUFFIX_LEN: usize = 6;
const SEED_HEX_LEN: usize = 6;

/// The peer identity reported to trackers.
///
/// The peer ID is an Azureus-style 20-character string: an 8-character
/// client prefix, the first 6 hex characters of the SHA-1 of the identity
/// seed, and a 6-character random alphanumeric suffix chosen once when the
/// identity is constructed.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    peer_id: String,
}

impl ClientIdentity {
    /// Creates an identity with a fresh random suffix.
    pub fn new(config: &IdentityConfig) -> Self {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self::with_suffix(config, &suffix)
    }

    /// Creates an identity with a caller-chosen suffix, for deterministic use.
    pub fn with_suffix(config: &IdentityConfig, suffix: &str) -> Self {
        let digest = Sha1::digest(config.identity_seed.as_bytes());
        let seed_hex = hex::encode(digest);
        let peer_id = format!(
            "{}{}{}",
            config.client_prefix,
            &seed_hex[..SEED_HEX_LEN],
            suffix
        );
        Self { peer_id }
    }

    /// Returns the peer ID string.
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }
}
