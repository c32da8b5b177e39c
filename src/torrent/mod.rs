//! Torrent metainfo handling, client identity, and tracker protocol.

pub mod identity;
pub mod metainfo;
pub mod tracker;

use std::fmt;

pub use identity::ClientIdentity;
pub use metainfo::Metainfo;
pub use tracker::{
    AnnounceEvent, AnnounceParams, AnnounceResponse, HttpTransport, KnownPeer, ScrapeData,
    SimulatedTransport, Tracker, TrackerStats, Transport, TransportError,
};

use crate::storage::StorageError;

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the raw bytes of the info dictionary from a
/// torrent file. Displayed as 40 lowercase hex characters, which is also
/// the key format used by the session stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses a 40-character hex representation.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidInfoHash` - If the input is not 40 hex characters
    pub fn from_hex(value: &str) -> Result<Self, TorrentError> {
        let invalid = || TorrentError::InvalidInfoHash {
            value: value.to_string(),
        };
        let decoded = hex::decode(value).map_err(|_| invalid())?;
        let hash: [u8; 20] = decoded.try_into().map_err(|_| invalid())?;
        Ok(Self(hash))
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Errors that can occur during torrent session operations.
#[derive(Debug, thiserror::Error)]
pub enum TorrentError {
    #[error("Invalid metainfo file: {reason}")]
    InvalidMetainfo { reason: String },

    #[error("Invalid info hash: {value}")]
    InvalidInfoHash { value: String },

    #[error("Torrent {info_hash} is already loaded")]
    AlreadyLoaded { info_hash: InfoHash },

    #[error("Torrent {info_hash} is not loaded")]
    NotLoaded { info_hash: InfoHash },

    #[error("All trackers failed: {reason}")]
    ExhaustedTrackers { reason: String },

    #[error("Storage error")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_hash_display() {
        let hash = [
            0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef, 0x01, 0x23, 0x45, 0x67,
        ];
        let info_hash = InfoHash::new(hash);
        assert_eq!(
            info_hash.to_string(),
            "0123456789abcdef0123456789abcdef01234567"
        );
    }

    #[test]
    fn test_info_hash_from_hex_roundtrip() {
        let info_hash = InfoHash::new([0xAB; 20]);
        let parsed = InfoHash::from_hex(&info_hash.to_string()).unwrap();
        assert_eq!(parsed, info_hash);
    }

    #[test]
    fn test_info_hash_from_hex_rejects_bad_input() {
        assert!(InfoHash::from_hex("not-hex").is_err());
        assert!(InfoHash::from_hex("abcd").is_err());
    }
}
