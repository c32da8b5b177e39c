//! Ebbtide - BitTorrent metainfo parsing and tracker session core
//!
//! This crate provides the client-side building blocks below the peer wire
//! protocol: a Bencode codec, metainfo parsing with info-hash extraction,
//! the HTTP tracker announce/scrape protocol with tier-based failover, and
//! per-torrent session state (known peers, tracker statistics) kept in
//! pluggable key-value stores.

pub mod bencode;
pub mod config;
pub mod engine;
pub mod storage;
pub mod torrent;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::EbbtideConfig;
pub use engine::TorrentEngine;
pub use storage::{KeyValueStore, MemoryStore, SessionStores, StorageError};
pub use torrent::{InfoHash, TorrentError};

/// Core errors that can bubble up from any Ebbtide subsystem.
#[derive(Debug, thiserror::Error)]
pub enum EbbtideError {
    #[error("Torrent error: {0}")]
    Torrent(#[from] TorrentError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, EbbtideError>;
