//! BitTorrent tracker communication.
//!
//! HTTP announce/scrape over tier-based tracker lists following BEP 3 and
//! BEP 12: ordered failover across tiers, most-recently-successful
//! reordering within a tier, and compact or dictionary-form peer lists.

pub mod client;
pub mod simulated;
pub mod transport;
pub mod types;

// Re-export public API
pub use client::Tracker;
pub use simulated::SimulatedTransport;
pub use transport::{HttpTransport, Transport, TransportError};
pub use types::{
    AnnounceEvent, AnnounceParams, AnnounceResponse, KnownPeer, ScrapeData, TrackerStats,
};
