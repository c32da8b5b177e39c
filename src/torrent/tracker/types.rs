//! Core types for tracker announce and scrape state.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::bencode::{Dictionary, Value};
use crate::torrent::InfoHash;

/// BitTorrent announce events.
///
/// Reported to the tracker so it can maintain swarm statistics. `Regular`
/// is the periodic re-announce, sent as an empty event string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceEvent {
    /// Client started downloading this torrent
    Started,
    /// Client stopped downloading this torrent
    Stopped,
    /// Client completed downloading this torrent
    Completed,
    /// Periodic re-announce with no state change
    Regular,
}

impl AnnounceEvent {
    /// Converts the event to its tracker protocol string.
    pub fn as_str(self) -> &'static str {
        match self {
            AnnounceEvent::Started => "started",
            AnnounceEvent::Stopped => "stopped",
            AnnounceEvent::Completed => "completed",
            AnnounceEvent::Regular => "",
        }
    }
}

/// Parameters sent with a tracker announce request.
#[derive(Debug, Clone)]
pub struct AnnounceParams {
    /// Torrent being announced
    pub info_hash: InfoHash,
    /// Client's 20-character peer ID
    pub peer_id: String,
    /// TCP port the client reports to the tracker
    pub port: u16,
    /// Total bytes uploaded to other peers
    pub uploaded: u64,
    /// Total bytes downloaded from other peers
    pub downloaded: u64,
    /// Bytes remaining to download (0 for seeders)
    pub left: u64,
    /// Current client state for this torrent
    pub event: AnnounceEvent,
}

impl AnnounceParams {
    /// Builds the announce query parameter list in protocol order.
    pub(crate) fn to_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("info_hash", self.info_hash.to_string()),
            ("peer_id", self.peer_id.clone()),
            ("port", self.port.to_string()),
            ("uploaded", self.uploaded.to_string()),
            ("downloaded", self.downloaded.to_string()),
            ("left", self.left.to_string()),
            ("compact", "1".to_string()),
            ("event", self.event.as_str().to_string()),
        ]
    }
}

/// Decoded tracker announce response.
#[derive(Debug, Clone)]
pub struct AnnounceResponse {
    /// Seconds until the next announce request should be sent
    pub interval: i64,
    /// Number of seeders in the swarm, when reported
    pub complete: Option<i64>,
    /// Number of leechers in the swarm, when reported
    pub incomplete: Option<i64>,
    /// Peers returned by the tracker
    pub peers: Vec<KnownPeer>,
}

/// A peer learned from a tracker.
///
/// Identity is the (ip, port) pair; `peer_id` is informational only and
/// never participates in deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownPeer {
    /// Dotted-quad IPv4 address
    pub ip: String,
    /// TCP port
    pub port: u16,
    /// Peer's self-reported ID, when the tracker relayed one
    pub peer_id: Option<String>,
}

impl KnownPeer {
    /// Creates a peer without a peer ID.
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
            peer_id: None,
        }
    }

    /// Numeric address for byte-wise ordering: "127.0.0.2" sorts before
    /// "127.0.0.100". Unparsable addresses sort last.
    pub(crate) fn numeric_ip(&self) -> u32 {
        self.ip.parse::<Ipv4Addr>().map(u32::from).unwrap_or(u32::MAX)
    }

    pub(crate) fn to_value(&self) -> Value {
        let mut dict = Dictionary::new();
        dict.insert("ip", Value::string(&self.ip));
        dict.insert("port", Value::Integer(i64::from(self.port)));
        if let Some(peer_id) = &self.peer_id {
            dict.insert("peerId", Value::string(peer_id));
        }
        Value::Dict(dict)
    }

    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let ip = value.get("ip")?.as_str()?.to_string();
        let port = u16::try_from(value.get("port")?.as_integer()?).ok()?;
        let peer_id = value
            .get("peerId")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        Some(Self { ip, port, peer_id })
    }
}

/// Last-seen statistics from a single tracker.
///
/// A tracker either returned usable numbers (possibly with a swarm name) or
/// failed with a reason; the two cases never mix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeData {
    /// Statistics from a successful announce or scrape
    Scrape {
        /// Number of seeders
        complete: i64,
        /// Total completed downloads
        downloaded: i64,
        /// Number of leechers
        incomplete: i64,
        /// Tracker-reported torrent name, when known
        name: Option<String>,
    },
    /// The last contact with this tracker failed
    Failure {
        /// Failure reason, "Connection failed" for transport errors
        reason: String,
    },
}

impl ScrapeData {
    /// Returns the stored name, if the last contact succeeded and carried one.
    pub(crate) fn stored_name(&self) -> Option<&str> {
        match self {
            ScrapeData::Scrape { name, .. } => name.as_deref(),
            ScrapeData::Failure { .. } => None,
        }
    }

    /// Returns the stored downloaded counter, defaulting to 0.
    pub(crate) fn stored_downloaded(&self) -> i64 {
        match self {
            ScrapeData::Scrape { downloaded, .. } => *downloaded,
            ScrapeData::Failure { .. } => 0,
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        let mut dict = Dictionary::new();
        match self {
            ScrapeData::Scrape {
                complete,
                downloaded,
                incomplete,
                name,
            } => {
                dict.insert("complete", Value::Integer(*complete));
                dict.insert("downloaded", Value::Integer(*downloaded));
                dict.insert("incomplete", Value::Integer(*incomplete));
                if let Some(name) = name {
                    dict.insert("name", Value::string(name));
                }
            }
            ScrapeData::Failure { reason } => {
                dict.insert("failure reason", Value::string(reason));
            }
        }
        Value::Dict(dict)
    }

    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        value.as_dict()?;
        if let Some(reason) = value.get("failure reason").and_then(Value::as_str) {
            return Some(ScrapeData::Failure {
                reason: reason.to_string(),
            });
        }
        Some(ScrapeData::Scrape {
            complete: value.get("complete").and_then(Value::as_integer).unwrap_or(0),
            downloaded: value
                .get("downloaded")
                .and_then(Value::as_integer)
                .unwrap_or(0),
            incomplete: value
                .get("incomplete")
                .and_then(Value::as_integer)
                .unwrap_or(0),
            name: value
                .get("name")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
        })
    }
}

/// Per-torrent statistics map keyed by tracker URL.
///
/// URLs are stored exactly as they appear in the announce tiers. Entry
/// order follows first observation, keeping the serialized record stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    entries: Vec<(String, ScrapeData)>,
}

impl TrackerStats {
    /// Creates an empty statistics map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the statistics for a tracker URL, if any were recorded.
    pub fn get(&self, url: &str) -> Option<&ScrapeData> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == url)
            .map(|(_, data)| data)
    }

    /// Records the statistics for a tracker URL, replacing any prior entry.
    pub fn set(&mut self, url: &str, data: ScrapeData) {
        match self.entries.iter_mut().find(|(existing, _)| existing == url) {
            Some((_, slot)) => *slot = data,
            None => self.entries.push((url.to_string(), data)),
        }
    }

    /// Iterates entries in first-observation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScrapeData)> {
        self.entries.iter().map(|(url, data)| (url.as_str(), data))
    }

    /// Returns the number of trackers with recorded statistics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether no statistics have been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the map into a plain `HashMap`.
    pub fn into_map(self) -> HashMap<String, ScrapeData> {
        self.entries.into_iter().collect()
    }

    pub(crate) fn to_value(&self) -> Value {
        let mut dict = Dictionary::new();
        for (url, data) in &self.entries {
            dict.insert(url.clone(), data.to_value());
        }
        Value::Dict(dict)
    }

    pub(crate) fn from_value(value: &Value) -> Self {
        let mut stats = Self::new();
        let Some(dict) = value.as_dict() else {
            return stats;
        };
        for (url, entry) in dict.iter() {
            if let Some(data) = ScrapeData::from_value(entry) {
                stats.set(url, data);
            }
        }
        stats
    }
}
