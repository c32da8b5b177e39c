//! Tier-based tracker failover: the announce and scrape engines.

use std::sync::Arc;

use super::transport::Transport;
use super::types::{AnnounceParams, AnnounceResponse, KnownPeer, ScrapeData, TrackerStats};
use crate::bencode::{self, Value};
use crate::torrent::{InfoHash, Metainfo, TorrentError};

const CONNECTION_FAILED: &str = "Connection failed";
const EMPTY_ANNOUNCE_LIST: &str = "Empty announce list";

/// Announce/scrape engine over tier-based tracker lists.
///
/// Tiers are tried in order and trackers within a tier in their current
/// order; the first tracker that returns a usable response wins and is
/// moved to the front of its tier (BEP 12). Every attempted tracker leaves
/// a statistics entry behind, success or failure.
pub struct Tracker {
    transport: Arc<dyn Transport>,
}

impl Tracker {
    /// Creates an engine over the given transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Announces to the first responsive tracker in the tier list.
    ///
    /// On success the winning tracker is promoted to the front of its tier
    /// and its statistics entry is refreshed: `complete`/`incomplete` come
    /// from the response, `downloaded` and `name` are carried over from
    /// history (announce responses do not report them).
    ///
    /// # Errors
    ///
    /// - `TorrentError::ExhaustedTrackers` - If every tracker in every tier
    ///   failed; the message is the last recorded failure reason
    pub async fn announce(
        &self,
        metainfo: &mut Metainfo,
        params: &AnnounceParams,
        stats: &mut TrackerStats,
    ) -> Result<AnnounceResponse, TorrentError> {
        let query = params.to_query();
        let mut last_failure = EMPTY_ANNOUNCE_LIST.to_string();

        for tier_index in 0..metainfo.announce_list().len() {
            // Iterate a stable snapshot; the winner reorders the live tier
            let tier = metainfo.announce_list()[tier_index].clone();
            for url in &tier {
                match self.try_announce(url, &query).await {
                    Ok(response) => {
                        tracing::debug!(
                            "tracker {url} answered with {} peers, interval {}",
                            response.peers.len(),
                            response.interval
                        );
                        metainfo.promote_tracker(tier_index, url);
                        let merged = merge_announce(
                            stats.get(url),
                            response.complete.unwrap_or(0),
                            response.incomplete.unwrap_or(0),
                        );
                        stats.set(url, merged);
                        return Ok(response);
                    }
                    Err(reason) => {
                        tracing::warn!("tracker {url} failed: {reason}");
                        stats.set(url, ScrapeData::Failure {
                            reason: reason.clone(),
                        });
                        last_failure = reason;
                    }
                }
            }
        }

        Err(TorrentError::ExhaustedTrackers {
            reason: last_failure,
        })
    }

    /// Attempts one tracker; the error is the failure reason to record.
    async fn try_announce(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<AnnounceResponse, String> {
        let body = self
            .transport
            .get(url, query)
            .await
            .map_err(|_| CONNECTION_FAILED.to_string())?;

        let Ok(Value::Dict(dict)) = bencode::decode(&body) else {
            return Err(CONNECTION_FAILED.to_string());
        };
        if let Some(reason) = dict.get("failure reason").and_then(Value::as_str) {
            return Err(reason.to_string());
        }
        let Some(peers) = dict.get("peers").and_then(decode_peers) else {
            return Err(CONNECTION_FAILED.to_string());
        };
        let Some(interval) = dict.get("interval").and_then(Value::as_integer) else {
            return Err(CONNECTION_FAILED.to_string());
        };

        Ok(AnnounceResponse {
            interval,
            complete: dict.get("complete").and_then(Value::as_integer),
            incomplete: dict.get("incomplete").and_then(Value::as_integer),
            peers,
        })
    }

    /// Scrapes every tracker across all tiers and merges the statistics.
    ///
    /// Trackers whose announce URL does not end in an `announce` path
    /// segment are skipped entirely (their statistics are left untouched).
    pub async fn scrape_all(
        &self,
        metainfo: &Metainfo,
        info_hash: &InfoHash,
        stats: &mut TrackerStats,
    ) {
        let info_hash_hex = info_hash.to_string();
        let query = [("info_hash", info_hash_hex.clone())];

        for tier in metainfo.announce_list() {
            for url in tier {
                let Some(scrape_url) = derive_scrape_url(url) else {
                    tracing::debug!("tracker {url} has no derivable scrape URL, skipping");
                    continue;
                };
                let new_data = match self.transport.get(&scrape_url, &query).await {
                    Ok(body) => interpret_scrape_body(&body, &info_hash_hex),
                    Err(e) => {
                        tracing::warn!("scrape of {scrape_url} failed: {e}");
                        connection_failed()
                    }
                };
                stats.set(url, merge_scrape(stats.get(url), new_data));
            }
        }
    }
}

fn connection_failed() -> ScrapeData {
    ScrapeData::Failure {
        reason: CONNECTION_FAILED.to_string(),
    }
}

/// Builds the refreshed announce statistics for a winning tracker.
fn merge_announce(prior: Option<&ScrapeData>, complete: i64, incomplete: i64) -> ScrapeData {
    ScrapeData::Scrape {
        complete,
        downloaded: prior.map(|data| data.stored_downloaded()).unwrap_or(0),
        incomplete,
        name: prior
            .and_then(|data| data.stored_name())
            .map(ToOwned::to_owned),
    }
}

/// Applies the scrape merge rule: counters always come from the new
/// response; only a missing `name` is carried forward.
fn merge_scrape(prior: Option<&ScrapeData>, new_data: ScrapeData) -> ScrapeData {
    match new_data {
        ScrapeData::Scrape {
            complete,
            downloaded,
            incomplete,
            name: None,
        } => ScrapeData::Scrape {
            complete,
            downloaded,
            incomplete,
            name: prior
                .and_then(|data| data.stored_name())
                .map(ToOwned::to_owned),
        },
        other => other,
    }
}

/// Interprets a scrape response body for one torrent.
fn interpret_scrape_body(body: &[u8], info_hash_hex: &str) -> ScrapeData {
    if body.is_empty() {
        return connection_failed();
    }
    let Ok(Value::Dict(dict)) = bencode::decode(body) else {
        return connection_failed();
    };
    if let Some(reason) = dict.get("failure reason").and_then(Value::as_str) {
        return ScrapeData::Failure {
            reason: reason.to_string(),
        };
    }
    let Some(entry) = dict.get("files").and_then(|files| files.get(info_hash_hex)) else {
        return connection_failed();
    };
    if entry.as_dict().is_none() {
        return connection_failed();
    }
    ScrapeData::Scrape {
        complete: entry.get("complete").and_then(Value::as_integer).unwrap_or(0),
        downloaded: entry
            .get("downloaded")
            .and_then(Value::as_integer)
            .unwrap_or(0),
        incomplete: entry
            .get("incomplete")
            .and_then(Value::as_integer)
            .unwrap_or(0),
        name: entry
            .get("name")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
    }
}

/// Derives the scrape URL when the last path segment is exactly `announce`.
fn derive_scrape_url(announce_url: &str) -> Option<String> {
    let (base, last_segment) = announce_url.rsplit_once('/')?;
    (last_segment == "announce").then(|| format!("{base}/scrape"))
}

/// Normalizes a tracker's polymorphic `peers` field.
///
/// Compact form is a byte string of consecutive 6-byte records (4-byte
/// big-endian IPv4 address, 2-byte big-endian port); the alternative is a
/// list of per-peer dictionaries.
fn decode_peers(value: &Value) -> Option<Vec<KnownPeer>> {
    match value {
        Value::Bytes(blob) => decode_compact_peers(blob),
        Value::List(entries) => decode_listed_peers(entries),
        _ => None,
    }
}

fn decode_compact_peers(blob: &[u8]) -> Option<Vec<KnownPeer>> {
    if !blob.len().is_multiple_of(6) {
        return None;
    }
    let mut peers = Vec::with_capacity(blob.len() / 6);
    for record in blob.chunks(6) {
        let ip = format!("{}.{}.{}.{}", record[0], record[1], record[2], record[3]);
        let port = u16::from_be_bytes([record[4], record[5]]);
        peers.push(KnownPeer::new(ip, port));
    }
    Some(peers)
}

fn decode_listed_peers(entries: &[Value]) -> Option<Vec<KnownPeer>> {
    let mut peers = Vec::with_capacity(entries.len());
    for entry in entries {
        let ip = entry.get("ip")?.as_str()?.to_string();
        let port = u16::try_from(entry.get("port")?.as_integer()?).ok()?;
        let peer_id = entry
            .get("peer id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        peers.push(KnownPeer { ip, port, peer_id });
    }
    Some(peers)
}
