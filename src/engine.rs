//! Torrent session engine.
//!
//! Facade tying the metainfo parser, the tracker engines, and the session
//! stores together. Each operation is a single explicit call that performs
//! its store writes inline; concurrent calls against the same torrent are
//! not coordinated here and callers needing that must serialize externally.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bencode::{self, Value};
use crate::config::EbbtideConfig;
use crate::storage::{KeyValueStore, SessionStores, StorageError};
use crate::torrent::tracker::{
    AnnounceEvent, AnnounceParams, HttpTransport, KnownPeer, ScrapeData, Tracker, TrackerStats,
    Transport,
};
use crate::torrent::{ClientIdentity, InfoHash, Metainfo, TorrentError};

/// Per-process torrent session manager.
///
/// Torrents are loaded from metainfo bytes and identified by info-hash
/// afterwards. Loading creates one record in each session namespace;
/// unloading removes all three. A failure partway through leaves partial
/// state behind (the stores offer no cross-namespace transaction).
pub struct TorrentEngine {
    config: EbbtideConfig,
    stores: SessionStores,
    tracker: Tracker,
    identity: ClientIdentity,
}

impl TorrentEngine {
    /// Creates an engine over the given stores and transport.
    pub fn new(config: EbbtideConfig, stores: SessionStores, transport: Arc<dyn Transport>) -> Self {
        let identity = ClientIdentity::new(&config.identity);
        Self {
            config,
            stores,
            tracker: Tracker::new(transport),
            identity,
        }
    }

    /// Creates an engine with in-memory stores and a real HTTP transport.
    pub fn in_memory(config: EbbtideConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(&config.network));
        Self::new(config, SessionStores::in_memory(), transport)
    }

    /// Returns the peer ID this engine reports to trackers.
    pub fn peer_id(&self) -> &str {
        self.identity.peer_id()
    }

    /// Loads a torrent from metainfo bytes.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidMetainfo` - If the bytes are not a valid metainfo file
    /// - `TorrentError::AlreadyLoaded` - If the same info-hash is already loaded
    pub async fn load(&self, torrent: &[u8]) -> Result<InfoHash, TorrentError> {
        let metainfo = Metainfo::parse(torrent)?;
        let info_hash = metainfo.info_hash();
        let key = info_hash.to_string();
        tracing::info!("loading torrent {info_hash}");

        match self.stores.torrents.create(&key, metainfo.to_bytes()).await {
            Ok(()) => {}
            Err(StorageError::AlreadyExists { .. }) => {
                return Err(TorrentError::AlreadyLoaded { info_hash });
            }
            Err(e) => return Err(e.into()),
        }
        self.stores
            .peers
            .create(&key, Value::List(Vec::new()).encode())
            .await?;
        self.stores
            .stats
            .create(&key, TrackerStats::new().to_value().encode())
            .await?;

        Ok(info_hash)
    }

    /// Unloads a torrent, removing its records from all three namespaces.
    ///
    /// # Errors
    ///
    /// - `TorrentError::NotLoaded` - If the info-hash is not loaded
    pub async fn unload(&self, info_hash: &InfoHash) -> Result<(), TorrentError> {
        let key = info_hash.to_string();
        tracing::info!("unloading torrent {info_hash}");
        for store in [&self.stores.torrents, &self.stores.peers, &self.stores.stats] {
            match store.delete(&key).await {
                Ok(()) => {}
                Err(StorageError::NotFound { .. }) => {
                    return Err(TorrentError::NotLoaded {
                        info_hash: *info_hash,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Returns the announce tiers in their current order.
    ///
    /// # Errors
    ///
    /// - `TorrentError::NotLoaded` - If the info-hash is not loaded
    pub async fn announces(&self, info_hash: &InfoHash) -> Result<Vec<Vec<String>>, TorrentError> {
        Ok(self.read_metainfo(info_hash).await?.announce_list().to_vec())
    }

    /// Announces to the torrent's trackers and updates session state.
    ///
    /// A `Started` event shuffles each tier before tracker selection; the
    /// shuffled order is persisted even if every tracker then fails. The
    /// winning tracker moves to the front of its tier and the peers it
    /// returned are merged into the known-peer set. Returns the tracker's
    /// re-announce interval in seconds.
    ///
    /// # Errors
    ///
    /// - `TorrentError::NotLoaded` - If the info-hash is not loaded
    /// - `TorrentError::ExhaustedTrackers` - If every tracker failed
    pub async fn announce(
        &self,
        info_hash: &InfoHash,
        event: AnnounceEvent,
        uploaded: u64,
        downloaded: u64,
        left: u64,
    ) -> Result<i64, TorrentError> {
        let mut metainfo = self.read_metainfo(info_hash).await?;
        let mut stats = self.read_stats(info_hash).await?;
        let key = info_hash.to_string();

        if event == AnnounceEvent::Started {
            metainfo.shuffle_tiers();
            self.stores.torrents.update(&key, metainfo.to_bytes()).await?;
        }

        let params = AnnounceParams {
            info_hash: *info_hash,
            peer_id: self.identity.peer_id().to_string(),
            port: self.config.network.listen_port,
            uploaded,
            downloaded,
            left,
            event,
        };

        let outcome = self.tracker.announce(&mut metainfo, &params, &mut stats).await;
        // Attempted trackers keep their failure entries even on exhaustion
        self.stores
            .stats
            .update(&key, stats.to_value().encode())
            .await?;
        let response = outcome?;

        self.stores.torrents.update(&key, metainfo.to_bytes()).await?;
        self.merge_peers(info_hash, &response.peers).await?;
        Ok(response.interval)
    }

    /// Scrapes every tracker of the torrent and stores the merged statistics.
    ///
    /// # Errors
    ///
    /// - `TorrentError::NotLoaded` - If the info-hash is not loaded
    pub async fn scrape(&self, info_hash: &InfoHash) -> Result<(), TorrentError> {
        let metainfo = self.read_metainfo(info_hash).await?;
        let mut stats = self.read_stats(info_hash).await?;
        self.tracker
            .scrape_all(&metainfo, info_hash, &mut stats)
            .await;
        self.stores
            .stats
            .update(&info_hash.to_string(), stats.to_value().encode())
            .await?;
        Ok(())
    }

    /// Forgets a previously known peer.
    ///
    /// Removes exactly the entry matching `peer`'s (ip, port); invalidating
    /// a peer that was never seen is a no-op.
    ///
    /// # Errors
    ///
    /// - `TorrentError::NotLoaded` - If the info-hash is not loaded
    pub async fn invalidate_peer(
        &self,
        info_hash: &InfoHash,
        peer: &KnownPeer,
    ) -> Result<(), TorrentError> {
        let mut peers = self.read_peers(info_hash).await?;
        peers.retain(|known| !(known.ip == peer.ip && known.port == peer.port));
        self.write_peers(info_hash, &peers).await
    }

    /// Returns all known peers, sorted by numeric IP address ascending.
    ///
    /// # Errors
    ///
    /// - `TorrentError::NotLoaded` - If the info-hash is not loaded
    pub async fn known_peers(&self, info_hash: &InfoHash) -> Result<Vec<KnownPeer>, TorrentError> {
        let mut peers = self.read_peers(info_hash).await?;
        peers.sort_by_key(|peer| (peer.numeric_ip(), peer.port));
        Ok(peers)
    }

    /// Returns the last-seen statistics per tracker URL.
    ///
    /// Trackers that never answered any announce or scrape have no entry.
    ///
    /// # Errors
    ///
    /// - `TorrentError::NotLoaded` - If the info-hash is not loaded
    pub async fn tracker_stats(
        &self,
        info_hash: &InfoHash,
    ) -> Result<HashMap<String, ScrapeData>, TorrentError> {
        Ok(self.read_stats(info_hash).await?.into_map())
    }

    async fn read_record(
        &self,
        store: &Arc<dyn KeyValueStore>,
        info_hash: &InfoHash,
    ) -> Result<Vec<u8>, TorrentError> {
        match store.read(&info_hash.to_string()).await {
            Ok(bytes) => Ok(bytes),
            Err(StorageError::NotFound { .. }) => Err(TorrentError::NotLoaded {
                info_hash: *info_hash,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_metainfo(&self, info_hash: &InfoHash) -> Result<Metainfo, TorrentError> {
        let bytes = self.read_record(&self.stores.torrents, info_hash).await?;
        Metainfo::parse(&bytes)
    }

    async fn read_stats(&self, info_hash: &InfoHash) -> Result<TrackerStats, TorrentError> {
        let bytes = self.read_record(&self.stores.stats, info_hash).await?;
        let value = bencode::decode(&bytes).map_err(|e| StorageError::Backend {
            reason: format!("corrupt statistics record: {e}"),
        })?;
        Ok(TrackerStats::from_value(&value))
    }

    async fn read_peers(&self, info_hash: &InfoHash) -> Result<Vec<KnownPeer>, TorrentError> {
        let bytes = self.read_record(&self.stores.peers, info_hash).await?;
        let value = bencode::decode(&bytes).map_err(|e| StorageError::Backend {
            reason: format!("corrupt peer record: {e}"),
        })?;
        let entries = value.as_list().unwrap_or(&[]);
        Ok(entries.iter().filter_map(KnownPeer::from_value).collect())
    }

    async fn write_peers(
        &self,
        info_hash: &InfoHash,
        peers: &[KnownPeer],
    ) -> Result<(), TorrentError> {
        let value = Value::List(peers.iter().map(KnownPeer::to_value).collect());
        self.stores
            .peers
            .update(&info_hash.to_string(), value.encode())
            .await?;
        Ok(())
    }

    /// Merges freshly announced peers into the stored set, deduplicating by
    /// (ip, port). A newly reported peer ID refreshes the stored one.
    async fn merge_peers(
        &self,
        info_hash: &InfoHash,
        new_peers: &[KnownPeer],
    ) -> Result<(), TorrentError> {
        if new_peers.is_empty() {
            return Ok(());
        }
        let mut peers = self.read_peers(info_hash).await?;
        for incoming in new_peers {
            match peers
                .iter_mut()
                .find(|known| known.ip == incoming.ip && known.port == incoming.port)
            {
                Some(existing) => {
                    if incoming.peer_id.is_some() {
                        existing.peer_id = incoming.peer_id.clone();
                    }
                }
                None => peers.push(incoming.clone()),
            }
        }
        self.write_peers(info_hash, &peers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::Dictionary;
    use crate::torrent::tracker::SimulatedTransport;

    fn fixture_engine() -> (TorrentEngine, Arc<SimulatedTransport>) {
        let transport = Arc::new(SimulatedTransport::new());
        let engine = TorrentEngine::new(
            EbbtideConfig::default(),
            SessionStores::in_memory(),
            Arc::clone(&transport) as Arc<dyn Transport>,
        );
        (engine, transport)
    }

    fn torrent_bytes(announce: &str) -> Vec<u8> {
        let mut info = Dictionary::new();
        info.insert("length", Value::Integer(4096));
        info.insert("name", Value::string("fixture.bin"));
        info.insert("piece length", Value::Integer(2048));
        info.insert("pieces", Value::Bytes(vec![0x03; 40]));
        let mut root = Dictionary::new();
        root.insert("announce", Value::string(announce));
        root.insert("info", Value::Dict(info));
        Value::Dict(root).encode()
    }

    fn announce_body(interval: i64, peer_blob: Vec<u8>) -> Vec<u8> {
        let mut dict = Dictionary::new();
        dict.insert("interval", Value::Integer(interval));
        dict.insert("complete", Value::Integer(4));
        dict.insert("incomplete", Value::Integer(2));
        dict.insert("peers", Value::Bytes(peer_blob));
        Value::Dict(dict).encode()
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_metainfo() {
        let (engine, _) = fixture_engine();
        assert!(matches!(
            engine.load(b"garbage").await,
            Err(TorrentError::InvalidMetainfo { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_load_fails_with_same_hash() {
        let (engine, _) = fixture_engine();
        let bytes = torrent_bytes("http://t/announce");

        let info_hash = engine.load(&bytes).await.unwrap();
        let result = engine.load(&bytes).await;
        assert!(matches!(
            result,
            Err(TorrentError::AlreadyLoaded { info_hash: duplicate }) if duplicate == info_hash
        ));
    }

    #[tokio::test]
    async fn test_unload_then_queries_fail() {
        let (engine, _) = fixture_engine();
        let info_hash = engine.load(&torrent_bytes("http://t/announce")).await.unwrap();

        engine.unload(&info_hash).await.unwrap();
        assert!(matches!(
            engine.unload(&info_hash).await,
            Err(TorrentError::NotLoaded { .. })
        ));
        assert!(matches!(
            engine.announces(&info_hash).await,
            Err(TorrentError::NotLoaded { .. })
        ));
        assert!(matches!(
            engine.known_peers(&info_hash).await,
            Err(TorrentError::NotLoaded { .. })
        ));

        // The same torrent can be loaded again after unloading
        engine.load(&torrent_bytes("http://t/announce")).await.unwrap();
    }

    #[tokio::test]
    async fn test_single_announce_becomes_one_tier() {
        let (engine, _) = fixture_engine();
        let info_hash = engine
            .load(&torrent_bytes("http://solo.example.com/announce"))
            .await
            .unwrap();

        let tiers = engine.announces(&info_hash).await.unwrap();
        assert_eq!(tiers, vec![vec![
            "http://solo.example.com/announce".to_string()
        ]]);
    }

    #[tokio::test]
    async fn test_announce_returns_interval_and_stores_peers() {
        let (engine, transport) = fixture_engine();
        let info_hash = engine.load(&torrent_bytes("http://t/announce")).await.unwrap();

        // Two compact records: 127.0.0.1:6681 and 127.0.0.2:6682
        let blob = vec![127, 0, 0, 1, 26, 25, 127, 0, 0, 2, 26, 26];
        transport.push_response("http://t/announce", announce_body(360, blob));

        let interval = engine
            .announce(&info_hash, AnnounceEvent::Regular, 0, 0, 4096)
            .await
            .unwrap();
        assert_eq!(interval, 360);

        let peers = engine.known_peers(&info_hash).await.unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].port, 26 * 256 + 25);
        assert_eq!(peers[1].port, 26 * 256 + 26);
    }

    #[tokio::test]
    async fn test_peers_accumulate_and_deduplicate_across_announces() {
        let (engine, transport) = fixture_engine();
        let info_hash = engine.load(&torrent_bytes("http://t/announce")).await.unwrap();

        transport.push_response(
            "http://t/announce",
            announce_body(60, vec![10, 0, 0, 1, 0x1A, 0xE1]),
        );
        transport.push_response(
            "http://t/announce",
            announce_body(60, vec![10, 0, 0, 1, 0x1A, 0xE1, 10, 0, 0, 2, 0x1A, 0xE1]),
        );

        engine
            .announce(&info_hash, AnnounceEvent::Regular, 0, 0, 1)
            .await
            .unwrap();
        engine
            .announce(&info_hash, AnnounceEvent::Regular, 0, 0, 1)
            .await
            .unwrap();

        let peers = engine.known_peers(&info_hash).await.unwrap();
        assert_eq!(peers, vec![
            KnownPeer::new("10.0.0.1", 6881),
            KnownPeer::new("10.0.0.2", 6881),
        ]);
    }

    #[tokio::test]
    async fn test_known_peers_sorted_by_numeric_ip() {
        let (engine, transport) = fixture_engine();
        let info_hash = engine.load(&torrent_bytes("http://t/announce")).await.unwrap();

        // 127.0.0.100 reported before 127.0.0.2: numeric order must win
        let blob = vec![127, 0, 0, 100, 0x1A, 0xE1, 127, 0, 0, 2, 0x1A, 0xE1];
        transport.push_response("http://t/announce", announce_body(60, blob));

        engine
            .announce(&info_hash, AnnounceEvent::Regular, 0, 0, 1)
            .await
            .unwrap();

        let peers = engine.known_peers(&info_hash).await.unwrap();
        assert_eq!(peers[0].ip, "127.0.0.2");
        assert_eq!(peers[1].ip, "127.0.0.100");
    }

    #[tokio::test]
    async fn test_invalidate_peer_removes_exactly_one() {
        let (engine, transport) = fixture_engine();
        let info_hash = engine.load(&torrent_bytes("http://t/announce")).await.unwrap();

        let blob = vec![10, 0, 0, 1, 0x1A, 0xE1, 10, 0, 0, 2, 0x1A, 0xE1];
        transport.push_response("http://t/announce", announce_body(60, blob));
        engine
            .announce(&info_hash, AnnounceEvent::Regular, 0, 0, 1)
            .await
            .unwrap();

        engine
            .invalidate_peer(&info_hash, &KnownPeer::new("10.0.0.1", 6881))
            .await
            .unwrap();
        let peers = engine.known_peers(&info_hash).await.unwrap();
        assert_eq!(peers, vec![KnownPeer::new("10.0.0.2", 6881)]);

        // Invalidating an unknown peer is a no-op, not an error
        engine
            .invalidate_peer(&info_hash, &KnownPeer::new("192.168.0.9", 1234))
            .await
            .unwrap();
        assert_eq!(engine.known_peers(&info_hash).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_announce_records_stats_and_surfaces_error() {
        let (engine, transport) = fixture_engine();
        let info_hash = engine.load(&torrent_bytes("http://t/announce")).await.unwrap();
        transport.push_failure("http://t/announce");

        let result = engine
            .announce(&info_hash, AnnounceEvent::Regular, 0, 0, 1)
            .await;
        assert!(matches!(
            result,
            Err(TorrentError::ExhaustedTrackers { reason }) if reason == "Connection failed"
        ));

        let stats = engine.tracker_stats(&info_hash).await.unwrap();
        assert!(matches!(
            stats.get("http://t/announce"),
            Some(ScrapeData::Failure { reason }) if reason == "Connection failed"
        ));
    }

    #[tokio::test]
    async fn test_started_announce_persists_shuffle_on_failure() {
        let (engine, transport) = fixture_engine();

        let mut info = Dictionary::new();
        info.insert("length", Value::Integer(1));
        info.insert("name", Value::string("f"));
        info.insert("piece length", Value::Integer(1));
        info.insert("pieces", Value::Bytes(vec![0x09; 20]));
        let urls: Vec<String> = (0..8).map(|i| format!("http://t{i}/announce")).collect();
        let mut root = Dictionary::new();
        root.insert("announce", Value::string(&urls[0]));
        root.insert(
            "announce-list",
            Value::List(vec![Value::List(
                urls.iter().map(|url| Value::string(url)).collect(),
            )]),
        );
        root.insert("info", Value::Dict(info));
        let info_hash = engine.load(&Value::Dict(root).encode()).await.unwrap();

        for url in &urls {
            transport.push_failure(url);
        }

        let result = engine
            .announce(&info_hash, AnnounceEvent::Started, 0, 0, 1)
            .await;
        assert!(result.is_err());

        // Order persisted by the failed announce is a permutation of the
        // original tier and is what later reads observe
        let tiers = engine.announces(&info_hash).await.unwrap();
        assert_eq!(tiers.len(), 1);
        let mut sorted = tiers[0].clone();
        sorted.sort();
        let mut expected = urls.clone();
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[tokio::test]
    async fn test_winner_promoted_in_stored_tiers() {
        let (engine, transport) = fixture_engine();

        let mut info = Dictionary::new();
        info.insert("length", Value::Integer(1));
        info.insert("name", Value::string("f"));
        info.insert("piece length", Value::Integer(1));
        info.insert("pieces", Value::Bytes(vec![0x0A; 20]));
        let mut root = Dictionary::new();
        root.insert("announce", Value::string("http://a/announce"));
        root.insert(
            "announce-list",
            Value::List(vec![Value::List(vec![
                Value::string("http://a/announce"),
                Value::string("http://b/announce"),
            ])]),
        );
        root.insert("info", Value::Dict(info));
        let info_hash = engine.load(&Value::Dict(root).encode()).await.unwrap();

        transport.push_failure("http://a/announce");
        transport.push_response("http://b/announce", announce_body(60, Vec::new()));

        engine
            .announce(&info_hash, AnnounceEvent::Regular, 0, 0, 1)
            .await
            .unwrap();

        let tiers = engine.announces(&info_hash).await.unwrap();
        assert_eq!(tiers[0], vec!["http://b/announce", "http://a/announce"]);
    }

    #[tokio::test]
    async fn test_scrape_updates_tracker_stats() {
        let (engine, transport) = fixture_engine();
        let info_hash = engine.load(&torrent_bytes("http://t/announce")).await.unwrap();

        let mut file_stats = Dictionary::new();
        file_stats.insert("complete", Value::Integer(11));
        file_stats.insert("downloaded", Value::Integer(22));
        file_stats.insert("incomplete", Value::Integer(33));
        file_stats.insert("name", Value::string("fixture.bin"));
        let mut files = Dictionary::new();
        files.insert(info_hash.to_string(), Value::Dict(file_stats));
        let mut body = Dictionary::new();
        body.insert("files", Value::Dict(files));
        transport.push_response("http://t/scrape", Value::Dict(body).encode());

        engine.scrape(&info_hash).await.unwrap();

        let stats = engine.tracker_stats(&info_hash).await.unwrap();
        assert_eq!(
            stats.get("http://t/announce"),
            Some(&ScrapeData::Scrape {
                complete: 11,
                downloaded: 22,
                incomplete: 33,
                name: Some("fixture.bin".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn test_tracker_stats_empty_before_any_contact() {
        let (engine, _) = fixture_engine();
        let info_hash = engine.load(&torrent_bytes("http://t/announce")).await.unwrap();
        assert!(engine.tracker_stats(&info_hash).await.unwrap().is_empty());
    }
}
