//! Torrent metainfo parsing, info-hash extraction, and re-serialization.

use rand::seq::SliceRandom;
use sha1::{Digest, Sha1};

use super::{InfoHash, TorrentError};
use crate::bencode::{self, Value};

/// Parsed torrent metainfo.
///
/// Keeps the raw bytes of the info dictionary exactly as they appeared in
/// the source file so the info-hash stays stable across re-serialization,
/// together with the announce tiers (whose order is mutable session state)
/// and the optional descriptive fields.
#[derive(Debug, Clone)]
pub struct Metainfo {
    info_hash: InfoHash,
    info_raw: Vec<u8>,
    announce_list: Vec<Vec<String>>,
    creation_date: Option<i64>,
    comment: Option<String>,
    created_by: Option<String>,
}

impl Metainfo {
    /// Parses a metainfo file.
    ///
    /// The info-hash is computed over the original bytes of the `info`
    /// value, not a re-encoding, so files produced by encoders with
    /// non-canonical key order keep their published hash.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidMetainfo` - If decoding failed, the root is
    ///   not a dictionary, the `info` key is missing, or the announce
    ///   structure has the wrong shape
    pub fn parse(bytes: &[u8]) -> Result<Self, TorrentError> {
        let (value, info_span) =
            bencode::decode_with_info_span(bytes).map_err(|e| TorrentError::InvalidMetainfo {
                reason: e.to_string(),
            })?;

        let Value::Dict(root) = value else {
            return Err(invalid("root element must be a dictionary"));
        };

        let span = match (root.contains_key("info"), info_span) {
            (true, Some(span)) => span,
            _ => return Err(invalid("missing 'info' dictionary")),
        };
        let info_raw = bytes[span].to_vec();

        let announce_list = match root.get("announce-list") {
            Some(tiers) => parse_announce_list(tiers)?,
            None => {
                let announce = root
                    .get("announce")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("missing 'announce' and 'announce-list'"))?;
                vec![vec![announce.to_string()]]
            }
        };

        Ok(Self {
            info_hash: hash_info(&info_raw),
            info_raw,
            announce_list,
            creation_date: root.get("creation date").and_then(Value::as_integer),
            comment: root
                .get("comment")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
            created_by: root
                .get("created by")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
        })
    }

    /// Returns the torrent's info-hash.
    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    /// Returns the announce tiers in their current order.
    pub fn announce_list(&self) -> &[Vec<String>] {
        &self.announce_list
    }

    /// Returns the creation timestamp, if present.
    pub fn creation_date(&self) -> Option<i64> {
        self.creation_date
    }

    /// Returns the free-form comment, if present.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Returns the creating client's name, if present.
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    /// Serializes back to metainfo bytes.
    ///
    /// The current tier order and optional fields are written out around
    /// the original raw `info` bytes, so parsing the result yields the
    /// same info-hash.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(b'd');
        if let Some(announce) = self.announce_list.first().and_then(|tier| tier.first()) {
            encode_entry(&mut out, "announce", &Value::string(announce));
        }
        encode_entry(&mut out, "announce-list", &tiers_to_value(&self.announce_list));
        if let Some(comment) = &self.comment {
            encode_entry(&mut out, "comment", &Value::string(comment));
        }
        if let Some(created_by) = &self.created_by {
            encode_entry(&mut out, "created by", &Value::string(created_by));
        }
        if let Some(creation_date) = self.creation_date {
            encode_entry(&mut out, "creation date", &Value::Integer(creation_date));
        }
        out.extend_from_slice(b"4:info");
        out.extend_from_slice(&self.info_raw);
        out.push(b'e');
        out
    }

    /// Shuffles the tracker order within each tier independently.
    pub fn shuffle_tiers(&mut self) {
        let mut rng = rand::rng();
        for tier in &mut self.announce_list {
            tier.shuffle(&mut rng);
        }
    }

    /// Moves `url` to the front of the given tier, leaving every other
    /// tracker's relative order untouched.
    pub(crate) fn promote_tracker(&mut self, tier_index: usize, url: &str) {
        let Some(tier) = self.announce_list.get_mut(tier_index) else {
            return;
        };
        if let Some(position) = tier.iter().position(|candidate| candidate == url) {
            let winner = tier.remove(position);
            tier.insert(0, winner);
        }
    }
}

fn invalid(reason: &str) -> TorrentError {
    TorrentError::InvalidMetainfo {
        reason: reason.to_string(),
    }
}

fn hash_info(info_raw: &[u8]) -> InfoHash {
    let mut hasher = Sha1::new();
    hasher.update(info_raw);
    let digest = hasher.finalize();
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&digest);
    InfoHash::new(hash)
}

fn parse_announce_list(value: &Value) -> Result<Vec<Vec<String>>, TorrentError> {
    let tiers = value
        .as_list()
        .ok_or_else(|| invalid("'announce-list' must be a list"))?;
    if tiers.is_empty() {
        return Err(invalid("'announce-list' has no tiers"));
    }
    let mut announce_list = Vec::with_capacity(tiers.len());
    for tier in tiers {
        let urls = tier
            .as_list()
            .ok_or_else(|| invalid("'announce-list' tier must be a list"))?;
        if urls.is_empty() {
            return Err(invalid("'announce-list' tier is empty"));
        }
        let mut tier_urls = Vec::with_capacity(urls.len());
        for url in urls {
            let url = url
                .as_str()
                .ok_or_else(|| invalid("tracker URL must be a UTF-8 string"))?;
            tier_urls.push(url.to_string());
        }
        announce_list.push(tier_urls);
    }
    Ok(announce_list)
}

fn tiers_to_value(announce_list: &[Vec<String>]) -> Value {
    Value::List(
        announce_list
            .iter()
            .map(|tier| Value::List(tier.iter().map(|url| Value::string(url)).collect()))
            .collect(),
    )
}

fn encode_entry(out: &mut Vec<u8>, key: &str, value: &Value) {
    out.extend_from_slice(key.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(key.as_bytes());
    out.extend_from_slice(&value.encode());
}
