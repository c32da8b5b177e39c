//! Scripted transport for exercising tracker flows without sockets.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::transport::{Transport, TransportError, with_query};

/// Transport that replays scripted responses keyed by base URL.
///
/// Responses queued for a URL are consumed in order; a request for a URL
/// with no remaining script fails like a dead tracker. Full request URLs
/// (with query string) are recorded for assertions.
#[derive(Debug, Default)]
pub struct SimulatedTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<Vec<u8>, TransportError>>>>,
    requests: Mutex<Vec<String>>,
}

impl SimulatedTransport {
    /// Creates a transport with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response body for `url`.
    pub fn push_response(&self, url: &str, body: Vec<u8>) {
        self.responses
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(Ok(body));
    }

    /// Queues a connection failure for `url`.
    pub fn push_failure(&self, url: &str) {
        self.responses
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(Err(TransportError::ConnectionFailed {
                reason: "simulated connection failure".to_string(),
            }));
    }

    /// Returns every full request URL seen so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, TransportError> {
        self.requests.lock().push(with_query(url, query));
        self.responses
            .lock()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(TransportError::ConnectionFailed {
                    reason: format!("no scripted response for {url}"),
                })
            })
    }
}
