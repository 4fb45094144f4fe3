//! C1 -- PeerRegistry: known peer servers, their liveness, and the
//! current leader.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// A heartbeat older than this is suspect for election purposes, though
/// the peer is never evicted from the registry.
pub const ELECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval at which nodes post heartbeats to every other known peer.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// One entry in the registry: a peer's address, its last observed
/// heartbeat time, and whether it's currently considered alive.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub address: String,
    pub last_heartbeat: Instant,
    pub alive: bool,
}

/// Wire-shape snapshot of the registry exchanged during `/register` and
/// `GET /servers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSnapshot {
    pub addresses: Vec<String>,
}

/// Tracks every peer this node knows about, keyed by address. Does not
/// include this node's own address.
pub struct PeerRegistry {
    self_address: String,
    peers: RwLock<HashMap<String, PeerInfo>>,
}

impl PeerRegistry {
    pub fn new(self_address: String, initial_peers: &[String]) -> Self {
        let now = Instant::now();
        let mut peers = HashMap::new();
        for addr in initial_peers {
            if addr != &self_address {
                peers.insert(
                    addr.clone(),
                    PeerInfo {
                        address: addr.clone(),
                        last_heartbeat: now,
                        alive: true,
                    },
                );
            }
        }
        PeerRegistry {
            self_address,
            peers: RwLock::new(peers),
        }
    }

    pub fn self_address(&self) -> &str {
        &self.self_address
    }

    /// Merges a peer's own view of the cluster into ours; new addresses
    /// are added, already-known ones are left untouched.
    pub fn merge(&self, snapshot: &PeerSnapshot) {
        let now = Instant::now();
        let mut peers = self.peers.write().unwrap();
        for addr in &snapshot.addresses {
            if addr != &self.self_address && !peers.contains_key(addr) {
                peers.insert(
                    addr.clone(),
                    PeerInfo {
                        address: addr.clone(),
                        last_heartbeat: now,
                        alive: true,
                    },
                );
            }
        }
    }

    /// Records a heartbeat from `addr`, refreshing its liveness.
    pub fn heartbeat_received(&self, addr: &str) {
        let mut peers = self.peers.write().unwrap();
        let entry = peers
            .entry(addr.to_string())
            .or_insert_with(|| PeerInfo {
                address: addr.to_string(),
                last_heartbeat: Instant::now(),
                alive: true,
            });
        entry.last_heartbeat = Instant::now();
        entry.alive = true;
    }

    /// A point-in-time snapshot of every known peer address, including
    /// this node's own.
    pub fn snapshot(&self) -> PeerSnapshot {
        let mut addresses: Vec<String> =
            self.peers.read().unwrap().keys().cloned().collect();
        addresses.push(self.self_address.clone());
        PeerSnapshot { addresses }
    }

    /// Every known peer address (excluding self), regardless of liveness.
    pub fn peer_addresses(&self) -> Vec<String> {
        self.peers.read().unwrap().keys().cloned().collect()
    }

    /// Cluster population including self, used for majority computation.
    pub fn population(&self) -> usize {
        self.peers.read().unwrap().len() + 1
    }

    /// Marks peers whose last heartbeat exceeds the election timeout as
    /// suspect (not alive), without evicting them.
    pub fn sweep_suspects(&self) {
        let mut peers = self.peers.write().unwrap();
        for info in peers.values_mut() {
            if info.last_heartbeat.elapsed() > ELECTION_TIMEOUT {
                info.alive = false;
            }
        }
    }

    pub fn is_alive(&self, addr: &str) -> bool {
        self.peers
            .read()
            .unwrap()
            .get(addr)
            .map(|p| p.alive)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_new_peers_only() {
        let reg = PeerRegistry::new("a".into(), &["b".into()]);
        reg.merge(&PeerSnapshot {
            addresses: vec!["a".into(), "b".into(), "c".into()],
        });
        let mut addrs = reg.peer_addresses();
        addrs.sort();
        assert_eq!(addrs, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn population_includes_self() {
        let reg = PeerRegistry::new("a".into(), &["b".into(), "c".into()]);
        assert_eq!(reg.population(), 3);
    }

    #[test]
    fn heartbeat_marks_alive() {
        let reg = PeerRegistry::new("a".into(), &["b".into()]);
        reg.heartbeat_received("b");
        assert!(reg.is_alive("b"));
    }
}
