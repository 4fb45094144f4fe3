//! C2 -- LeaderElector: Raft-style term/vote election driven by
//! heartbeats and election timeouts. No log replication: only the stock
//! authority requires a leader, and stock draws are idempotent at match
//! granularity.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::cluster::peer::{PeerRegistry, ELECTION_TIMEOUT, HEARTBEAT_INTERVAL};
use crate::http::PeerClient;
use crate::utils::CardClusterError;

/// This node's current role in the election state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

/// The election-relevant mutable state: current term, who we voted for
/// this term, who we believe the leader is, and when we last heard from
/// them.
pub struct ElectionState {
    pub role: Role,
    pub term: u64,
    pub voted_for: Option<String>,
    pub leader: Option<String>,
    pub last_leader_heartbeat: Instant,
}

impl ElectionState {
    fn new() -> Self {
        ElectionState {
            role: Role::Follower,
            term: 0,
            voted_for: None,
            leader: None,
            last_leader_heartbeat: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidato: String,
    pub termo: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub voto_concedido: bool,
    pub termo: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderAnnouncement {
    pub novo_lider: String,
    pub termo: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub remetente: String,
    pub lider: Option<String>,
}

/// Drives leader election for this node against the known peer set.
pub struct LeaderElector {
    self_address: String,
    state: Mutex<ElectionState>,
    peers: std::sync::Arc<PeerRegistry>,
    client: PeerClient,
}

impl LeaderElector {
    pub fn new(
        self_address: String,
        peers: std::sync::Arc<PeerRegistry>,
        client: PeerClient,
    ) -> Self {
        LeaderElector {
            self_address,
            state: Mutex::new(ElectionState::new()),
            peers,
            client,
        }
    }

    pub fn role(&self) -> Role {
        self.state.lock().unwrap().role
    }

    pub fn term(&self) -> u64 {
        self.state.lock().unwrap().term
    }

    pub fn is_leader(&self) -> bool {
        self.role() == Role::Leader
    }

    pub fn known_leader(&self) -> Option<String> {
        self.state.lock().unwrap().leader.clone()
    }

    /// Runs the initial randomized startup delay (5-10s), then settles
    /// into Follower. Randomization avoids split votes when the cluster
    /// is small.
    pub async fn initial_delay(&self) {
        let delay_ms = rand::thread_rng().gen_range(5000..=10000);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        log::info!("{} entering Follower after startup delay", self.self_address);
    }

    /// Checks whether an incoming term exceeds ours; if so, steps back
    /// down to Follower and adopts the new term. Returns true if a role
    /// change occurred.
    pub fn check_term(&self, term: u64) -> bool {
        let mut st = self.state.lock().unwrap();
        if term > st.term {
            st.term = term;
            st.voted_for = None;
            let was_leader = st.role != Role::Follower;
            st.role = Role::Follower;
            if was_leader {
                log::info!("{} stepping down, saw higher term {}", self.self_address, term);
            }
            was_leader
        } else {
            false
        }
    }

    /// Handles an incoming `RequestVote`: grants iff the candidate's term
    /// strictly exceeds ours.
    pub fn handle_vote_request(&self, req: &VoteRequest) -> VoteResponse {
        let mut st = self.state.lock().unwrap();
        if req.termo > st.term {
            st.term = req.termo;
            st.voted_for = Some(req.candidato.clone());
            st.leader = None;
            st.role = Role::Follower;
            VoteResponse {
                voto_concedido: true,
                termo: st.term,
            }
        } else {
            VoteResponse {
                voto_concedido: false,
                termo: st.term,
            }
        }
    }

    /// Handles an incoming leader announcement: accepted iff its term is
    /// at least as large as ours.
    pub fn handle_leader_announcement(&self, ann: &LeaderAnnouncement) {
        let mut st = self.state.lock().unwrap();
        if ann.termo >= st.term {
            st.term = ann.termo;
            st.leader = Some(ann.novo_lider.clone());
            st.role = Role::Follower;
            st.last_leader_heartbeat = Instant::now();
        }
    }

    /// Handles an incoming heartbeat from another peer, optionally
    /// carrying that peer's view of the leader.
    pub fn handle_heartbeat(&self, req: &HeartbeatRequest) {
        self.peers.heartbeat_received(&req.remetente);
        if let Some(leader) = &req.lider {
            let mut st = self.state.lock().unwrap();
            st.leader = Some(leader.clone());
            st.last_leader_heartbeat = Instant::now();
        }
    }

    fn leader_heartbeat_stale(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.leader.is_none()
            || st.last_leader_heartbeat.elapsed() > ELECTION_TIMEOUT
    }

    /// Runs one election-trigger check; if warranted, becomes a candidate
    /// and attempts to win the term. Intended to be called periodically
    /// from a background loop.
    pub async fn maybe_trigger_election(&self) {
        if self.role() == Role::Leader || !self.leader_heartbeat_stale() {
            return;
        }
        if let Err(e) = self.run_election().await {
            log::warn!("election attempt failed: {}", e);
        }
    }

    async fn run_election(&self) -> Result<(), CardClusterError> {
        let term = {
            let mut st = self.state.lock().unwrap();
            st.role = Role::Candidate;
            st.term += 1;
            st.voted_for = Some(self.self_address.clone());
            st.term
        };
        log::info!("{} starting election for term {}", self.self_address, term);

        let peers = self.peers.peer_addresses();
        let population = self.peers.population();
        let majority = population / 2 + 1;
        let mut votes = 1usize; // self-vote

        let deadline = Instant::now() + ELECTION_TIMEOUT;
        for peer in &peers {
            if Instant::now() >= deadline {
                break;
            }
            let req = VoteRequest {
                candidato: self.self_address.clone(),
                termo: term,
            };
            match timeout(
                Duration::from_secs(2),
                self.client.request_vote(peer, &req),
            )
            .await
            {
                Ok(Ok(resp)) => {
                    if resp.termo > term {
                        self.check_term(resp.termo);
                        return Ok(());
                    }
                    if resp.voto_concedido {
                        votes += 1;
                    }
                }
                Ok(Err(e)) => {
                    log::debug!("vote request to {} failed: {}", peer, e);
                }
                Err(_) => {
                    log::debug!("vote request to {} timed out", peer);
                }
            }
        }

        if votes >= majority {
            self.become_leader(term).await;
        } else {
            log::info!(
                "{} lost election for term {} ({}/{} votes)",
                self.self_address,
                term,
                votes,
                majority
            );
        }
        Ok(())
    }

    async fn become_leader(&self, term: u64) {
        {
            let mut st = self.state.lock().unwrap();
            if st.term != term || st.role != Role::Candidate {
                return; // stale, someone already moved us on
            }
            st.role = Role::Leader;
            st.leader = Some(self.self_address.clone());
        }
        log::info!("{} elected leader for term {}", self.self_address, term);
        self.broadcast_leader_announcement(term).await;
    }

    async fn broadcast_leader_announcement(&self, term: u64) {
        let ann = LeaderAnnouncement {
            novo_lider: self.self_address.clone(),
            termo: term,
        };
        for peer in self.peers.peer_addresses() {
            if let Err(e) = self.client.announce_leader(&peer, &ann).await {
                log::debug!("leader announcement to {} failed: {}", peer, e);
            }
        }
    }

    /// Broadcasts a heartbeat to every known peer, carrying the believed
    /// leader. Called periodically regardless of role.
    pub async fn bcast_heartbeats(&self) {
        let leader = self.known_leader();
        let req = HeartbeatRequest {
            remetente: self.self_address.clone(),
            lider: leader,
        };
        for peer in self.peers.peer_addresses() {
            if let Err(e) = self.client.heartbeat(&peer, &req).await {
                log::debug!("heartbeat to {} failed: {}", peer, e);
            }
        }
    }

    pub fn heartbeat_interval() -> Duration {
        HEARTBEAT_INTERVAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elector() -> LeaderElector {
        let peers = std::sync::Arc::new(PeerRegistry::new("a".into(), &[]));
        LeaderElector::new("a".into(), peers, PeerClient::new("secret".into()))
    }

    #[test]
    fn vote_granted_only_for_higher_term() {
        let e = elector();
        let resp = e.handle_vote_request(&VoteRequest {
            candidato: "b".into(),
            termo: 1,
        });
        assert!(resp.voto_concedido);
        let resp2 = e.handle_vote_request(&VoteRequest {
            candidato: "c".into(),
            termo: 1,
        });
        assert!(!resp2.voto_concedido);
    }

    #[test]
    fn check_term_steps_down_leader() {
        let e = elector();
        {
            let mut st = e.state.lock().unwrap();
            st.role = Role::Leader;
            st.term = 1;
        }
        assert!(e.check_term(2));
        assert_eq!(e.role(), Role::Follower);
    }

    #[test]
    fn single_node_majority_is_one() {
        let peers = std::sync::Arc::new(PeerRegistry::new("a".into(), &[]));
        assert_eq!(peers.population(), 1);
    }
}
