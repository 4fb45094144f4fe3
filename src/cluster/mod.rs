//! Peer discovery and leader election: C1 (PeerRegistry) and C2
//! (LeaderElector).

mod election;
mod peer;

pub use election::{
    ElectionState, HeartbeatRequest, LeaderAnnouncement, LeaderElector, Role,
    VoteRequest, VoteResponse,
};
pub use peer::{PeerInfo, PeerRegistry, PeerSnapshot, ELECTION_TIMEOUT, HEARTBEAT_INTERVAL};
