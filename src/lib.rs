//! Public interface to the card-cluster core library, linked by both the
//! server and client executables.

mod cluster;
mod dispatch;
mod http;
mod ledger;
mod broker;
mod match_core;
mod protocol;
mod services;
mod session;
mod stock;
mod fanout;
mod trade;
mod replication;
mod matchmaker;
mod utils;

pub use cluster::{
    ElectionState, HeartbeatRequest, LeaderAnnouncement, LeaderElector, PeerInfo,
    PeerRegistry, Role, VoteRequest, VoteResponse,
};
pub use dispatch::{dispatch_match_command, notify_command_error, GameEventRequest};
pub use http::{build_router, require_cluster_jwt, PeerClient};
pub use ledger::{best_effort, HttpLedgerClient, LedgerClient, NullLedger};
pub use broker::{Broker, MqttBroker, RecordingBroker, TopicEvent};
pub use match_core::{
    AppliedUpdate, Match, MatchOutcome, MatchPhase, MatchPlayerSlot, MatchRole,
    MatchSnapshot, TrickOutcome,
};
pub use matchmaker::{Matchmaker, RequestOpponentBody, RequestOpponentResponse, Waiter};
pub use protocol::{
    Card, Command, Envelope, GameEvent, GameEventType, Player, Rarity, Suit,
};
pub use services::{ClusterConfig, Services};
pub use session::SessionRegistry;
pub use stock::{StockAuthority, StockStatus, PACK_SIZE};
pub use trade::{TradeCoordinator, TradeRequest};
pub use replication::{forward_to_host, replicate_to_shadow};
pub use utils::{logger_init, CardClusterError};
