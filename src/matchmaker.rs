//! C5 -- Matchmaker: pairs waiting clients, local first then across
//! peers.

use std::collections::VecDeque;
use std::sync::Mutex;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::protocol::Player;
use crate::utils::CardClusterError;

/// A player waiting in the local FIFO queue.
#[derive(Debug, Clone)]
pub struct Waiter {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestOpponentBody {
    pub solicitante_id: String,
    pub solicitante_nome: String,
    pub servidor_origem: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestOpponentResponse {
    pub partida_encontrada: bool,
    pub sala_id: Option<String>,
    pub servidor_host: Option<String>,
    pub oponente_id: Option<String>,
    pub oponente_nome: Option<String>,
}

/// The result of a successful pairing, local or cross-server.
pub struct PairedMatch {
    pub match_id: String,
    pub host_address: String,
    pub shadow_address: String,
    pub opponent_id: String,
    pub opponent_name: String,
}

/// Maintains the local waiting queue. Pairing two local waiters is
/// synchronous and mutually exclusive with popping for a remote request,
/// so ties between two peers racing the same waiter are impossible.
pub struct Matchmaker {
    queue: Mutex<VecDeque<Waiter>>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Matchmaker {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Adds a player to the queue, or immediately pairs them with an
    /// already-waiting local player. Returns `Some` with the other
    /// player's identity if an immediate local pairing happened.
    pub fn join(&self, player: Waiter) -> Option<Waiter> {
        let mut q = self.queue.lock().unwrap();
        if let Some(other) = q.pop_front() {
            Some(other)
        } else {
            q.push_back(player);
            None
        }
    }

    /// Atomically pops a waiter for a remote `RequestOpponent`, if any.
    pub fn pop_for_remote(&self) -> Option<Waiter> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Removes a specific player from the queue (used after this node's
    /// own prober successfully paired them with a remote peer).
    pub fn remove(&self, player_id: &str) -> bool {
        let mut q = self.queue.lock().unwrap();
        let before = q.len();
        q.retain(|w| w.id != player_id);
        q.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Probes live peers in randomized order, asking each to pop a
    /// waiter for `me`. Returns the first peer that reports a match.
    pub async fn probe_peers(
        &self,
        me: &Player,
        self_address: &str,
        mut peer_addresses: Vec<String>,
        client: &crate::http::PeerClient,
    ) -> Result<Option<RequestOpponentResponse>, CardClusterError> {
        peer_addresses.shuffle(&mut rand::thread_rng());
        let body = RequestOpponentBody {
            solicitante_id: me.id.clone(),
            solicitante_nome: me.name.clone(),
            servidor_origem: self_address.to_string(),
        };
        for peer in peer_addresses {
            match client
                .post::<_, RequestOpponentResponse>(
                    &peer,
                    "/matchmaking/solicitar_oponente",
                    &body,
                )
                .await
            {
                Ok(resp) if resp.partida_encontrada => return Ok(Some(resp)),
                Ok(_) => continue,
                Err(e) => {
                    log::debug!("opponent probe to {} failed: {}", peer, e);
                }
            }
        }
        Ok(None)
    }
}

impl Default for Matchmaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_joiner_pairs_immediately() {
        let mm = Matchmaker::new();
        assert!(mm
            .join(Waiter {
                id: "p1".into(),
                name: "Ann".into()
            })
            .is_none());
        let paired = mm.join(Waiter {
            id: "p2".into(),
            name: "Bob".into(),
        });
        assert_eq!(paired.unwrap().id, "p1");
        assert!(mm.is_empty());
    }

    #[test]
    fn pop_for_remote_drains_fifo() {
        let mm = Matchmaker::new();
        mm.join(Waiter {
            id: "p1".into(),
            name: "Ann".into(),
        });
        let popped = mm.pop_for_remote();
        assert_eq!(popped.unwrap().id, "p1");
        assert!(mm.pop_for_remote().is_none());
    }
}
