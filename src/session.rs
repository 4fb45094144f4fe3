//! C4 -- SessionRegistry: the table of active clients and matches local
//! to this node; routes inbound pub/sub and RPC traffic.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use crate::match_core::Match;
use crate::protocol::Player;

/// Tracks every client logged in through this node and every match that
/// has a Host or Shadow presence here.
pub struct SessionRegistry {
    clients: RwLock<HashMap<String, Player>>,
    matches: RwLock<HashMap<String, Mutex<Match>>>,
    /// Per-match async mutex held across the whole trade sequence
    /// (including the awaited remote calls), distinct from each match's
    /// own state mutex so the latter is never held across an await.
    trade_locks: RwLock<HashMap<String, std::sync::Arc<tokio::sync::Mutex<()>>>>,
    next_client_id: std::sync::atomic::AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            clients: RwLock::new(HashMap::new()),
            matches: RwLock::new(HashMap::new()),
            trade_locks: RwLock::new(HashMap::new()),
            next_client_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Returns the per-match trade mutex, creating it on first use.
    pub fn trade_lock(&self, match_id: &str) -> std::sync::Arc<tokio::sync::Mutex<()>> {
        if let Some(lock) = self.trade_locks.read().unwrap().get(match_id) {
            return lock.clone();
        }
        self.trade_locks
            .write()
            .unwrap()
            .entry(match_id.to_string())
            .or_insert_with(|| std::sync::Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Allocates a permanent client id and registers the new player,
    /// fulfilling the `clients/<tempId>/login` handshake.
    pub fn login(&self, name: String) -> Player {
        let id = format!(
            "player-{}",
            self.next_client_id
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
        );
        let player = Player::new(id.clone(), name);
        self.clients.write().unwrap().insert(id, player.clone());
        player
    }

    pub fn get_client(&self, id: &str) -> Option<Player> {
        self.clients.read().unwrap().get(id).cloned()
    }

    pub fn update_client<F: FnOnce(&mut Player)>(&self, id: &str, f: F) -> bool {
        let mut clients = self.clients.write().unwrap();
        if let Some(p) = clients.get_mut(id) {
            f(p);
            true
        } else {
            false
        }
    }

    pub fn insert_match(&self, m: Match) {
        self.matches
            .write()
            .unwrap()
            .insert(m.id.clone(), Mutex::new(m));
    }

    /// Runs `f` under the per-match lock, returning its result, or `None`
    /// if the match isn't known to this node.
    pub fn with_match<F, T>(&self, match_id: &str, f: F) -> Option<T>
    where
        F: FnOnce(&mut Match) -> T,
    {
        let matches = self.matches.read().unwrap();
        let m = matches.get(match_id)?;
        let mut guard = m.lock().unwrap();
        Some(f(&mut guard))
    }

    pub fn remove_match(&self, match_id: &str) -> bool {
        self.matches.write().unwrap().remove(match_id).is_some()
    }

    /// Finds the match (if any) that a given player belongs to, among
    /// matches known on this node.
    pub fn match_for_player(&self, player_id: &str) -> Option<String> {
        let matches = self.matches.read().unwrap();
        for (id, m) in matches.iter() {
            let guard = m.lock().unwrap();
            if guard.players.iter().any(|p| p.id == player_id) {
                return Some(id.clone());
            }
        }
        None
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_allocates_distinct_ids() {
        let reg = SessionRegistry::new();
        let a = reg.login("Ann".into());
        let b = reg.login("Bob".into());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn with_match_runs_under_lock_and_none_when_absent() {
        let reg = SessionRegistry::new();
        assert!(reg
            .with_match("missing", |_m| ())
            .is_none());
    }
}
