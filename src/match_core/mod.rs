//! C6 -- MatchCore: the per-match turn state machine. Host-only
//! authority; Shadow follows via replicated snapshots.

mod trick;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::protocol::{Card, GameEvent, GameEventType};
use crate::utils::CardClusterError;
pub use trick::{resolve as resolve_trick, TrickOutcome};

/// Whether this node owns authoritative state for the match, or mirrors
/// it for failover and local client delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchRole {
    Host,
    Shadow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    AwaitingPurchase,
    Playing,
    Finished,
}

/// One player's slot within a match, tracked identically whether the
/// player is local to this server or remote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPlayerSlot {
    pub id: String,
    pub name: String,
    pub local: bool,
    pub inventory: Vec<Card>,
    pub ready: bool,
    /// Host-authoritative count of cards this player still owes to play,
    /// seeded from pack size at ready-up and decremented on each accepted
    /// `CARD_PLAYED`. Never derived from a replicated inventory length
    /// (see module docs on cross-server finalization).
    pub emitted_remaining: u32,
}

impl MatchPlayerSlot {
    pub fn new(id: String, name: String, local: bool) -> Self {
        MatchPlayerSlot {
            id,
            name,
            local,
            inventory: Vec::new(),
            ready: false,
            emitted_remaining: 0,
        }
    }
}

/// Outcome of the match, reported in the `FIM_DE_JOGO` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Winner(String),
    Draw,
}

/// Signed, sequenced snapshot posted Host -> Shadow after every accepted
/// event (C7's payload; defined here since its shape mirrors `Match`
/// field-for-field).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_id: String,
    pub event_seq: u64,
    pub phase: MatchPhase,
    pub table: HashMap<String, Card>,
    pub round_wins: HashMap<String, u32>,
    pub round_number: u32,
    pub players: Vec<MatchPlayerSlot>,
    pub turn_owner: String,
    pub last_winner: Option<MatchOutcome>,
    pub signature: String,
}

/// A per-match state machine. A physical copy lives on both Host and
/// Shadow; only the Host advances it via the `apply_*` methods, the
/// Shadow via `apply_snapshot`.
pub struct Match {
    pub id: String,
    pub role: MatchRole,
    pub host_address: String,
    pub shadow_address: String,
    pub phase: MatchPhase,
    pub players: [MatchPlayerSlot; 2],
    pub table: HashMap<String, Card>,
    pub round_number: u32,
    pub round_wins: HashMap<String, u32>,
    pub turn_owner: String,
    pub last_winner: Option<MatchOutcome>,
    pub event_seq: u64,
    pub event_log: Vec<GameEvent>,
}

/// What a successful `apply_*` call produces for the caller to fan out.
pub struct AppliedUpdate {
    pub snapshot: MatchSnapshot,
    pub trick_outcome: Option<TrickOutcome>,
    pub match_finished: Option<MatchOutcome>,
}

impl Match {
    pub fn new(
        id: String,
        role: MatchRole,
        host_address: String,
        shadow_address: String,
        p1: MatchPlayerSlot,
        p2: MatchPlayerSlot,
    ) -> Self {
        let turn_owner = p1.id.clone();
        let mut round_wins = HashMap::new();
        round_wins.insert(p1.id.clone(), 0);
        round_wins.insert(p2.id.clone(), 0);
        Match {
            id,
            role,
            host_address,
            shadow_address,
            phase: MatchPhase::AwaitingPurchase,
            players: [p1, p2],
            table: HashMap::new(),
            round_number: 0,
            round_wins,
            turn_owner,
            last_winner: None,
            event_seq: 0,
            event_log: Vec::new(),
        }
    }

    fn slot_mut(&mut self, player_id: &str) -> Option<&mut MatchPlayerSlot> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    fn slot(&self, player_id: &str) -> Option<&MatchPlayerSlot> {
        self.players.iter().find(|p| p.id == player_id)
    }

    fn opponent_id(&self, player_id: &str) -> String {
        self.players
            .iter()
            .find(|p| p.id != player_id)
            .map(|p| p.id.clone())
            .unwrap_or_default()
    }

    fn next_seq(&mut self) -> u64 {
        self.event_seq += 1;
        self.event_seq
    }

    fn append_event(
        &mut self,
        secret: &str,
        event_type: GameEventType,
        player_id: &str,
        payload: serde_json::Value,
    ) -> GameEvent {
        let seq = self.next_seq();
        let ev = GameEvent::new_signed(
            secret, seq, &self.id, event_type, player_id, payload,
        );
        self.event_log.push(ev.clone());
        ev
    }

    fn build_snapshot(&self, secret: &str) -> MatchSnapshot {
        let unsigned = format!(
            "{}:{}:{:?}",
            self.id, self.event_seq, self.phase
        );
        let signature = crate::utils::sign_event(
            secret,
            self.event_seq,
            &self.id,
            "SNAPSHOT",
            &unsigned,
        );
        MatchSnapshot {
            match_id: self.id.clone(),
            event_seq: self.event_seq,
            phase: self.phase,
            table: self.table.clone(),
            round_wins: self.round_wins.clone(),
            round_number: self.round_number,
            players: self.players.to_vec(),
            turn_owner: self.turn_owner.clone(),
            last_winner: self.last_winner.clone(),
            signature,
        }
    }

    /// Host-only. Marks `player_id` ready; when both players are ready,
    /// transitions to Playing.
    pub fn apply_ready(
        &mut self,
        secret: &str,
        player_id: &str,
        pack_size: usize,
    ) -> Result<AppliedUpdate, CardClusterError> {
        if self.role != MatchRole::Host {
            return Err(CardClusterError::msg("apply_ready called on Shadow"));
        }
        if self.phase != MatchPhase::AwaitingPurchase {
            return Err(CardClusterError::msg("match already past ready-up"));
        }
        {
            let slot = self
                .slot_mut(player_id)
                .ok_or_else(|| CardClusterError::msg("unknown player"))?;
            if slot.ready {
                return Err(CardClusterError::msg("player already ready"));
            }
            slot.ready = true;
            slot.emitted_remaining = pack_size as u32;
        }
        self.append_event(
            secret,
            GameEventType::PlayerReady,
            player_id,
            serde_json::json!({}),
        );
        if self.players.iter().all(|p| p.ready) {
            self.phase = MatchPhase::Playing;
        }
        Ok(AppliedUpdate {
            snapshot: self.build_snapshot(secret),
            trick_outcome: None,
            match_finished: None,
        })
    }

    /// Host-only. Validates and applies a `CARD_PLAYED` command from
    /// `player_id`, resolving the trick if both players have now played.
    pub fn apply_card_played(
        &mut self,
        secret: &str,
        player_id: &str,
        card_id: &str,
    ) -> Result<AppliedUpdate, CardClusterError> {
        if self.role != MatchRole::Host {
            return Err(CardClusterError::msg("apply_card_played called on Shadow"));
        }
        if self.phase != MatchPhase::Playing {
            return Err(CardClusterError::msg("match not in Playing phase"));
        }
        if player_id != self.turn_owner {
            return Err(CardClusterError::msg("Não é sua vez de jogar."));
        }
        if self.table.contains_key(player_id) {
            return Err(CardClusterError::msg("player already played this round"));
        }

        let card = {
            let slot = self
                .slot_mut(player_id)
                .ok_or_else(|| CardClusterError::msg("unknown player"))?;
            slot.take_card(card_id)
                .ok_or_else(|| CardClusterError::msg("card not in inventory"))?
        };

        self.table.insert(player_id.to_string(), card.clone());
        if let Some(slot) = self.slot_mut(player_id) {
            slot.emitted_remaining = slot.emitted_remaining.saturating_sub(1);
        }

        self.append_event(
            secret,
            GameEventType::CardPlayed,
            player_id,
            serde_json::json!({"carta_id": card_id}),
        );

        let opponent = self.opponent_id(player_id);
        let mut trick_outcome = None;
        let mut match_finished = None;

        if self.table.contains_key(&opponent) {
            let first_card = self.table.get(player_id).unwrap().clone();
            let second_card = self.table.get(&opponent).unwrap().clone();
            let outcome = resolve_trick(&first_card, &second_card);
            trick_outcome = Some(outcome);

            let winner_id = match outcome {
                TrickOutcome::FirstWins => Some(player_id.to_string()),
                TrickOutcome::SecondWins => Some(opponent.clone()),
                TrickOutcome::Tie => None,
            };
            if let Some(w) = &winner_id {
                *self.round_wins.entry(w.clone()).or_insert(0) += 1;
                self.turn_owner = w.clone();
            }
            // a tie keeps the current turn owner unchanged

            self.table.clear();
            self.round_number += 1;

            if self.players.iter().all(|p| p.emitted_remaining == 0) {
                let outcome = self.decide_outcome();
                self.last_winner = Some(outcome.clone());
                self.phase = MatchPhase::Finished;
                self.append_event(
                    secret,
                    GameEventType::MatchEnd,
                    player_id,
                    serde_json::json!({"outcome": format!("{:?}", outcome)}),
                );
                match_finished = Some(outcome);
            }
        } else {
            self.turn_owner = opponent;
        }

        Ok(AppliedUpdate {
            snapshot: self.build_snapshot(secret),
            trick_outcome,
            match_finished,
        })
    }

    fn decide_outcome(&self) -> MatchOutcome {
        let [p1, p2] = &self.players;
        let w1 = *self.round_wins.get(&p1.id).unwrap_or(&0);
        let w2 = *self.round_wins.get(&p2.id).unwrap_or(&0);
        if w1 > w2 {
            MatchOutcome::Winner(p1.id.clone())
        } else if w2 > w1 {
            MatchOutcome::Winner(p2.id.clone())
        } else {
            MatchOutcome::Draw
        }
    }

    /// Host-only. Appends a `CHAT` event to the log without touching
    /// phase, table, or turn state.
    pub fn log_chat(
        &mut self,
        secret: &str,
        player_id: &str,
        text: &str,
    ) -> Result<GameEvent, CardClusterError> {
        if self.role != MatchRole::Host {
            return Err(CardClusterError::msg("log_chat called on Shadow"));
        }
        if self.phase == MatchPhase::Finished {
            return Err(CardClusterError::msg("match already finished"));
        }
        Ok(self.append_event(
            secret,
            GameEventType::Chat,
            player_id,
            serde_json::json!({"texto": text}),
        ))
    }

    /// Shadow-only. Accepts a Host-built snapshot iff its `event_seq` is
    /// strictly greater than ours and the signature verifies.
    pub fn apply_snapshot(
        &mut self,
        secret: &str,
        snapshot: MatchSnapshot,
    ) -> Result<(), CardClusterError> {
        if snapshot.event_seq <= self.event_seq {
            return Err(CardClusterError::msg("stale snapshot rejected"));
        }
        let expected = crate::utils::sign_event(
            secret,
            snapshot.event_seq,
            &snapshot.match_id,
            "SNAPSHOT",
            &format!("{}:{}:{:?}", snapshot.match_id, snapshot.event_seq, snapshot.phase),
        );
        if expected != snapshot.signature {
            return Err(CardClusterError::msg("snapshot signature mismatch"));
        }

        self.event_seq = snapshot.event_seq;
        self.phase = snapshot.phase;
        self.table = snapshot.table;
        self.round_wins = snapshot.round_wins;
        self.round_number = snapshot.round_number;
        self.turn_owner = snapshot.turn_owner;
        self.last_winner = snapshot.last_winner;
        for incoming in snapshot.players {
            if let Some(slot) = self.slot_mut(&incoming.id) {
                // A node's own local player's inventory is authoritative
                // here, not on the sender: only the remote player's
                // mirrored inventory is replaced from the snapshot.
                if !slot.local {
                    slot.inventory = incoming.inventory;
                }
                slot.ready = incoming.ready;
                slot.emitted_remaining = incoming.emitted_remaining;
            }
        }
        Ok(())
    }

    /// Promotes this Shadow to Host after the original Host is confirmed
    /// unreachable. The pending command is processed by the caller
    /// immediately afterwards.
    pub fn promote_to_host(&mut self, new_host_address: String) {
        self.role = MatchRole::Host;
        self.host_address = new_host_address;
    }

    pub fn player_slot(&self, player_id: &str) -> Option<&MatchPlayerSlot> {
        self.slot(player_id)
    }

    pub fn player_slot_mut(&mut self, player_id: &str) -> Option<&mut MatchPlayerSlot> {
        self.slot_mut(player_id)
    }
}

impl MatchPlayerSlot {
    fn take_card(&mut self, card_id: &str) -> Option<Card> {
        let pos = self.inventory.iter().position(|c| c.id == card_id)?;
        Some(self.inventory.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Rarity, Suit};

    const SECRET: &str = "test-secret";

    fn card(id: &str, power: u32, suit: Suit) -> Card {
        Card {
            id: id.into(),
            name: id.into(),
            suit,
            power,
            rarity: Rarity::Common,
        }
    }

    fn single_trick_match() -> Match {
        let mut p1 = MatchPlayerSlot::new("p1".into(), "Ann".into(), true);
        let mut p2 = MatchPlayerSlot::new("p2".into(), "Bob".into(), true);
        p1.inventory.push(card("c1", 10, Suit::Clubs));
        p2.inventory.push(card("c2", 5, Suit::Spades));
        let mut m = Match::new(
            "m1".into(),
            MatchRole::Host,
            "a".into(),
            "a".into(),
            p1,
            p2,
        );
        m.apply_ready(SECRET, "p1", 1).unwrap();
        m.apply_ready(SECRET, "p2", 1).unwrap();
        assert_eq!(m.phase, MatchPhase::Playing);
        m
    }

    #[test]
    fn full_match_to_completion_declares_winner() {
        let mut m = single_trick_match();
        m.apply_card_played(SECRET, "p1", "c1").unwrap();
        let update = m.apply_card_played(SECRET, "p2", "c2").unwrap();
        assert_eq!(update.trick_outcome, Some(TrickOutcome::FirstWins));
        assert_eq!(m.phase, MatchPhase::Finished);
        assert_eq!(update.match_finished, Some(MatchOutcome::Winner("p1".into())));
    }

    #[test]
    fn wrong_turn_is_rejected_without_state_change() {
        let mut m = single_trick_match();
        let seq_before = m.event_seq;
        let err = m.apply_card_played(SECRET, "p2", "c2");
        assert!(err.is_err());
        assert_eq!(m.event_seq, seq_before);
    }

    #[test]
    fn snapshot_rejects_non_monotonic_seq() {
        let mut host = single_trick_match();
        let update = host.apply_card_played(SECRET, "p1", "c1").unwrap();
        let snap1 = update.snapshot;

        let p1 = MatchPlayerSlot::new("p1".into(), "Ann".into(), false);
        let p2 = MatchPlayerSlot::new("p2".into(), "Bob".into(), true);
        let mut shadow = Match::new("m1".into(), MatchRole::Shadow, "a".into(), "b".into(), p1, p2);
        shadow.apply_snapshot(SECRET, snap1.clone()).unwrap();
        assert_eq!(shadow.event_seq, snap1.event_seq);

        let mut stale = snap1.clone();
        stale.event_seq = snap1.event_seq; // same, not strictly greater
        assert!(shadow.apply_snapshot(SECRET, stale).is_err());
    }
}
