//! Wire types shared by the pub/sub client protocol and the inter-server
//! HTTP API: cards, players, the `{command, data}` envelope, and signed
//! game events.

use serde::{Deserialize, Serialize};

/// One of the four suits, ordered `Clubs < Diamonds < Hearts < Spades` for
/// trick-resolution tiebreaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

/// Rarity tag, also used as the stock's bucket key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Legendary,
}

/// An immutable card once minted. Identity is carried by `id`; `power` is
/// the comparison value used in trick resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub suit: Suit,
    pub power: u32,
    pub rarity: Rarity,
}

/// A logged-in player: stable id, display name, optional external wallet
/// address for ledger mirroring, and an ordered inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub wallet_address: Option<String>,
    pub inventory: Vec<Card>,
}

impl Player {
    pub fn new(id: String, name: String) -> Self {
        Player {
            id,
            name,
            wallet_address: None,
            inventory: Vec::new(),
        }
    }

    /// Removes a card by id from the inventory, returning it if present.
    pub fn take_card(&mut self, card_id: &str) -> Option<Card> {
        let pos = self.inventory.iter().position(|c| c.id == card_id)?;
        Some(self.inventory.remove(pos))
    }
}

/// The `{command, data}` envelope carried on every pub/sub topic. `data`
/// is kept as raw JSON so that each handler can declare its own concrete
/// payload type without a reflection layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub command: String,
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new<T: Serialize>(
        command: &str,
        data: &T,
    ) -> Result<Self, crate::CardClusterError> {
        Ok(Envelope {
            command: command.to_string(),
            data: serde_json::to_value(data)?,
        })
    }
}

/// Tagged variant of every client-originated in-match or queue command.
/// `TradeCards` subsumes the legacy `TROCAR_CARTAS_OFERTA` alias: both
/// decode into this single variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", content = "data")]
pub enum Command {
    #[serde(rename = "COMPRAR_PACOTE")]
    BuyPack,
    #[serde(rename = "JOGAR_CARTA")]
    PlayCard { carta_id: String },
    #[serde(rename = "CHAT")]
    Chat { texto: String },
    #[serde(rename = "TROCAR_CARTAS", alias = "TROCAR_CARTAS_OFERTA")]
    TradeCards {
        oferecida_id: String,
        desejada_id: String,
        jogador_desejado_id: String,
    },
}

/// Kinds of [`GameEvent`] appended to a match's event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventType {
    #[serde(rename = "PLAYER_READY")]
    PlayerReady,
    #[serde(rename = "CARD_PLAYED")]
    CardPlayed,
    #[serde(rename = "CHAT")]
    Chat,
    #[serde(rename = "TRADE_APPLIED")]
    TradeApplied,
    #[serde(rename = "MATCH_END")]
    MatchEnd,
}

impl GameEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameEventType::PlayerReady => "PLAYER_READY",
            GameEventType::CardPlayed => "CARD_PLAYED",
            GameEventType::Chat => "CHAT",
            GameEventType::TradeApplied => "TRADE_APPLIED",
            GameEventType::MatchEnd => "MATCH_END",
        }
    }
}

/// A single entry in a match's append-only, HMAC-signed event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    pub seq: u64,
    pub match_id: String,
    pub timestamp: i64,
    pub event_type: GameEventType,
    pub player_id: String,
    pub payload: serde_json::Value,
    pub signature: String,
}

impl GameEvent {
    /// Builds and signs a new event using the cluster secret.
    pub fn new_signed(
        secret: &str,
        seq: u64,
        match_id: &str,
        event_type: GameEventType,
        player_id: &str,
        payload: serde_json::Value,
    ) -> Self {
        let signature = crate::utils::sign_event(
            secret,
            seq,
            match_id,
            event_type.as_str(),
            player_id,
        );
        GameEvent {
            seq,
            match_id: match_id.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            event_type,
            player_id: player_id.to_string(),
            payload,
            signature,
        }
    }

    /// Verifies this event's signature against the cluster secret.
    pub fn verify(&self, secret: &str) -> bool {
        crate::utils::verify_event(
            secret,
            self.seq,
            &self.match_id,
            self.event_type.as_str(),
            &self.player_id,
            &self.signature,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_alias_decodes_to_same_variant() {
        let canonical: Command = serde_json::from_str(
            r#"{"command":"TROCAR_CARTAS","data":{"oferecida_id":"a","desejada_id":"b","jogador_desejado_id":"p2"}}"#,
        )
        .unwrap();
        let legacy: Command = serde_json::from_str(
            r#"{"command":"TROCAR_CARTAS_OFERTA","data":{"oferecida_id":"a","desejada_id":"b","jogador_desejado_id":"p2"}}"#,
        )
        .unwrap();
        assert!(matches!(canonical, Command::TradeCards { .. }));
        assert!(matches!(legacy, Command::TradeCards { .. }));
    }

    #[test]
    fn event_sign_and_verify_round_trip() {
        let e = GameEvent::new_signed(
            "secret",
            1,
            "m1",
            GameEventType::CardPlayed,
            "p1",
            serde_json::json!({"carta_id": "c1"}),
        );
        assert!(e.verify("secret"));
        assert!(!e.verify("other"));
    }

    #[test]
    fn take_card_removes_by_id() {
        let mut p = Player::new("p1".into(), "Ann".into());
        p.inventory.push(Card {
            id: "c1".into(),
            name: "Test".into(),
            suit: Suit::Spades,
            power: 10,
            rarity: Rarity::Common,
        });
        assert!(p.take_card("c1").is_some());
        assert!(p.take_card("c1").is_none());
    }
}
