//! C9 -- TradeCoordinator: a two-party card swap, coordinated by the
//! Host, with optional ledger confirmation.

use serde::{Deserialize, Serialize};

use crate::ledger::best_effort;
use crate::match_core::MatchRole;
use crate::protocol::Card;
use crate::services::Services;
use crate::utils::CardClusterError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub offerer_id: String,
    pub offerer_name: String,
    pub desired_party_id: String,
    pub desired_party_name: String,
    pub offered_card_id: String,
    pub desired_card_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TradeConcluded {
    pub message: String,
    pub updated_inventory_offerer: Vec<Card>,
    pub updated_inventory_desired: Vec<Card>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FindCardBody {
    pub cliente_id: String,
    pub carta_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FindCardResponse {
    pub encontrada: bool,
    pub carta: Option<Card>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyTradeBody {
    pub cliente_id: String,
    pub carta_desejada_id: String,
    pub carta_oferecida: Card,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyTradeResponse {
    pub status: String,
    pub inventario: Vec<Card>,
}

/// Coordinates a single trade end to end. Only the Host runs this; a
/// Shadow receiving a `TROCAR_CARTAS` command forwards it instead (see
/// [`crate::replication::forward_to_host`]).
pub struct TradeCoordinator<'a> {
    services: &'a Services,
}

impl<'a> TradeCoordinator<'a> {
    pub fn new(services: &'a Services) -> Self {
        TradeCoordinator { services }
    }

    /// Runs the full trade algorithm for `match_id`, serialized against
    /// any concurrent trade in the same match by the per-match trade
    /// mutex.
    pub async fn execute(
        &self,
        match_id: &str,
        req: TradeRequest,
    ) -> Result<TradeConcluded, CardClusterError> {
        let lock = self.services.sessions.trade_lock(match_id);
        let _guard = lock.lock().await;

        let shadow_address = self
            .services
            .sessions
            .with_match(match_id, |m| {
                if m.role != MatchRole::Host {
                    return Err(CardClusterError::msg("trade must run on Host"));
                }
                Ok(m.shadow_address.clone())
            })
            .ok_or_else(|| CardClusterError::msg("unknown match"))??;

        let offered_card = self
            .locate_card(match_id, &shadow_address, &req.offerer_id, &req.offered_card_id)
            .await?;
        let desired_card = self
            .locate_card(
                match_id,
                &shadow_address,
                &req.desired_party_id,
                &req.desired_card_id,
            )
            .await?;

        best_effort(
            "register_trade",
            self.services.ledger.register_trade(
                &req.offerer_id,
                &req.desired_party_id,
                &req.offered_card_id,
                &req.desired_card_id,
            ),
        )
        .await;

        let offerer_inventory = self
            .apply_swap(
                match_id,
                &shadow_address,
                &req.offerer_id,
                &req.offered_card_id,
                desired_card.clone(),
            )
            .await?;
        let desired_inventory = self
            .apply_swap(
                match_id,
                &shadow_address,
                &req.desired_party_id,
                &req.desired_card_id,
                offered_card,
            )
            .await?;

        Ok(TradeConcluded {
            message: "Troca concluída com sucesso.".to_string(),
            updated_inventory_offerer: offerer_inventory,
            updated_inventory_desired: desired_inventory,
        })
    }

    async fn locate_card(
        &self,
        match_id: &str,
        shadow_address: &str,
        player_id: &str,
        card_id: &str,
    ) -> Result<Card, CardClusterError> {
        let local = self.services.sessions.with_match(match_id, |m| {
            m.player_slot(player_id)
                .filter(|p| p.local)
                .and_then(|p| p.inventory.iter().find(|c| c.id == card_id).cloned())
        });
        if let Some(Some(card)) = local {
            return Ok(card);
        }

        let resp: FindCardResponse = self
            .services
            .peer_client
            .post(
                shadow_address,
                "/partida/buscar_carta",
                &FindCardBody {
                    cliente_id: player_id.to_string(),
                    carta_id: card_id.to_string(),
                },
            )
            .await?;
        resp.carta
            .filter(|_| resp.encontrada)
            .ok_or_else(|| CardClusterError::msg("card not found for trade"))
    }

    /// Applies the swap for one side of the trade: removes `remove_id`
    /// and appends `add_card`, locally under the match's mutex or
    /// remotely via the Shadow's `/apply-trade`.
    async fn apply_swap(
        &self,
        match_id: &str,
        shadow_address: &str,
        player_id: &str,
        remove_id: &str,
        add_card: Card,
    ) -> Result<Vec<Card>, CardClusterError> {
        let local_result = self.services.sessions.with_match(match_id, |m| {
            m.player_slot_mut(player_id).filter(|p| p.local).map(|slot| {
                slot.inventory.retain(|c| c.id != remove_id);
                slot.inventory.push(add_card.clone());
                slot.inventory.clone()
            })
        });
        if let Some(Some(inventory)) = local_result {
            return Ok(inventory);
        }

        let resp: ApplyTradeResponse = self
            .services
            .peer_client
            .post(
                shadow_address,
                "/partida/aplicar_troca_local",
                &ApplyTradeBody {
                    cliente_id: player_id.to_string(),
                    carta_desejada_id: remove_id.to_string(),
                    carta_oferecida: add_card,
                },
            )
            .await?;
        Ok(resp.inventario)
    }
}
