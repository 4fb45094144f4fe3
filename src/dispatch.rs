//! The routing glue described in spec component C4: takes an inbound
//! match command, decides whether this node applies it locally (Host) or
//! forwards it (Shadow), and fans the result out. Shared by the local
//! broker-subscription handler and the `/game/event` Shadow-to-Host
//! HTTP entry point so both paths produce identical behavior.

use serde::{Deserialize, Serialize};

use crate::fanout::{notify_client, notify_match, relay_chat, relay_notify_player};
use crate::ledger::best_effort;
use crate::match_core::{AppliedUpdate, MatchRole};
use crate::protocol::Command;
use crate::replication::{forward_to_host, replicate_to_shadow};
use crate::services::Services;
use crate::trade::{TradeCoordinator, TradeRequest};
use crate::utils::CardClusterError;

/// Body posted by a Shadow to the Host's `/game/event` when forwarding a
/// command originated by its local player.
#[derive(Debug, Serialize, Deserialize)]
pub struct GameEventRequest {
    pub match_id: String,
    pub player_id: String,
    pub player_name: String,
    pub command: Command,
}

/// Applies `command` from `player_id` against `match_id`, forwarding to
/// the Host when this node is the Shadow, and fanning out notifications
/// on success either way.
pub async fn dispatch_match_command(
    services: &Services,
    match_id: &str,
    player_id: &str,
    player_name: &str,
    command: Command,
) -> Result<(), CardClusterError> {
    let role = services
        .sessions
        .with_match(match_id, |m| m.role)
        .ok_or_else(|| CardClusterError::msg("unknown match"))?;

    if role != MatchRole::Host {
        let host_address = services
            .sessions
            .with_match(match_id, |m| m.host_address.clone())
            .ok_or_else(|| CardClusterError::msg("unknown match"))?;

        let req = GameEventRequest {
            match_id: match_id.to_string(),
            player_id: player_id.to_string(),
            player_name: player_name.to_string(),
            command: command.clone(),
        };
        let forwarded: Result<serde_json::Value, CardClusterError> =
            forward_to_host(&services.peer_client, &host_address, "/game/event", &req)
                .await;
        return match forwarded {
            Ok(_) => Ok(()),
            Err(e) => {
                log::warn!(
                    "host {} unreachable after retries for match {}, promoting: {}",
                    host_address,
                    match_id,
                    e
                );
                promote_and_apply_locally(services, match_id, player_id, player_name, command)
                    .await
            }
        };
    }

    apply_as_host(services, match_id, player_id, command).await
}

async fn promote_and_apply_locally(
    services: &Services,
    match_id: &str,
    player_id: &str,
    player_name: &str,
    command: Command,
) -> Result<(), CardClusterError> {
    let self_address = services.self_address.clone();
    services
        .sessions
        .with_match(match_id, |m| m.promote_to_host(self_address))
        .ok_or_else(|| CardClusterError::msg("unknown match"))?;

    notify_match(
        services.broker.as_ref(),
        match_id,
        "ATUALIZACAO_JOGO",
        &serde_json::json!({"status": "match continues on backup server"}),
    )
    .await?;

    apply_as_host(services, match_id, player_id, command).await?;
    let _ = player_name;
    Ok(())
}

async fn apply_as_host(
    services: &Services,
    match_id: &str,
    player_id: &str,
    command: Command,
) -> Result<(), CardClusterError> {
    match command {
        Command::BuyPack => {
            let pack = services.draw_pack(services.config.pack_size).await?;
            best_effort(
                "mint_pack",
                services.ledger.mint_pack(player_id, &pack),
            )
            .await;

            let pack_size = pack.len();
            let update = services
                .sessions
                .with_match(match_id, |m| -> Result<AppliedUpdate, CardClusterError> {
                    if let Some(slot) = m.player_slot_mut(player_id) {
                        slot.inventory.extend(pack.clone());
                    }
                    m.apply_ready(&services.cluster_secret, player_id, pack_size)
                })
                .ok_or_else(|| CardClusterError::msg("unknown match"))??;

            notify_client_pack_result(services, player_id, &pack).await?;
            fan_out_update(services, match_id, &update).await;
        }
        Command::PlayCard { carta_id } => {
            let update = services
                .sessions
                .with_match(match_id, |m| {
                    m.apply_card_played(&services.cluster_secret, player_id, &carta_id)
                })
                .ok_or_else(|| CardClusterError::msg("unknown match"))??;
            fan_out_update(services, match_id, &update).await;
            if let Some(outcome) = &update.match_finished {
                let winner_id = match outcome {
                    crate::match_core::MatchOutcome::Winner(id) => Some(id.clone()),
                    crate::match_core::MatchOutcome::Draw => None,
                };
                best_effort(
                    "record_match_outcome",
                    services
                        .ledger
                        .record_match_outcome(match_id, winner_id.as_deref()),
                )
                .await;
            }
        }
        Command::Chat { texto } => {
            let shadow_address = services
                .sessions
                .with_match(match_id, |m| {
                    m.log_chat(&services.cluster_secret, player_id, &texto)?;
                    Ok::<_, CardClusterError>(m.shadow_address.clone())
                })
                .ok_or_else(|| CardClusterError::msg("unknown match"))??;

            notify_match(
                services.broker.as_ref(),
                match_id,
                "CHAT_RECEBIDO",
                &serde_json::json!({"jogador_id": player_id, "texto": texto}),
            )
            .await?;

            if shadow_address != services.self_address {
                if let Err(e) =
                    relay_chat(&services.peer_client, &shadow_address, match_id, player_id, &texto)
                        .await
                {
                    log::warn!("chat relay to {} failed: {}", shadow_address, e);
                }
            }
        }
        Command::TradeCards {
            oferecida_id,
            desejada_id,
            jogador_desejado_id,
        } => {
            let desired_party_id = jogador_desejado_id;
            let coordinator = TradeCoordinator::new(services);
            let result = coordinator
                .execute(
                    match_id,
                    TradeRequest {
                        offerer_id: player_id.to_string(),
                        offerer_name: String::new(),
                        desired_party_id: desired_party_id.clone(),
                        desired_party_name: String::new(),
                        offered_card_id: oferecida_id,
                        desired_card_id: desejada_id,
                    },
                )
                .await?;

            notify_trade_result(
                services,
                match_id,
                player_id,
                &result.message,
                &result.updated_inventory_offerer,
            )
            .await;
            notify_trade_result(
                services,
                match_id,
                &desired_party_id,
                &result.message,
                &result.updated_inventory_desired,
            )
            .await;
        }
    }
    Ok(())
}

async fn notify_client_pack_result(
    services: &Services,
    player_id: &str,
    pack: &[crate::protocol::Card],
) -> Result<(), CardClusterError> {
    notify_client(
        services.broker.as_ref(),
        player_id,
        "PACOTE_RESULTADO",
        &serde_json::json!({"cartas": pack, "estoqueRestante": services.stock.status()}),
    )
    .await
}

/// Delivers a private, per-player update: directly on this node's broker
/// when the player is local, relayed to the Shadow's broker otherwise.
async fn notify_player(
    services: &Services,
    match_id: &str,
    player_id: &str,
    command: &str,
    payload: &serde_json::Value,
) {
    let found = services.sessions.with_match(match_id, |m| {
        (m.player_slot(player_id).map(|p| p.local), m.shadow_address.clone())
    });
    let Some((local, shadow_address)) = found else {
        return;
    };
    if local.unwrap_or(true) {
        if let Err(e) = notify_client(services.broker.as_ref(), player_id, command, payload).await {
            log::warn!("private notify to {} failed: {}", player_id, e);
        }
    } else if let Err(e) =
        relay_notify_player(&services.peer_client, &shadow_address, player_id, command, payload)
            .await
    {
        log::warn!("relay notify to {} via {} failed: {}", player_id, shadow_address, e);
    }
}

async fn notify_trade_result(
    services: &Services,
    match_id: &str,
    player_id: &str,
    message: &str,
    updated_inventory: &[crate::protocol::Card],
) {
    let payload = serde_json::json!({"message": message, "updatedInventory": updated_inventory});
    notify_player(services, match_id, player_id, "TROCA_CONCLUIDA", &payload).await;
}

/// Delivers a private `ERRO_JOGADA` to the player whose command was
/// rejected, whether they're local to this node or on the other side of
/// a cross-server match. Falls back to a direct local publish when the
/// match itself is unknown here (the player is still the one who just
/// published the command on this node's broker).
pub async fn notify_command_error(services: &Services, match_id: &str, player_id: &str, message: &str) {
    let payload = serde_json::json!({"mensagem": message});
    let found = services.sessions.with_match(match_id, |m| {
        (m.player_slot(player_id).map(|p| p.local), m.shadow_address.clone())
    });
    match found {
        Some((Some(false), shadow_address)) => {
            if let Err(e) = relay_notify_player(
                &services.peer_client,
                &shadow_address,
                player_id,
                "ERRO_JOGADA",
                &payload,
            )
            .await
            {
                log::warn!("relay error-notify to {} via {} failed: {}", player_id, shadow_address, e);
            }
        }
        _ => {
            if let Err(e) =
                notify_client(services.broker.as_ref(), player_id, "ERRO_JOGADA", &payload).await
            {
                log::warn!("private error-notify to {} failed: {}", player_id, e);
            }
        }
    }
}

async fn fan_out_update(services: &Services, match_id: &str, update: &AppliedUpdate) {
    let mut notified_ok = notify_match(
        services.broker.as_ref(),
        match_id,
        "ATUALIZACAO_JOGO",
        &update.snapshot,
    )
    .await
    .is_ok();
    if !notified_ok {
        log::warn!("match notify for {} failed", match_id);
    }

    let shadow_address = update_shadow_address(services, match_id);
    if let Some(shadow_address) = shadow_address {
        if shadow_address != services.self_address {
            replicate_to_shadow(&services.peer_client, &shadow_address, &update.snapshot).await;
        }
    }

    if let Some(outcome) = &update.match_finished {
        let payload = serde_json::json!({"resultado": format!("{:?}", outcome)});
        let end_notified_ok =
            notify_match(services.broker.as_ref(), match_id, "FIM_DE_JOGO", &payload)
                .await
                .is_ok();
        if !end_notified_ok {
            log::warn!("match-end notify for {} failed", match_id);
        }
        notified_ok &= end_notified_ok;

        if notified_ok {
            services.sessions.remove_match(match_id);
        }
    }
}

fn update_shadow_address(services: &Services, match_id: &str) -> Option<String> {
    services.sessions.with_match(match_id, |m| m.shadow_address.clone())
}
