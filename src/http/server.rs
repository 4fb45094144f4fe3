//! Inter-server HTTP API (spec §6): peer registry, election, cross-server
//! matchmaking, replication, and per-player trade/lookup endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::cluster::{HeartbeatRequest, LeaderAnnouncement, PeerSnapshot, VoteRequest, VoteResponse};
use crate::dispatch::GameEventRequest;
use crate::fanout::notify_client;
use crate::match_core::{MatchPlayerSlot, MatchRole};
use crate::matchmaker::{RequestOpponentBody, RequestOpponentResponse};
use crate::protocol::Card;
use crate::replication::ReplicateBody;
use crate::services::Services;
use crate::trade::{ApplyTradeBody, ApplyTradeResponse, FindCardBody, FindCardResponse};

type AppState = Arc<Services>;

/// Builds the full inter-server router. Every route here bears a shared
/// cluster JWT per spec; the binary crate layers
/// [`crate::http::require_cluster_jwt`] on top of the router this
/// function returns.
pub fn build_router(services: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/heartbeat", post(heartbeat))
        .route("/servers", get(list_servers))
        .route("/election/vote", post(election_vote))
        .route("/election/leader", post(election_leader))
        .route("/matchmaking/solicitar_oponente", post(request_opponent))
        .route("/game/event", post(game_event))
        .route("/game/replicate", post(game_replicate))
        .route("/game/chat", post(game_chat))
        .route("/partida/notificar_jogador", post(notify_player))
        .route("/partida/aplicar_troca_local", post(apply_trade_local))
        .route("/partida/buscar_carta", post(find_card))
        .route("/estoque/comprar_pacote", post(buy_pack))
        .route("/estoque/status", get(stock_status))
        .with_state(services)
}

#[derive(Deserialize)]
struct RegisterBody {
    endereco: String,
}

async fn register(
    State(services): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Json<PeerSnapshot> {
    services.peers.heartbeat_received(&body.endereco);
    Json(services.peers.snapshot())
}

async fn heartbeat(
    State(services): State<AppState>,
    Json(req): Json<HeartbeatRequest>,
) -> StatusCode {
    services.elector.handle_heartbeat(&req);
    StatusCode::OK
}

async fn list_servers(State(services): State<AppState>) -> Json<PeerSnapshot> {
    Json(services.peers.snapshot())
}

async fn election_vote(
    State(services): State<AppState>,
    Json(req): Json<VoteRequest>,
) -> Json<VoteResponse> {
    Json(services.elector.handle_vote_request(&req))
}

async fn election_leader(
    State(services): State<AppState>,
    Json(ann): Json<LeaderAnnouncement>,
) -> StatusCode {
    services.elector.handle_leader_announcement(&ann);
    StatusCode::OK
}

async fn request_opponent(
    State(services): State<AppState>,
    Json(req): Json<RequestOpponentBody>,
) -> Json<RequestOpponentResponse> {
    let Some(waiter) = services.matchmaker.pop_for_remote() else {
        return Json(RequestOpponentResponse {
            partida_encontrada: false,
            sala_id: None,
            servidor_host: None,
            oponente_id: None,
            oponente_nome: None,
        });
    };

    let match_id = format!("match-{}-{}", waiter.id, req.solicitante_id);
    let host_slot = MatchPlayerSlot::new(waiter.id.clone(), waiter.name.clone(), true);
    let shadow_slot =
        MatchPlayerSlot::new(req.solicitante_id.clone(), req.solicitante_nome.clone(), false);
    let m = crate::match_core::Match::new(
        match_id.clone(),
        MatchRole::Host,
        services.self_address.clone(),
        req.servidor_origem.clone(),
        host_slot,
        shadow_slot,
    );
    services.sessions.insert_match(m);

    let _ = notify_client(
        services.broker.as_ref(),
        &waiter.id,
        "PARTIDA_ENCONTRADA",
        &serde_json::json!({
            "salaID": match_id,
            "oponenteID": req.solicitante_id,
            "oponenteNome": req.solicitante_nome,
        }),
    )
    .await;

    Json(RequestOpponentResponse {
        partida_encontrada: true,
        sala_id: Some(match_id),
        servidor_host: Some(services.self_address.clone()),
        oponente_id: Some(waiter.id),
        oponente_nome: Some(waiter.name),
    })
}

async fn game_event(
    State(services): State<AppState>,
    Json(req): Json<GameEventRequest>,
) -> StatusCode {
    match crate::dispatch::dispatch_match_command(
        &services,
        &req.match_id,
        &req.player_id,
        &req.player_name,
        req.command,
    )
    .await
    {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            log::warn!("/game/event failed for {}: {}", req.match_id, e);
            crate::dispatch::notify_command_error(
                &services,
                &req.match_id,
                &req.player_id,
                &e.to_string(),
            )
            .await;
            StatusCode::CONFLICT
        }
    }
}

async fn game_replicate(
    State(services): State<AppState>,
    Json(body): Json<ReplicateBody>,
) -> StatusCode {
    let result = services.sessions.with_match(&body.match_id, |m| {
        m.apply_snapshot(&services.cluster_secret, body.state.clone())
    });
    match result {
        Some(Ok(())) => {
            let mut notified_ok = crate::fanout::notify_match(
                services.broker.as_ref(),
                &body.match_id,
                "ATUALIZACAO_JOGO",
                &body.state,
            )
            .await
            .is_ok();
            if !notified_ok {
                log::warn!("shadow-side match notify for {} failed", body.match_id);
            }
            if body.state.phase == crate::match_core::MatchPhase::Finished {
                let payload = serde_json::json!({"resultado": format!("{:?}", body.state.last_winner)});
                let end_notified_ok = crate::fanout::notify_match(
                    services.broker.as_ref(),
                    &body.match_id,
                    "FIM_DE_JOGO",
                    &payload,
                )
                .await
                .is_ok();
                if !end_notified_ok {
                    log::warn!("shadow-side match-end notify for {} failed", body.match_id);
                }
                notified_ok &= end_notified_ok;
                if notified_ok {
                    services.sessions.remove_match(&body.match_id);
                }
            }
            StatusCode::OK
        }
        Some(Err(e)) => {
            log::debug!("replicate rejected for {}: {}", body.match_id, e);
            StatusCode::CONFLICT
        }
        None => StatusCode::NOT_FOUND,
    }
}

#[derive(Deserialize)]
struct ChatRelayBody {
    sala_id: String,
    nome_jogador: String,
    texto: String,
}

async fn game_chat(
    State(services): State<AppState>,
    Json(body): Json<ChatRelayBody>,
) -> StatusCode {
    let payload = serde_json::json!({"jogador_id": body.nome_jogador, "texto": body.texto});
    match crate::fanout::notify_match(
        services.broker.as_ref(),
        &body.sala_id,
        "CHAT_RECEBIDO",
        &payload,
    )
    .await
    {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Deserialize)]
struct NotifyPlayerBody {
    cliente_id: String,
    comando: String,
    mensagem: serde_json::Value,
}

async fn notify_player(
    State(services): State<AppState>,
    Json(body): Json<NotifyPlayerBody>,
) -> StatusCode {
    match notify_client(
        services.broker.as_ref(),
        &body.cliente_id,
        &body.comando,
        &body.mensagem,
    )
    .await
    {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn apply_trade_local(
    State(services): State<AppState>,
    Json(body): Json<ApplyTradeBody>,
) -> Result<Json<ApplyTradeResponse>, StatusCode> {
    let updated = services.sessions.match_for_player(&body.cliente_id).and_then(|match_id| {
        services.sessions.with_match(&match_id, |m| {
            m.player_slot_mut(&body.cliente_id).map(|slot| {
                slot.inventory.retain(|c| c.id != body.carta_desejada_id);
                slot.inventory.push(body.carta_oferecida.clone());
                slot.inventory.clone()
            })
        })
    });
    match updated.flatten() {
        Some(inventario) => Ok(Json(ApplyTradeResponse {
            status: "ok".to_string(),
            inventario,
        })),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn find_card(
    State(services): State<AppState>,
    Json(body): Json<FindCardBody>,
) -> Json<FindCardResponse> {
    let found: Option<Card> = services
        .sessions
        .match_for_player(&body.cliente_id)
        .and_then(|match_id| {
            services.sessions.with_match(&match_id, |m| {
                m.player_slot(&body.cliente_id)
                    .and_then(|p| p.inventory.iter().find(|c| c.id == body.carta_id).cloned())
            })
        })
        .flatten();
    Json(FindCardResponse {
        encontrada: found.is_some(),
        carta: found,
    })
}

#[derive(Deserialize)]
struct BuyPackBody {
    cliente_id: String,
}

#[derive(Serialize)]
struct BuyPackResponse {
    pacote: Vec<Card>,
}

async fn buy_pack(
    State(services): State<AppState>,
    Json(body): Json<BuyPackBody>,
) -> Result<Json<BuyPackResponse>, StatusCode> {
    let _ = &body.cliente_id;
    match services.draw_pack(services.config.pack_size).await {
        Ok(pacote) => Ok(Json(BuyPackResponse { pacote })),
        Err(e) => {
            log::warn!("buy_pack failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

async fn stock_status(
    State(services): State<AppState>,
) -> Result<Json<crate::stock::StockStatus>, StatusCode> {
    if !services.elector.is_leader() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(services.stock.status()))
}
