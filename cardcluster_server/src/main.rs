//! Card-cluster server node executable: one peer in the cluster, running
//! the full ambient stack (peer registry, leader election, matchmaking,
//! match core) behind an HTTP inter-server API and an MQTT client-facing
//! bus.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use clap::Parser;
use tokio::sync::mpsc;

use cardcluster::{
    build_router, logger_init, require_cluster_jwt, Broker, ClusterConfig,
    Command, Envelope, Match, MatchPlayerSlot, MatchRole, MqttBroker, Player, Services, Waiter,
};

/// Command-line flags, falling back to the identically-named environment
/// variables.
#[derive(Parser, Debug)]
#[command(name = "cardcluster_server")]
struct Args {
    /// This node's stable identifier.
    #[arg(long, env = "SERVER_ID")]
    server_id: String,

    /// This node's own address as advertised to peers (host:port).
    #[arg(long, env = "SELF_ADDRESS")]
    self_address: String,

    /// Comma-separated list of initial peer addresses.
    #[arg(long, env = "PEERS", default_value = "")]
    peers: String,

    /// Address the HTTP server listens on.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: SocketAddr,

    /// Pub/sub broker address (host:port).
    #[arg(long, env = "BROKER_URL", default_value = "127.0.0.1:1883")]
    broker_url: String,

    /// Shared cluster secret for JWT and event HMACs.
    #[arg(long, env = "CLUSTER_SECRET", default_value = "dev-secret-change-me")]
    cluster_secret: String,

    /// Optional ledger RPC base URL; unset disables ledger interaction.
    #[arg(long, env = "LEDGER_URL")]
    ledger_url: Option<String>,

    /// Optional protocol-tunable TOML fragment (heartbeat interval, pack
    /// size, retry counts).
    #[arg(long, env = "CLUSTER_CONFIG_TOML")]
    config_toml: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logger_init(&args.server_id);

    let config = ClusterConfig::from_toml(args.config_toml.as_deref())?;

    let peer_addresses: Vec<String> = args
        .peers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let broker: Arc<dyn Broker> =
        Arc::new(MqttBroker::connect(&args.broker_url, &args.server_id, tx)?);

    let services = Arc::new(Services::new(
        args.server_id.clone(),
        args.self_address.clone(),
        args.cluster_secret.clone(),
        peer_addresses.clone(),
        broker.clone(),
        args.ledger_url.clone(),
        config,
    ));

    broker.subscribe("clients/+/login").await?;
    broker.subscribe("clients/+/entrar_fila").await?;
    broker.subscribe("matches/+/commands").await?;

    bootstrap_peers(&services, &peer_addresses).await;
    spawn_background_loops(services.clone());

    {
        let services = services.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = handle_topic_event(&services, event).await {
                    log::warn!("topic handler error: {}", e);
                }
            }
        });
    }

    let app = build_router(services.clone())
        .layer(middleware::from_fn_with_state(services.clone(), require_cluster_jwt));

    log::info!("{} listening on {}", args.server_id, args.listen_addr);
    let listener = tokio::net::TcpListener::bind(args.listen_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn bootstrap_peers(services: &Services, peer_addresses: &[String]) {
    for peer in peer_addresses {
        match services.peer_client.register(peer, &services.self_address).await {
            Ok(snapshot) => services.peers.merge(&snapshot),
            Err(e) => log::debug!("bootstrap register with {} failed: {}", peer, e),
        }
    }
}

fn spawn_background_loops(services: Arc<Services>) {
    {
        let services = services.clone();
        tokio::spawn(async move {
            services.elector.initial_delay().await;
            let mut ticker =
                tokio::time::interval(cardcluster::LeaderElector::heartbeat_interval());
            loop {
                ticker.tick().await;
                services.peers.sweep_suspects();
                services.elector.maybe_trigger_election().await;
                if services.elector.is_leader() {
                    services.elector.bcast_heartbeats().await;
                }
            }
        });
    }

    {
        let services = services.clone();
        tokio::spawn(async move {
            let interval = Duration::from_secs(services.config.prober_interval_secs);
            loop {
                tokio::time::sleep(interval).await;
                let Some(waiter) = services.matchmaker.pop_for_remote() else {
                    continue;
                };
                let player = Player {
                    id: waiter.id.clone(),
                    name: waiter.name.clone(),
                    wallet_address: None,
                    inventory: Vec::new(),
                };
                let peers = services.peers.peer_addresses();
                match services
                    .matchmaker
                    .probe_peers(&player, &services.self_address, peers, &services.peer_client)
                    .await
                {
                    Ok(Some(resp)) => {
                        if let Err(e) = start_shadow_match(&services, waiter, resp).await {
                            log::warn!("failed to set up cross-server match: {}", e);
                        }
                    }
                    Ok(None) => {
                        // no peer had an opponent; put the waiter back
                        services.matchmaker.join(waiter);
                    }
                    Err(e) => {
                        log::debug!("cross-server probe failed: {}", e);
                        services.matchmaker.join(waiter);
                    }
                }
            }
        });
    }
}

/// A cross-server pairing succeeded: this node's own waiter becomes the
/// Shadow's local player of a new match hosted on the peer that answered
/// the probe. Mirrors `request_opponent`'s match construction on the
/// other side, with local/remote swapped.
async fn start_shadow_match(
    services: &Services,
    waiter: Waiter,
    resp: cardcluster::RequestOpponentResponse,
) -> Result<(), Box<dyn std::error::Error>> {
    let match_id = resp.sala_id.ok_or("cross-server pairing missing sala_id")?;
    let host_address = resp
        .servidor_host
        .ok_or("cross-server pairing missing servidor_host")?;
    let opponent_id = resp.oponente_id.ok_or("cross-server pairing missing oponente_id")?;
    let opponent_name = resp
        .oponente_nome
        .ok_or("cross-server pairing missing oponente_nome")?;

    // The Host's turn_owner is its own local waiter's id, so the Shadow's
    // copy must place that same player first to keep turn order in sync.
    let host_local_slot = MatchPlayerSlot::new(opponent_id.clone(), opponent_name.clone(), false);
    let our_local_slot = MatchPlayerSlot::new(waiter.id.clone(), waiter.name.clone(), true);
    let m = Match::new(
        match_id.clone(),
        MatchRole::Shadow,
        host_address,
        services.self_address.clone(),
        host_local_slot,
        our_local_slot,
    );
    services.sessions.insert_match(m);

    let envelope = Envelope::new(
        "PARTIDA_ENCONTRADA",
        &serde_json::json!({
            "salaID": match_id,
            "oponenteID": opponent_id,
            "oponenteNome": opponent_name,
        }),
    )?;
    services
        .broker
        .publish(&format!("clients/{}/events", waiter.id), &envelope)
        .await?;
    Ok(())
}

async fn handle_topic_event(
    services: &Services,
    event: cardcluster::TopicEvent,
) -> Result<(), Box<dyn std::error::Error>> {
    let parts: Vec<&str> = event.topic.split('/').collect();
    match parts.as_slice() {
        ["clients", temp_id, "login"] => {
            #[derive(serde::Deserialize)]
            struct LoginData {
                name: String,
            }
            let data: LoginData = serde_json::from_value(event.envelope.data)?;
            let player = services.sessions.login(data.name);
            let envelope = Envelope::new(
                "LOGIN_OK",
                &serde_json::json!({"clientId": player.id, "server": services.self_id}),
            )?;
            services
                .broker
                .publish(&format!("clients/{}/events", temp_id), &envelope)
                .await?;
        }
        ["clients", client_id, "entrar_fila"] => {
            let player = services
                .sessions
                .get_client(client_id)
                .ok_or("unknown client joining queue")?;
            let waiter = Waiter {
                id: player.id.clone(),
                name: player.name.clone(),
            };
            if services.matchmaker.join(waiter).is_none() {
                let envelope = Envelope::new("AGUARDANDO_OPONENTE", &serde_json::json!({}))?;
                services
                    .broker
                    .publish(&format!("clients/{}/events", client_id), &envelope)
                    .await?;
            }
        }
        ["matches", match_id, "commands"] => {
            let data = event.envelope.data;
            let player_id = data
                .get("jogador_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let player_name = data
                .get("jogador_nome")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let command: Command = serde_json::from_value(serde_json::json!({
                "command": event.envelope.command,
                "data": data,
            }))?;
            if let Err(e) =
                cardcluster::dispatch_match_command(services, match_id, &player_id, &player_name, command)
                    .await
            {
                log::warn!("command from {} on {} rejected: {}", player_id, match_id, e);
                cardcluster::notify_command_error(services, match_id, &player_id, &e.to_string()).await;
            }
        }
        _ => {}
    }
    Ok(())
}

async fn shutdown_signal() {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = std::sync::Mutex::new(Some(tx));
    ctrlc::set_handler(move || {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    })
    .expect("failed to install Ctrl-C handler");
    let _ = rx.await;
    log::info!("shutting down");
}
