//! Scripted smoke-test client: logs in, joins the matchmaking queue, buys
//! a pack, and plays cards as they arrive, printing a running line of
//! statistics in the same spirit as a load-testing driver.

use std::time::Duration;

use cardcluster::CardClusterError;
use clap::Parser;
use rand::seq::SliceRandom;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "cardcluster_client")]
struct Args {
    /// Pub/sub broker address (host:port).
    #[arg(long, env = "BROKER_URL", default_value = "127.0.0.1:1883")]
    broker_url: String,

    /// Display name to log in with.
    #[arg(long, default_value = "smoke-tester")]
    name: String,

    /// How long to run before giving up on the session, in seconds.
    #[arg(long, default_value_t = 60)]
    timeout_s: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    command: String,
    data: Value,
}

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    command: &'a str,
    data: T,
}

struct Session {
    client: AsyncClient,
    rx: mpsc::UnboundedReceiver<(String, Envelope)>,
    client_id: String,
}

impl Session {
    async fn publish(
        &self,
        topic: &str,
        command: &str,
        data: impl Serialize,
    ) -> Result<(), CardClusterError> {
        let envelope = EnvelopeOut { command, data };
        let payload = serde_json::to_vec(&envelope)?;
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| CardClusterError::msg(format!("publish to {} failed: {}", topic, e)))
    }

    /// Waits for the next envelope whose topic ends with `topic_suffix`,
    /// up to `timeout`.
    async fn wait_for(
        &mut self,
        topic_suffix: &str,
        timeout: Duration,
    ) -> Result<Envelope, CardClusterError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CardClusterError::msg(format!(
                    "timed out waiting for a message on {}",
                    topic_suffix
                )));
            }
            match tokio::time::timeout(remaining, self.rx.recv()).await {
                Ok(Some((topic, env))) if topic.ends_with(topic_suffix) => return Ok(env),
                Ok(Some(_)) => continue,
                Ok(None) => {
                    return Err(CardClusterError::msg("broker event loop closed"));
                }
                Err(_) => {
                    return Err(CardClusterError::msg(format!(
                        "timed out waiting for a message on {}",
                        topic_suffix
                    )));
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CardClusterError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init()
        .ok();

    let args = Args::parse();
    let overall_timeout = Duration::from_secs(args.timeout_s);
    let start = Instant::now();

    let temp_id: String = random_id();
    let (host, port) = args
        .broker_url
        .rsplit_once(':')
        .ok_or_else(|| CardClusterError::msg("broker url must be host:port"))?;
    let port: u16 = port
        .parse()
        .map_err(|_| CardClusterError::msg("invalid broker port"))?;
    let mut opts = MqttOptions::new(format!("smoke-{}", temp_id), host, port);
    opts.set_keep_alive(Duration::from_secs(15));
    let (client, mut eventloop) = AsyncClient::new(opts, 64);

    let (tx, rx) = mpsc::unbounded_channel();
    client
        .subscribe(format!("clients/{}/events", temp_id), QoS::AtLeastOnce)
        .await
        .map_err(CardClusterError::from)?;
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(p))) => {
                    if let Ok(env) = serde_json::from_slice::<Envelope>(&p.payload) {
                        if tx.send((p.topic, env)).is_err() {
                            break;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("mqtt event loop error: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    let mut session = Session {
        client,
        rx,
        client_id: String::new(),
    };

    session
        .publish(
            &format!("clients/{}/login", temp_id),
            "LOGIN",
            serde_json::json!({"name": args.name}),
        )
        .await?;
    let login_ok = session.wait_for("/events", overall_timeout).await?;
    session.client_id = login_ok
        .data
        .get("clientId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CardClusterError::msg("login response missing clientId"))?
        .to_string();
    println!(
        "{:>8.2}s  logged in as {}",
        start.elapsed().as_secs_f64(),
        session.client_id
    );

    session
        .client
        .subscribe(format!("clients/{}/events", session.client_id), QoS::AtLeastOnce)
        .await
        .map_err(CardClusterError::from)?;
    session
        .publish(
            &format!("clients/{}/entrar_fila", session.client_id),
            "ENTRAR_FILA",
            serde_json::json!({}),
        )
        .await?;

    let found = session.wait_for("/events", overall_timeout).await?;
    let match_id = found
        .data
        .get("salaID")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CardClusterError::msg("matchmaking response missing salaID"))?
        .to_string();
    println!(
        "{:>8.2}s  matched into {}",
        start.elapsed().as_secs_f64(),
        match_id
    );

    session
        .client
        .subscribe(format!("matches/{}/events", match_id), QoS::AtLeastOnce)
        .await
        .map_err(CardClusterError::from)?;
    session
        .publish(
            &format!("matches/{}/commands", match_id),
            "COMPRAR_PACOTE",
            serde_json::json!({"jogador_id": session.client_id, "jogador_nome": args.name}),
        )
        .await?;

    let pack = session.wait_for("/events", overall_timeout).await?;
    let mut inventory: Vec<Value> = pack
        .data
        .get("cartas")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    println!(
        "{:>8.2}s  drew a pack of {} cards",
        start.elapsed().as_secs_f64(),
        inventory.len()
    );

    let mut rounds_played = 0u32;
    while !inventory.is_empty() && start.elapsed() < overall_timeout {
        let card = inventory.choose(&mut rand::thread_rng()).cloned();
        let Some(card) = card else { break };
        let Some(card_id) = card.get("id").and_then(|v| v.as_str()) else {
            break;
        };
        let card_id = card_id.to_string();

        session
            .publish(
                &format!("matches/{}/commands", match_id),
                "JOGAR_CARTA",
                serde_json::json!({
                    "jogador_id": session.client_id,
                    "jogador_nome": args.name,
                    "carta_id": card_id,
                }),
            )
            .await?;
        inventory.retain(|c| c.get("id").and_then(|v| v.as_str()) != Some(card_id.as_str()));
        rounds_played += 1;

        match session.wait_for("/events", Duration::from_secs(10)).await {
            Ok(update) if update.command == "FIM_DE_JOGO" => {
                println!(
                    "{:>8.2}s  match finished: {:?}",
                    start.elapsed().as_secs_f64(),
                    update.data
                );
                break;
            }
            Ok(_) => {
                println!(
                    "{:>8.2}s  round {} played, {} cards remaining",
                    start.elapsed().as_secs_f64(),
                    rounds_played,
                    inventory.len()
                );
            }
            Err(e) => {
                log::debug!("no update after playing {}: {}", card_id, e);
            }
        }
    }

    Ok(())
}

fn random_id() -> String {
    use rand::Rng;
    let n: u64 = rand::thread_rng().gen();
    format!("{:x}", n)
}
