//! C8 -- NotificationFanout: per-client and per-match updates delivered
//! via the pub/sub bus, including cross-server relay for matches that
//! span two servers.

use serde::Serialize;

use crate::broker::Broker;
use crate::http::PeerClient;
use crate::protocol::Envelope;
use crate::utils::CardClusterError;

/// Publishes a command+payload to a client's own events topic.
pub async fn notify_client<T: Serialize>(
    broker: &dyn Broker,
    client_id: &str,
    command: &str,
    data: &T,
) -> Result<(), CardClusterError> {
    let envelope = Envelope::new(command, data)?;
    broker
        .publish(&format!("clients/{}/events", client_id), &envelope)
        .await
}

/// Publishes a command+payload to a match's shared events topic, reaching
/// whichever clients are connected to this server's broker.
pub async fn notify_match<T: Serialize>(
    broker: &dyn Broker,
    match_id: &str,
    command: &str,
    data: &T,
) -> Result<(), CardClusterError> {
    let envelope = Envelope::new(command, data)?;
    broker
        .publish(&format!("matches/{}/events", match_id), &envelope)
        .await
}

/// For a remote player of a cross-server match, the Host additionally
/// POSTs the same message to the Shadow's `/notify-player` endpoint so
/// the Shadow can deliver it on its own broker, under the same command
/// tag the Host would have used locally.
pub async fn relay_notify_player<T: Serialize + Sync>(
    client: &PeerClient,
    shadow_address: &str,
    remote_client_id: &str,
    command: &str,
    message: &T,
) -> Result<(), CardClusterError> {
    #[derive(Serialize)]
    struct Body<'a, T> {
        cliente_id: &'a str,
        comando: &'a str,
        mensagem: &'a T,
    }
    let _: serde_json::Value = client
        .post(
            shadow_address,
            "/partida/notificar_jogador",
            &Body {
                cliente_id: remote_client_id,
                comando: command,
                mensagem: message,
            },
        )
        .await?;
    Ok(())
}

/// Relays a chat line to the Shadow, which re-publishes it on its own
/// broker's match topic.
pub async fn relay_chat(
    client: &PeerClient,
    shadow_address: &str,
    match_id: &str,
    player_name: &str,
    text: &str,
) -> Result<(), CardClusterError> {
    #[derive(Serialize)]
    struct Body<'a> {
        sala_id: &'a str,
        nome_jogador: &'a str,
        texto: &'a str,
    }
    let _: serde_json::Value = client
        .post(
            shadow_address,
            "/game/chat",
            &Body {
                sala_id: match_id,
                nome_jogador: player_name,
                texto: text,
            },
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::RecordingBroker;

    #[tokio::test]
    async fn notify_client_publishes_to_client_topic() {
        let broker = RecordingBroker::default();
        notify_client(&broker, "p1", "LOGIN_OK", &serde_json::json!({})).await.unwrap();
        let published = broker.published.lock().unwrap();
        assert_eq!(published[0].0, "clients/p1/events");
    }

    #[tokio::test]
    async fn notify_match_publishes_to_match_topic() {
        let broker = RecordingBroker::default();
        notify_match(&broker, "m1", "ATUALIZACAO_JOGO", &serde_json::json!({})).await.unwrap();
        let published = broker.published.lock().unwrap();
        assert_eq!(published[0].0, "matches/m1/events");
    }
}
