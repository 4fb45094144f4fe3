//! C7 -- ReplicationChannel: Host to Shadow event stream with
//! monotonically increasing sequence numbers, and Shadow promotion on
//! Host-unreachable timeout.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::PeerClient;
use crate::match_core::MatchSnapshot;
use crate::utils::CardClusterError;

/// Backoff schedule shared by replication and command-forwarding retries:
/// three attempts at 1s, 2s, 3s.
const BACKOFF: [Duration; 3] =
    [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(3)];

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplicateBody {
    pub match_id: String,
    pub event_seq: u64,
    pub state: MatchSnapshot,
    pub signature: String,
}

/// Posts a snapshot to the Shadow's `/game/replicate`, retrying on the
/// shared backoff schedule. Failure is logged and not retried further:
/// replication is best-effort and never blocks the Host's own progress.
pub async fn replicate_to_shadow(
    client: &PeerClient,
    shadow_address: &str,
    snapshot: &MatchSnapshot,
) {
    let body = ReplicateBody {
        match_id: snapshot.match_id.clone(),
        event_seq: snapshot.event_seq,
        state: snapshot.clone(),
        signature: snapshot.signature.clone(),
    };
    for (attempt, delay) in BACKOFF.iter().enumerate() {
        match client
            .post::<_, serde_json::Value>(shadow_address, "/game/replicate", &body)
            .await
        {
            Ok(_) => return,
            Err(e) => {
                log::warn!(
                    "replication attempt {} to {} failed: {}",
                    attempt + 1,
                    shadow_address,
                    e
                );
                tokio::time::sleep(*delay).await;
            }
        }
    }
    log::warn!(
        "replication to {} exhausted retries for match {} seq {}",
        shadow_address,
        snapshot.match_id,
        snapshot.event_seq
    );
}

/// Forwards a Shadow-originated command to the Host, retrying on the
/// shared backoff schedule. Returns `Err` only after every attempt is
/// exhausted, signaling the caller to invoke promotion.
pub async fn forward_to_host<Req, Resp>(
    client: &PeerClient,
    host_address: &str,
    path: &str,
    body: &Req,
) -> Result<Resp, CardClusterError>
where
    Req: Serialize + Sync,
    Resp: for<'de> Deserialize<'de>,
{
    let mut last_err = None;
    for (attempt, delay) in BACKOFF.iter().enumerate() {
        match client.post(host_address, path, body).await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                log::warn!(
                    "forward attempt {} to host {} failed: {}",
                    attempt + 1,
                    host_address,
                    e
                );
                last_err = Some(e);
                tokio::time::sleep(*delay).await;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| CardClusterError::msg("host unreachable")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_is_linear() {
        assert_eq!(BACKOFF[0], Duration::from_secs(1));
        assert_eq!(BACKOFF[1], Duration::from_secs(2));
        assert_eq!(BACKOFF[2], Duration::from_secs(3));
    }
}
