//! Process-wide state, constructed once at startup and threaded through
//! every handler by reference rather than via static singletons.

use std::sync::Arc;

use serde::Deserialize;

use crate::broker::Broker;
use crate::cluster::{LeaderElector, PeerRegistry};
use crate::http::PeerClient;
use crate::ledger::{HttpLedgerClient, LedgerClient, NullLedger};
use crate::matchmaker::Matchmaker;
use crate::session::SessionRegistry;
use crate::stock::StockAuthority;
use crate::utils::CardClusterError;

/// Protocol tunables not tied to identity or network plumbing: heartbeat
/// interval, pack size, retry/backoff counts. Every field has a default
/// so a config-free run still boots a single-node cluster.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_pack_size")]
    pub pack_size: usize,
    #[serde(default = "default_forward_retries")]
    pub forward_retries: u32,
    #[serde(default = "default_replication_retries")]
    pub replication_retries: u32,
    #[serde(default = "default_prober_interval_secs")]
    pub prober_interval_secs: u64,
}

fn default_pack_size() -> usize {
    crate::stock::PACK_SIZE
}
fn default_forward_retries() -> u32 {
    3
}
fn default_replication_retries() -> u32 {
    3
}
fn default_prober_interval_secs() -> u64 {
    5
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            pack_size: default_pack_size(),
            forward_retries: default_forward_retries(),
            replication_retries: default_replication_retries(),
            prober_interval_secs: default_prober_interval_secs(),
        }
    }
}

impl ClusterConfig {
    /// Parses an optional TOML fragment into a `ClusterConfig`, falling
    /// back to defaults for anything the fragment doesn't mention.
    pub fn from_toml(config_str: Option<&str>) -> Result<Self, CardClusterError> {
        crate::utils::parse_toml_config(config_str)
    }
}

/// Everything a handler needs, bundled once at startup. Cloning is cheap
/// (everything inside is an `Arc`).
#[derive(Clone)]
pub struct Services {
    pub self_id: String,
    pub self_address: String,
    pub cluster_secret: String,
    pub config: ClusterConfig,
    pub peers: Arc<PeerRegistry>,
    pub elector: Arc<LeaderElector>,
    pub stock: Arc<StockAuthority>,
    pub sessions: Arc<SessionRegistry>,
    pub matchmaker: Arc<Matchmaker>,
    pub broker: Arc<dyn Broker>,
    pub ledger: Arc<dyn LedgerClient>,
    pub peer_client: PeerClient,
}

impl Services {
    /// Builds the process-wide `Services` value. `ledger_url` being
    /// `None` selects `NullLedger`, so absent ledger configuration
    /// disables ledger interaction without disabling the game.
    pub fn new(
        self_id: String,
        self_address: String,
        cluster_secret: String,
        peer_addresses: Vec<String>,
        broker: Arc<dyn Broker>,
        ledger_url: Option<String>,
        config: ClusterConfig,
    ) -> Self {
        let peers = Arc::new(PeerRegistry::new(self_address.clone(), &peer_addresses));
        let peer_client =
            PeerClient::new(cluster_secret.clone()).with_self_id(self_id.clone());
        let elector = Arc::new(LeaderElector::new(
            self_address.clone(),
            peers.clone(),
            peer_client.clone(),
        ));
        let ledger: Arc<dyn LedgerClient> = match ledger_url {
            Some(url) => Arc::new(HttpLedgerClient::new(url)),
            None => Arc::new(NullLedger),
        };
        Services {
            self_id,
            self_address,
            cluster_secret,
            config,
            peers,
            elector,
            stock: Arc::new(StockAuthority::new()),
            sessions: Arc::new(SessionRegistry::new()),
            matchmaker: Arc::new(Matchmaker::new()),
            broker,
            ledger,
            peer_client,
        }
    }

    /// Draws a pack locally if this node is the leader, otherwise proxies
    /// the draw to the known leader over HTTP.
    pub async fn draw_pack(
        &self,
        pack_size: usize,
    ) -> Result<Vec<crate::protocol::Card>, CardClusterError> {
        if self.elector.is_leader() {
            return Ok(self.stock.draw_pack(pack_size));
        }
        let leader = self
            .elector
            .known_leader()
            .ok_or_else(|| CardClusterError::msg("no known leader"))?;
        #[derive(serde::Serialize)]
        struct Req {
            cliente_id: String,
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            pacote: Vec<crate::protocol::Card>,
        }
        let resp: Resp = self
            .peer_client
            .post(
                &leader,
                "/estoque/comprar_pacote",
                &Req {
                    cliente_id: self.self_id.clone(),
                },
            )
            .await?;
        Ok(resp.pacote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_boots_without_a_fragment() {
        let cfg = ClusterConfig::default();
        assert_eq!(cfg.pack_size, crate::stock::PACK_SIZE);
        assert_eq!(cfg.forward_retries, 3);
    }
}
