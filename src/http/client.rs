//! Outbound HTTP calls to peer servers, bearing a signed JWT on every
//! request.

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::cluster::{HeartbeatRequest, LeaderAnnouncement, VoteRequest, VoteResponse};
use crate::utils::{issue_jwt, CardClusterError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Thin wrapper over [`reqwest::Client`] that attaches a freshly-issued
/// bearer JWT to every inter-server call.
#[derive(Clone)]
pub struct PeerClient {
    http: Client,
    cluster_secret: String,
    self_id: String,
}

impl PeerClient {
    pub fn new(cluster_secret: String) -> Self {
        PeerClient {
            http: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("reqwest client builds with default TLS backend"),
            cluster_secret,
            self_id: "unidentified".to_string(),
        }
    }

    pub fn with_self_id(mut self, self_id: String) -> Self {
        self.self_id = self_id;
        self
    }

    fn bearer(&self) -> Result<String, CardClusterError> {
        issue_jwt(&self.self_id, &self.cluster_secret, 24 * 3600)
    }

    async fn post_json<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        base: &str,
        path: &str,
        body: &Req,
    ) -> Result<Resp, CardClusterError> {
        let token = self.bearer()?;
        let resp = self
            .http
            .post(format!("{}{}", base, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CardClusterError::msg(format!(
                "peer {} responded {} to {}",
                base,
                resp.status(),
                path
            )));
        }
        Ok(resp.json::<Resp>().await?)
    }

    pub async fn register(
        &self,
        base: &str,
        endereco: &str,
    ) -> Result<crate::cluster::PeerSnapshot, CardClusterError> {
        #[derive(serde::Serialize)]
        struct Body<'a> {
            endereco: &'a str,
        }
        self.post_json(base, "/register", &Body { endereco }).await
    }

    pub async fn heartbeat(
        &self,
        base: &str,
        req: &HeartbeatRequest,
    ) -> Result<(), CardClusterError> {
        let _: serde_json::Value =
            self.post_json(base, "/heartbeat", req).await?;
        Ok(())
    }

    pub async fn request_vote(
        &self,
        base: &str,
        req: &VoteRequest,
    ) -> Result<VoteResponse, CardClusterError> {
        self.post_json(base, "/election/vote", req).await
    }

    pub async fn announce_leader(
        &self,
        base: &str,
        ann: &LeaderAnnouncement,
    ) -> Result<(), CardClusterError> {
        let _: serde_json::Value =
            self.post_json(base, "/election/leader", ann).await?;
        Ok(())
    }

    pub async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        base: &str,
        path: &str,
        body: &Req,
    ) -> Result<Resp, CardClusterError> {
        self.post_json(base, path, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_issues_valid_token() {
        let c = PeerClient::new("secret".into()).with_self_id("srv-a".into());
        let tok = c.bearer().unwrap();
        assert!(!tok.is_empty());
    }
}
