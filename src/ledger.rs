//! C4.10 -- LedgerClient: an optional, black-boxed smart-contract mirror.
//! The core never depends on a concrete blockchain crate, only this
//! trait; ledger failures are logged and swallowed everywhere they're
//! called.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::protocol::Card;
use crate::utils::CardClusterError;

const LEDGER_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Abstracts the optional on-chain mirror of pack purchases, trades, and
/// match outcomes. Addresses are opaque strings; no gas/ABI details are
/// modeled here (out of scope, see module docs of the crate root).
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn mint_pack(
        &self,
        owner_address: &str,
        cards: &[Card],
    ) -> Result<(), CardClusterError>;

    async fn register_trade(
        &self,
        offerer_address: &str,
        desired_party_address: &str,
        offered_card_id: &str,
        desired_card_id: &str,
    ) -> Result<(), CardClusterError>;

    async fn record_match_outcome(
        &self,
        match_id: &str,
        winner_address: Option<&str>,
    ) -> Result<(), CardClusterError>;
}

/// Used when no ledger endpoint is configured: every call is a no-op.
pub struct NullLedger;

#[async_trait]
impl LedgerClient for NullLedger {
    async fn mint_pack(&self, _owner_address: &str, _cards: &[Card]) -> Result<(), CardClusterError> {
        Ok(())
    }

    async fn register_trade(
        &self,
        _offerer_address: &str,
        _desired_party_address: &str,
        _offered_card_id: &str,
        _desired_card_id: &str,
    ) -> Result<(), CardClusterError> {
        Ok(())
    }

    async fn record_match_outcome(
        &self,
        _match_id: &str,
        _winner_address: Option<&str>,
    ) -> Result<(), CardClusterError> {
        Ok(())
    }
}

/// Posts JSON-RPC-shaped requests to a configured ledger endpoint.
pub struct HttpLedgerClient {
    http: Client,
    base_url: String,
}

impl HttpLedgerClient {
    pub fn new(base_url: String) -> Self {
        HttpLedgerClient {
            http: Client::builder()
                .timeout(LEDGER_CALL_TIMEOUT)
                .build()
                .expect("reqwest client builds with default TLS backend"),
            base_url,
        }
    }

    async fn post<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), CardClusterError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CardClusterError::msg(format!(
                "ledger endpoint {} returned {}",
                path,
                resp.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn mint_pack(
        &self,
        owner_address: &str,
        cards: &[Card],
    ) -> Result<(), CardClusterError> {
        #[derive(Serialize)]
        struct Body<'a> {
            owner_address: &'a str,
            cards: &'a [Card],
        }
        self.post("/mint_pack", &Body { owner_address, cards }).await
    }

    async fn register_trade(
        &self,
        offerer_address: &str,
        desired_party_address: &str,
        offered_card_id: &str,
        desired_card_id: &str,
    ) -> Result<(), CardClusterError> {
        #[derive(Serialize)]
        struct Body<'a> {
            offerer_address: &'a str,
            desired_party_address: &'a str,
            offered_card_id: &'a str,
            desired_card_id: &'a str,
        }
        self.post(
            "/register_trade",
            &Body {
                offerer_address,
                desired_party_address,
                offered_card_id,
                desired_card_id,
            },
        )
        .await
    }

    async fn record_match_outcome(
        &self,
        match_id: &str,
        winner_address: Option<&str>,
    ) -> Result<(), CardClusterError> {
        #[derive(Serialize)]
        struct Body<'a> {
            match_id: &'a str,
            winner_address: Option<&'a str>,
        }
        self.post("/record_match_outcome", &Body { match_id, winner_address })
            .await
    }
}

/// Runs a ledger call with a timeout, logging and swallowing any failure
/// (timeout or application error alike) so it never blocks the caller's
/// in-memory progress.
pub async fn best_effort<F, T>(label: &str, fut: F)
where
    F: std::future::Future<Output = Result<T, CardClusterError>>,
{
    match tokio::time::timeout(LEDGER_CALL_TIMEOUT, fut).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => log::warn!("ledger call '{}' failed: {}", label, e),
        Err(_) => log::warn!("ledger call '{}' timed out", label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_ledger_always_succeeds() {
        let ledger = NullLedger;
        assert!(ledger.mint_pack("addr", &[]).await.is_ok());
        assert!(ledger
            .register_trade("a", "b", "c1", "c2")
            .await
            .is_ok());
        assert!(ledger.record_match_outcome("m1", None).await.is_ok());
    }

    #[tokio::test]
    async fn best_effort_swallows_failure() {
        best_effort("test", async { Err::<(), _>(CardClusterError::msg("boom")) }).await;
        // no panic: failure was only logged
    }
}
