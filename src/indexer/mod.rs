//! Access to the external blockchain indexer. Shields the rest of the
//! system from any particular provider's wire format behind the
//! [`IndexerClient`] trait, the same seam the teacher draws with its
//! `BlockchainBackend` trait over `EsploraClient`/`ElectrumClient`.

pub mod esplora;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::BitcoinTransaction;

pub use esplora::EsploraIndexerClient;

pub const DEFAULT_ADDRESS_TX_LIMIT: u32 = 25;
pub const WALK_ADDRESS_TX_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitStatus {
    pub count: u32,
    pub cap: u32,
    pub window_reset_epoch_secs: u64,
}

/// Sliding fixed 60-second window rate limiter shared by all callers of one
/// indexer client, matching §5's "counter under a lock, reset race
/// tolerated" guidance.
pub(crate) struct RateWindow {
    cap: u32,
    window: Duration,
    window_start: Instant,
    count: u32,
}

impl RateWindow {
    fn new(cap: u32, window: Duration) -> Self {
        RateWindow {
            cap,
            window,
            window_start: Instant::now(),
            count: 0,
        }
    }

    fn try_acquire(&mut self) -> Result<()> {
        if self.window_start.elapsed() >= self.window {
            self.window_start = Instant::now();
            self.count = 0;
        }
        if self.count >= self.cap {
            return Err(Error::ExternalApi(format!(
                "rate limit exceeded: {}/{} requests in the current window",
                self.count, self.cap
            )));
        }
        self.count += 1;
        Ok(())
    }

    fn status(&self) -> RateLimitStatus {
        RateLimitStatus {
            count: self.count,
            cap: self.cap,
            window_reset_epoch_secs: 0,
        }
    }
}

/// Shared handle wrapping a rate limiter; cloned cheaply into every client.
#[derive(Clone)]
pub(crate) struct RateLimiter {
    inner: Arc<Mutex<RateWindow>>,
}

impl RateLimiter {
    pub(crate) fn new(cap: u32) -> Self {
        RateLimiter {
            inner: Arc::new(Mutex::new(RateWindow::new(cap, Duration::from_secs(60)))),
        }
    }

    pub(crate) async fn acquire(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.try_acquire()
    }

    pub(crate) async fn status(&self) -> RateLimitStatus {
        self.inner.lock().await.status()
    }
}

/// Balance/tx-count summary used for health checks only.
#[derive(Debug, Clone, Default)]
pub struct AddressInfo {
    pub address: String,
    pub balance_sats: i64,
    pub tx_count: u64,
}

/// Normalizes access to the external indexer. All access suspends the
/// caller until data arrives, errors, or the rate limiter rejects it.
#[async_trait]
pub trait IndexerClient: Send + Sync {
    async fn get_transaction(&self, txid: &str) -> Result<BitcoinTransaction>;

    /// Up to `limit` recent txids for `address`, most-recent-first.
    async fn get_address_transactions(&self, address: &str, limit: u32) -> Result<Vec<String>>;

    async fn get_address_info(&self, address: &str) -> Result<AddressInfo>;

    async fn rate_limit_status(&self) -> RateLimitStatus;
}

/// Union of unique addresses referenced by a transaction's inputs and
/// outputs.
pub fn extract_addresses(tx: &BitcoinTransaction) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for input in &tx.inputs {
        for addr in &input.addresses {
            if seen.insert(addr.clone()) {
                out.push(addr.clone());
            }
        }
    }
    for output in &tx.outputs {
        for addr in &output.addresses {
            if seen.insert(addr.clone()) {
                out.push(addr.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_caps_requests_per_window() {
        let limiter = RateLimiter::new(2);
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        assert!(limiter.acquire().await.is_err());
    }

    #[test]
    fn extract_addresses_dedupes_across_inputs_and_outputs() {
        use crate::model::{BitcoinTransaction, TxInput, TxOutput};
        let tx = BitcoinTransaction {
            txid: "t".into(),
            block_height: None,
            block_time: 0,
            inputs: vec![TxInput {
                prev_txid: None,
                prev_vout: None,
                addresses: vec!["a".into(), "b".into()],
                value: 1,
            }],
            outputs: vec![TxOutput {
                addresses: vec!["b".into(), "c".into()],
                value: 1,
                script_pub_key: "".into(),
            }],
            fee: 0,
            size: 0,
        };
        assert_eq!(extract_addresses(&tx), vec!["a", "b", "c"]);
    }
}
