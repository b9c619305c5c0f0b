//! An in-memory [`IndexerClient`] for unit and scenario tests, the same
//! role `lwk_test_util`'s fixtures play for the teacher's wallet tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{AddressInfo, IndexerClient, RateLimitStatus};
use crate::error::{Error, Result};
use crate::model::BitcoinTransaction;

#[derive(Default)]
pub struct FakeIndexerClient {
    transactions: HashMap<String, BitcoinTransaction>,
    address_txids: HashMap<String, Vec<String>>,
    fail_address_txs: std::collections::HashSet<String>,
    fail_transactions: std::collections::HashSet<String>,
    calls: Mutex<u32>,
}

impl FakeIndexerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transaction(mut self, tx: BitcoinTransaction) -> Self {
        self.transactions.insert(tx.txid.clone(), tx);
        self
    }

    pub fn with_address_txids(mut self, address: impl Into<String>, txids: Vec<String>) -> Self {
        self.address_txids.insert(address.into(), txids);
        self
    }

    pub fn failing_address(mut self, address: impl Into<String>) -> Self {
        self.fail_address_txs.insert(address.into());
        self
    }

    pub fn failing_transaction(mut self, txid: impl Into<String>) -> Self {
        self.fail_transactions.insert(txid.into());
        self
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().expect("lock poisoned")
    }
}

#[async_trait]
impl IndexerClient for FakeIndexerClient {
    async fn get_transaction(&self, txid: &str) -> Result<BitcoinTransaction> {
        *self.calls.lock().expect("lock poisoned") += 1;
        if self.fail_transactions.contains(txid) {
            return Err(Error::ExternalApi(format!("fake transport failure for {txid}")));
        }
        self.transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| Error::DataNotFound(format!("no fixture transaction for {txid}")))
    }

    async fn get_address_transactions(&self, address: &str, limit: u32) -> Result<Vec<String>> {
        *self.calls.lock().expect("lock poisoned") += 1;
        if self.fail_address_txs.contains(address) {
            return Err(Error::ExternalApi(format!(
                "fake transport failure listing txs for {address}"
            )));
        }
        Ok(self
            .address_txids
            .get(address)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .take(limit as usize)
            .collect())
    }

    async fn get_address_info(&self, address: &str) -> Result<AddressInfo> {
        Ok(AddressInfo {
            address: address.to_string(),
            balance_sats: 0,
            tx_count: self
                .address_txids
                .get(address)
                .map(|v| v.len() as u64)
                .unwrap_or(0),
        })
    }

    async fn rate_limit_status(&self) -> RateLimitStatus {
        RateLimitStatus {
            count: *self.calls.lock().expect("lock poisoned"),
            cap: 60,
            window_reset_epoch_secs: 0,
        }
    }
}
