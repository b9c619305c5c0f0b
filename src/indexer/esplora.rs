//! A blockchain backend implementation based on the
//! [esplora HTTP API](https://github.com/Blockstream/esplora/blob/master/API.md),
//! the same API the teacher's own `EsploraClient` targets. Normalizes
//! esplora's wire shapes into the crate's [`BitcoinTransaction`].

use async_trait::async_trait;
use serde::Deserialize;

use super::{AddressInfo, IndexerClient, RateLimitStatus, RateLimiter};
use crate::error::{Error, Result};
use crate::model::{BitcoinTransaction, TxInput, TxOutput};

#[derive(Debug, Clone, Deserialize)]
struct EsploraStatus {
    confirmed: bool,
    block_height: Option<u64>,
    block_time: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct EsploraPrevout {
    scriptpubkey_address: Option<String>,
    value: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct EsploraVin {
    txid: Option<String>,
    vout: Option<u32>,
    prevout: Option<EsploraPrevout>,
    is_coinbase: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct EsploraVout {
    scriptpubkey: String,
    scriptpubkey_address: Option<String>,
    value: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct EsploraTx {
    txid: String,
    vin: Vec<EsploraVin>,
    vout: Vec<EsploraVout>,
    size: u64,
    fee: u64,
    status: EsploraStatus,
}

#[derive(Debug, Clone, Deserialize)]
struct EsploraAddressStats {
    funded_txo_sum: i64,
    spent_txo_sum: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct EsploraAddressInfo {
    address: String,
    chain_stats: EsploraAddressStats,
    mempool_stats: EsploraAddressStats,
}

fn normalize(tx: EsploraTx) -> BitcoinTransaction {
    let inputs = tx
        .vin
        .into_iter()
        .map(|vin| {
            if vin.is_coinbase.unwrap_or(false) {
                return TxInput {
                    prev_txid: vin.txid,
                    prev_vout: vin.vout,
                    addresses: Vec::new(),
                    value: 0,
                };
            }
            match vin.prevout {
                Some(prevout) => TxInput {
                    prev_txid: vin.txid,
                    prev_vout: vin.vout,
                    addresses: prevout.scriptpubkey_address.into_iter().collect(),
                    value: prevout.value.unwrap_or(0),
                },
                None => TxInput {
                    prev_txid: vin.txid,
                    prev_vout: vin.vout,
                    addresses: Vec::new(),
                    value: 0,
                },
            }
        })
        .collect();

    let outputs = tx
        .vout
        .into_iter()
        .map(|vout| TxOutput {
            addresses: vout.scriptpubkey_address.into_iter().collect(),
            value: vout.value,
            script_pub_key: vout.scriptpubkey,
        })
        .collect();

    BitcoinTransaction {
        txid: tx.txid,
        block_height: tx.status.block_height,
        block_time: if tx.status.confirmed {
            tx.status.block_time.unwrap_or(0)
        } else {
            0
        },
        inputs,
        outputs,
        fee: tx.fee,
        size: tx.size,
    }
}

/// Esplora-backed [`IndexerClient`], rate-limited to a configurable
/// requests-per-60s cap.
pub struct EsploraIndexerClient {
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

impl EsploraIndexerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_rate_limit(base_url, 60)
    }

    pub fn with_rate_limit(base_url: impl Into<String>, requests_per_minute: u32) -> Self {
        EsploraIndexerClient {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(requests_per_minute),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str, label: &str) -> Result<T> {
        self.limiter.acquire().await?;
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::ExternalApi(format!("{label} request to indexer failed: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::DataNotFound(format!("{label}: not found")));
        }
        if !response.status().is_success() {
            return Err(Error::ExternalApi(format!(
                "{label}: indexer responded with {}",
                response.status()
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Error::ExternalApi(format!("{label}: malformed indexer response: {e}")))
    }
}

#[async_trait]
impl IndexerClient for EsploraIndexerClient {
    async fn get_transaction(&self, txid: &str) -> Result<BitcoinTransaction> {
        let raw: EsploraTx = self
            .get_json(&format!("/tx/{txid}"), "get_transaction")
            .await?;
        Ok(normalize(raw))
    }

    async fn get_address_transactions(&self, address: &str, limit: u32) -> Result<Vec<String>> {
        let limit = limit.min(super::DEFAULT_ADDRESS_TX_LIMIT);
        let raw: Vec<EsploraTx> = self
            .get_json(&format!("/address/{address}/txs"), "get_address_transactions")
            .await?;
        Ok(raw.into_iter().take(limit as usize).map(|t| t.txid).collect())
    }

    async fn get_address_info(&self, address: &str) -> Result<AddressInfo> {
        let raw: EsploraAddressInfo = self
            .get_json(&format!("/address/{address}"), "get_address_info")
            .await?;
        let funded = raw.chain_stats.funded_txo_sum + raw.mempool_stats.funded_txo_sum;
        let spent = raw.chain_stats.spent_txo_sum + raw.mempool_stats.spent_txo_sum;
        Ok(AddressInfo {
            address: raw.address,
            balance_sats: funded - spent,
            tx_count: 0,
        })
    }

    async fn rate_limit_status(&self) -> RateLimitStatus {
        self.limiter.status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_coinbase_input_to_empty_addresses() {
        let raw: EsploraTx = serde_json::from_value(serde_json::json!({
            "txid": "a".repeat(64),
            "vin": [{"is_coinbase": true, "txid": null, "vout": null, "prevout": null}],
            "vout": [{"scriptpubkey": "6a", "scriptpubkey_address": null, "value": 5000000000u64}],
            "size": 100,
            "fee": 0,
            "status": {"confirmed": true, "block_height": 0, "block_time": 0}
        }))
        .unwrap();
        let tx = normalize(raw);
        assert!(tx.inputs[0].addresses.is_empty());
        assert_eq!(tx.inputs[0].value, 0);
    }

    #[test]
    fn unconfirmed_tx_has_zero_block_time() {
        let raw: EsploraTx = serde_json::from_value(serde_json::json!({
            "txid": "b".repeat(64),
            "vin": [],
            "vout": [],
            "size": 0,
            "fee": 0,
            "status": {"confirmed": false, "block_height": null, "block_time": null}
        }))
        .unwrap();
        let tx = normalize(raw);
        assert_eq!(tx.block_time, 0);
    }
}
