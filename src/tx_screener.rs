//! Resolves a transaction to its input/output addresses, screens each one
//! without recursive graph walking, and aggregates an overall risk score.
//! Same orchestrating-façade shape as [`crate::screener::AddressScreener`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::error::Result;
use crate::indexer::IndexerClient;
use crate::model::{
    ActionKind, AuditEntry, AuditResult, BitcoinTransaction, SanctionMatch, TxScreeningResult,
};
use crate::risk;
use crate::screener::AddressScreener;
use crate::validation::{self, Direction};

const HIGH_RISK_PENALTY_PER_MATCH: f64 = 10.0;
const HIGH_RISK_PENALTY_CAP: f64 = 25.0;

pub struct TxScreener {
    indexer: Arc<dyn IndexerClient>,
    address_screener: Arc<AddressScreener>,
    audit: Arc<AuditLog>,
}

impl TxScreener {
    pub fn new(
        indexer: Arc<dyn IndexerClient>,
        address_screener: Arc<AddressScreener>,
        audit: Arc<AuditLog>,
    ) -> Self {
        TxScreener {
            indexer,
            address_screener,
            audit,
        }
    }

    pub async fn screen(
        &self,
        tx_hash: &str,
        direction: Direction,
        include_metadata: bool,
        correlation_id: &str,
    ) -> Result<TxScreeningResult> {
        let started = Instant::now();
        validation::validate_tx_hash(tx_hash)?;

        let tx = self.indexer.get_transaction(tx_hash).await?;
        let addresses = addresses_for_direction(&tx, direction);

        let mut sanction_matches: Vec<SanctionMatch> = Vec::new();
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut high_risk_count = 0u32;
        let mut confidence_sum = 0.0;
        let mut screened = 0usize;

        for address in &addresses {
            // include_walk is always false: transaction screening fans out
            // to the address screener without recursing into graph walking.
            // max_hops is ignored by the screener whenever the walk is
            // disabled, so any value is fine here.
            match self
                .address_screener
                .screen(address, false, 0, correlation_id)
                .await
            {
                Ok(result) => {
                    screened += 1;
                    let weight = (result.sanction_matches.len().max(1) as f64)
                        * (result.confidence as f64 / 100.0);
                    weighted_sum += result.risk_score as f64 * weight;
                    weight_sum += weight;
                    confidence_sum += result.confidence as f64;
                    if matches!(
                        result.risk_level,
                        crate::model::RiskLevel::High | crate::model::RiskLevel::Critical
                    ) {
                        high_risk_count += 1;
                    }
                    sanction_matches.extend(result.sanction_matches);
                }
                Err(e) => {
                    log::warn!("tx screener: failed to screen address {address}: {e}");
                }
            }
        }

        let avg_weighted = if weight_sum > 0.0 {
            weighted_sum / weight_sum
        } else {
            0.0
        };
        let high_risk_penalty = (HIGH_RISK_PENALTY_PER_MATCH * high_risk_count as f64).min(HIGH_RISK_PENALTY_CAP);
        let overall_risk_score = (avg_weighted + high_risk_penalty).round().clamp(0.0, 100.0) as u8;
        let overall_risk_level = risk::bucket(overall_risk_score);

        let completeness_ratio = if addresses.is_empty() {
            1.0
        } else {
            screened as f64 / addresses.len() as f64
        };
        let avg_confidence = if screened > 0 {
            confidence_sum / screened as f64
        } else {
            0.0
        };
        let confidence = (60.0 + 20.0 * completeness_ratio + 20.0 * avg_confidence / 100.0)
            .round()
            .clamp(0.0, 100.0) as u8;

        let processing_time_ms = started.elapsed().as_millis() as u64;
        let result = TxScreeningResult {
            tx_hash: tx_hash.to_string(),
            overall_risk_score,
            overall_risk_level,
            sanction_matches,
            screened_addresses: screened,
            total_addresses: addresses.len(),
            confidence,
            transaction: if include_metadata { Some(tx) } else { None },
            timestamp: Utc::now().to_rfc3339(),
            processing_time_ms,
        };

        self.audit.record(&AuditEntry {
            entry_id: Uuid::new_v4().to_string(),
            action: ActionKind::ScreenTransaction,
            subject: format!("tx:{tx_hash}"),
            tx_hash: Some(tx_hash.to_string()),
            result: AuditResult::Transaction {
                overall_risk_score: result.overall_risk_score,
                overall_risk_level: result.overall_risk_level,
                screened_addresses: result.screened_addresses,
            },
            timestamp: result.timestamp.clone(),
            correlation_id: correlation_id.to_string(),
            processing_time_ms: result.processing_time_ms,
            success: true,
            error: None,
        });

        Ok(result)
    }

    /// Screens a batch of transaction hashes sequentially, to respect the
    /// indexer's rate limit; a per-tx failure is logged and skipped.
    pub async fn screen_batch(
        &self,
        tx_hashes: &[String],
        direction: Direction,
        include_metadata: bool,
        correlation_id: &str,
    ) -> Vec<TxScreeningResult> {
        let mut results = Vec::with_capacity(tx_hashes.len());
        for tx_hash in tx_hashes {
            match self.screen(tx_hash, direction, include_metadata, correlation_id).await {
                Ok(result) => results.push(result),
                Err(e) => log::warn!("tx screener: skipping {tx_hash} in batch: {e}"),
            }
        }
        results
    }
}

fn addresses_for_direction(tx: &BitcoinTransaction, direction: Direction) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let include_inputs = matches!(direction, Direction::Inputs | Direction::Both);
    let include_outputs = matches!(direction, Direction::Outputs | Direction::Both);

    if include_inputs {
        for input in &tx.inputs {
            for addr in &input.addresses {
                if seen.insert(addr.clone()) {
                    out.push(addr.clone());
                }
            }
        }
    }
    if include_outputs {
        for output in &tx.outputs {
            for addr in &output.addresses {
                if seen.insert(addr.clone()) {
                    out.push(addr.clone());
                }
            }
        }
    }
    out
}
