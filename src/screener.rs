//! Combines direct-match scoring with optional path-walker output into a
//! [`ScreeningResult`]. Orchestrates the sanctions index, the path walker
//! and the audit log the way the teacher's `Wollet` orchestrates its own
//! cache, client and registry behind one façade.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::error::{Error, Result};
use crate::model::{
    ActionKind, AuditEntry, AuditResult, MatchType, RiskLevel, SanctionMatch, ScreeningResult,
};
use crate::risk::{self, INDIRECT_WEIGHT};
use crate::sanctions::SanctionsIndex;
use crate::validation;
use crate::walker::PathWalker;

const BATCH_CHUNK_SIZE: usize = 10;
const BATCH_CHUNK_PAUSE: Duration = Duration::from_millis(100);
const MAX_LOGGED_INVALID_INPUTS: usize = 5;

pub struct AddressScreener {
    sanctions: Arc<SanctionsIndex>,
    walker: Arc<PathWalker>,
    audit: Arc<AuditLog>,
}

impl AddressScreener {
    pub fn new(sanctions: Arc<SanctionsIndex>, walker: Arc<PathWalker>, audit: Arc<AuditLog>) -> Self {
        AddressScreener {
            sanctions,
            walker,
            audit,
        }
    }

    /// Screens one address, optionally propagating risk from the
    /// transaction graph. A path-walker failure never fails the overall
    /// screen: when the walk itself fails (as opposed to completing with
    /// nothing found), the result is returned without `path_analysis`, the
    /// score is left at the direct-match-only value, and the failure is
    /// recorded in the audit entry's result bag.
    pub async fn screen(
        &self,
        address: &str,
        include_walk: bool,
        max_hops: u8,
        correlation_id: &str,
    ) -> Result<ScreeningResult> {
        let started = Instant::now();
        validation::validate_address(address)?;

        let matches = self.direct_matches(address)?;
        let mut score = risk::direct_score(&matches) as f64;

        let mut walk_error = None;
        let path_analysis = if include_walk {
            match self.walker.walk(address, max_hops).await {
                Ok(analysis) => {
                    score += INDIRECT_WEIGHT * analysis.risk_propagation as f64;
                    Some(analysis)
                }
                Err(e) => {
                    log::warn!(
                        "address screener: path walk failed for {address}, omitting path analysis: {e}"
                    );
                    walk_error = Some(e.to_string());
                    None
                }
            }
        } else {
            None
        };

        let risk_score = score.round().clamp(0.0, 100.0) as u8;
        let risk_level = risk::bucket(risk_score);
        let confidence = risk::confidence_score(&matches, path_analysis.as_ref());
        let processing_time_ms = started.elapsed().as_millis() as u64;

        let result = ScreeningResult {
            address: address.to_string(),
            risk_score,
            risk_level,
            sanction_matches: matches,
            path_analysis,
            timestamp: Utc::now().to_rfc3339(),
            confidence,
            processing_time_ms,
        };

        self.audit.record(&AuditEntry {
            entry_id: Uuid::new_v4().to_string(),
            action: ActionKind::ScreenAddress,
            subject: result.address.clone(),
            tx_hash: None,
            result: AuditResult::Address {
                risk_score: result.risk_score,
                risk_level: result.risk_level,
                match_count: result.sanction_matches.len(),
                walked: result.path_analysis.is_some(),
                walk_error,
            },
            timestamp: result.timestamp.clone(),
            correlation_id: correlation_id.to_string(),
            processing_time_ms: result.processing_time_ms,
            success: true,
            error: None,
        });

        Ok(result)
    }

    fn direct_matches(&self, address: &str) -> Result<Vec<SanctionMatch>> {
        let entities = self.sanctions.find_by_address(address)?;
        Ok(entities
            .into_iter()
            .map(|e| SanctionMatch {
                list_source: e.list_source,
                entity_name: e.entity_name,
                entity_id: e.entity_id,
                match_type: MatchType::Direct,
                confidence: 100,
                matched_address: address.to_string(),
            })
            .collect())
    }

    /// Screens a batch of addresses in chunks of 10, processed
    /// concurrently within a chunk, with a 100ms pause between chunks.
    /// Invalid inputs are logged (first 5) and dropped from the input set
    /// rather than failing the batch; per-address screening failures
    /// become a stub `LOW`/0/0 result instead of being dropped, so the
    /// output length always equals the valid-input length.
    pub async fn screen_batch(
        &self,
        addresses: &[String],
        include_walk: bool,
        max_hops: u8,
        correlation_id: &str,
    ) -> Vec<ScreeningResult> {
        let (valid, invalid): (Vec<&String>, Vec<&String>) =
            addresses.iter().partition(|a| validation::is_valid_address(a));

        if !invalid.is_empty() {
            for addr in invalid.iter().take(MAX_LOGGED_INVALID_INPUTS) {
                log::warn!("address screener: dropping invalid batch input {addr}");
            }
        }

        let mut results = Vec::with_capacity(valid.len());
        for (i, chunk) in valid.chunks(BATCH_CHUNK_SIZE).enumerate() {
            if i > 0 {
                sleep(BATCH_CHUNK_PAUSE).await;
            }
            let futures = chunk
                .iter()
                .map(|addr| self.screen(addr, include_walk, max_hops, correlation_id));
            let outcomes = futures::future::join_all(futures).await;
            for (addr, outcome) in chunk.iter().zip(outcomes) {
                results.push(outcome.unwrap_or_else(|e| stub_result(addr, &e)));
            }
        }

        self.audit.record(&AuditEntry {
            entry_id: Uuid::new_v4().to_string(),
            action: ActionKind::ScreenAddressBatch,
            subject: format!("bulk_{}_items", valid.len()),
            tx_hash: None,
            result: AuditResult::Batch {
                count: valid.len(),
                invalid_count: invalid.len(),
            },
            timestamp: Utc::now().to_rfc3339(),
            correlation_id: correlation_id.to_string(),
            processing_time_ms: 0,
            success: true,
            error: None,
        });

        results
    }
}

fn stub_result(address: &str, error: &Error) -> ScreeningResult {
    log::warn!("address screener: screening {address} failed, returning stub result: {error}");
    ScreeningResult {
        address: address.to_string(),
        risk_score: 0,
        risk_level: RiskLevel::Low,
        sanction_matches: Vec::new(),
        path_analysis: None,
        timestamp: Utc::now().to_rfc3339(),
        confidence: 0,
        processing_time_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::fake::FakeIndexerClient;
    use crate::sanctions::StaticSanctionsSource;
    use serde_json::json;
    use tempfile::tempdir;

    fn context(sanctions_doc: serde_json::Value) -> (Arc<AddressScreener>, tempfile::TempDir) {
        let sanctions = Arc::new(SanctionsIndex::new(StaticSanctionsSource::new(sanctions_doc)));
        let indexer = Arc::new(FakeIndexerClient::new());
        let walker = Arc::new(PathWalker::new(indexer, sanctions.clone()));
        let dir = tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path()));
        (Arc::new(AddressScreener::new(sanctions, walker, audit)), dir)
    }

    fn empty_fixture() -> serde_json::Value {
        json!({
            "metadata": {"source": "OFAC SDN", "lastUpdated": "2024-01-01", "version": "1", "totalEntities": 0, "cryptocurrencies": {}},
            "entities": []
        })
    }

    #[tokio::test]
    async fn clean_address_scores_zero() {
        let (screener, _dir) = context(empty_fixture());
        let result = screener
            .screen("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", false, 3, "corr-1")
            .await
            .unwrap();
        assert_eq!(result.risk_score, 0);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(result.sanction_matches.is_empty());
        assert_eq!(result.confidence, 30);
        assert!(result.path_analysis.is_none());
    }

    #[tokio::test]
    async fn directly_sanctioned_address_scores_high() {
        let doc = json!({
            "metadata": {"source": "OFAC SDN", "lastUpdated": "2024-01-01", "version": "1", "totalEntities": 1, "cryptocurrencies": {"BTC": 1}},
            "entities": [{
                "entityId": "25308", "entityName": "YAN, Xiaobing", "entityType": "individual",
                "program": "CYBER2", "cryptocurrency": "BTC",
                "address": "12QtD5BFwRsdNsAZY76UVE1xyCGNTojH9h",
                "remarks": null, "isActive": true
            }]
        });
        let (screener, _dir) = context(doc);
        let result = screener
            .screen("12QtD5BFwRsdNsAZY76UVE1xyCGNTojH9h", false, 3, "corr-2")
            .await
            .unwrap();
        assert_eq!(result.risk_score, 75);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(result.confidence, 70);
        assert_eq!(result.sanction_matches.len(), 1);
        assert_eq!(result.sanction_matches[0].match_type, MatchType::Direct);
        assert_eq!(result.sanction_matches[0].confidence, 100);
    }

    #[tokio::test]
    async fn walker_failure_omits_path_analysis_and_leaves_direct_score_untouched() {
        let doc = json!({
            "metadata": {"source": "OFAC SDN", "lastUpdated": "2024-01-01", "version": "1", "totalEntities": 1, "cryptocurrencies": {"BTC": 1}},
            "entities": [{
                "entityId": "25308", "entityName": "YAN, Xiaobing", "entityType": "individual",
                "program": "CYBER2", "cryptocurrency": "BTC",
                "address": "12QtD5BFwRsdNsAZY76UVE1xyCGNTojH9h",
                "remarks": null, "isActive": true
            }]
        });
        let sanctions = Arc::new(SanctionsIndex::new(StaticSanctionsSource::new(doc)));
        let indexer = Arc::new(
            FakeIndexerClient::new().failing_address("12QtD5BFwRsdNsAZY76UVE1xyCGNTojH9h"),
        );
        let walker = Arc::new(PathWalker::new(indexer, sanctions.clone()));
        let dir = tempdir().unwrap();
        let audit = Arc::new(AuditLog::new(dir.path()));
        let screener = AddressScreener::new(sanctions, walker, audit);

        let result = screener
            .screen("12QtD5BFwRsdNsAZY76UVE1xyCGNTojH9h", true, 3, "corr-walk-fail")
            .await
            .unwrap();

        assert!(result.path_analysis.is_none());
        assert_eq!(result.risk_score, 75);
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn invalid_address_is_rejected_before_any_lookup() {
        let (screener, _dir) = context(empty_fixture());
        let err = screener.screen("not-an-address", false, 3, "corr-3").await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn batch_drops_invalid_but_keeps_output_length_equal_to_valid_count() {
        let (screener, _dir) = context(empty_fixture());
        let mut addresses: Vec<String> = (0..10)
            .map(|_| "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string())
            .collect();
        addresses.push("invalid-one".to_string());
        addresses.push("invalid-two".to_string());
        let results = screener.screen_batch(&addresses, false, 3, "corr-4").await;
        assert_eq!(results.len(), 10);
    }

    #[tokio::test]
    async fn case_insensitive_base58_lookup() {
        // Deliberately free of the letters whose case-flip leaves the
        // base58 alphabet (lowercase 'i'/'o' have no valid uppercase
        // counterpart), so both cased forms below remain valid addresses.
        let doc = json!({
            "metadata": {"source": "OFAC SDN", "lastUpdated": "2024-01-01", "version": "1", "totalEntities": 1, "cryptocurrencies": {"BTC": 1}},
            "entities": [{
                "entityId": "1", "entityName": "X", "entityType": "individual", "program": "P",
                "cryptocurrency": "BTC", "address": "1BCDEFGHJKMNPQRSTUVWXYZ23456789",
                "remarks": null, "isActive": true
            }]
        });
        let (screener, _dir) = context(doc);
        let upper = screener
            .screen("1BCDEFGHJKMNPQRSTUVWXYZ23456789", false, 3, "corr-5")
            .await
            .unwrap();
        let lower = screener
            .screen("1bcdefghjkmnpqrstuvwxyz23456789", false, 3, "corr-6")
            .await
            .unwrap();
        assert_eq!(upper.sanction_matches.len(), lower.sanction_matches.len());
        assert_eq!(upper.sanction_matches.len(), 1);
    }
}
