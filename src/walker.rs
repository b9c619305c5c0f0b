//! Bounded breadth-first traversal of the Bitcoin transaction graph
//! anchored at a target address, fanning out across the indexer while
//! deduplicating visited addresses and transactions.
//!
//! Concurrency follows §5's "semaphore of width 5" guidance, generalizing
//! the teacher's own bounded-fanout fetch pattern
//! (`lwk_wollet::clients::asyncr`) from "fetch my wallet's txs" to
//! "fetch a BFS frontier's txs".

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::error::Result;
use crate::indexer::{IndexerClient, WALK_ADDRESS_TX_LIMIT, DEFAULT_ADDRESS_TX_LIMIT, extract_addresses};
use crate::model::{PathAnalysis, PathNode};
use crate::risk;
use crate::sanctions::SanctionsIndex;

pub const MIN_MAX_HOPS: u8 = 1;
pub const MAX_MAX_HOPS: u8 = 10;
pub const DEFAULT_WALK_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
const HOP_FRONTIER_SIZE: usize = 10;
const FANOUT_CONCURRENCY: usize = 5;
const EXPANSION_ADDRESSES_PER_TX: usize = 3;

/// Clamps a caller-supplied hop count to `[1,10]`, per the design notes'
/// resolution of the 1..10-vs-fixed-5 discrepancy.
pub fn clamp_max_hops(requested: u8) -> u8 {
    requested.clamp(MIN_MAX_HOPS, MAX_MAX_HOPS)
}

struct CachedWalk {
    analysis: PathAnalysis,
    cached_at: Instant,
}

pub struct PathWalker {
    indexer: Arc<dyn IndexerClient>,
    sanctions: Arc<SanctionsIndex>,
    cache: Mutex<HashMap<(String, u8), CachedWalk>>,
    cache_ttl: Duration,
}

impl PathWalker {
    pub fn new(indexer: Arc<dyn IndexerClient>, sanctions: Arc<SanctionsIndex>) -> Self {
        PathWalker {
            indexer,
            sanctions,
            cache: Mutex::new(HashMap::new()),
            cache_ttl: DEFAULT_WALK_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Walks the transaction graph from `target` up to `max_hops` hops,
    /// returning a well-formed [`PathAnalysis`] (possibly with zero nodes
    /// analyzed) as long as the walk could at least seed its frontier.
    /// Fails as a whole only when the seed fetch itself errors — every
    /// fetch error encountered afterward, expanding a hop or fetching a
    /// specific transaction, is logged and skipped rather than propagated.
    /// Memoized by `(target, max_hops)` for [`DEFAULT_WALK_CACHE_TTL`] on
    /// success only; there is no single-flight guard, so duplicate
    /// concurrent walks may occur but converge to the same cached result.
    pub async fn walk(&self, target: &str, max_hops: u8) -> Result<PathAnalysis> {
        let max_hops = clamp_max_hops(max_hops);
        let key = (target.to_lowercase(), max_hops);

        if let Some(cached) = self.cached(&key).await {
            return Ok(cached);
        }

        let analysis = self.run_walk(target, max_hops).await?;

        let mut cache = self.cache.lock().await;
        cache.insert(
            key,
            CachedWalk {
                analysis: analysis.clone(),
                cached_at: Instant::now(),
            },
        );
        Ok(analysis)
    }

    async fn cached(&self, key: &(String, u8)) -> Option<PathAnalysis> {
        let cache = self.cache.lock().await;
        let entry = cache.get(key)?;
        if entry.cached_at.elapsed() <= self.cache_ttl {
            Some(entry.analysis.clone())
        } else {
            None
        }
    }

    /// Runs the hop-by-hop expansion. Only the seed fetch's failure aborts
    /// the walk as a whole (propagated to the caller); every other fetch
    /// failure along the way is a per-node skip, per §4.4's failure model.
    async fn run_walk(&self, target: &str, max_hops: u8) -> Result<PathAnalysis> {
        let mut visited_addresses: HashSet<String> = HashSet::new();
        visited_addresses.insert(target.to_lowercase());
        let mut visited_transactions: HashSet<String> = HashSet::new();

        let mut total_nodes_analyzed: u64 = 0;
        let mut sanctioned_nodes_found: u64 = 0;
        let mut path_nodes: Vec<PathNode> = Vec::new();

        let semaphore = Arc::new(Semaphore::new(FANOUT_CONCURRENCY));

        let mut frontier = self
            .indexer
            .get_address_transactions(target, DEFAULT_ADDRESS_TX_LIMIT)
            .await
            .map_err(|e| {
                log::warn!("path walker: failed to seed frontier for {target}: {e}");
                e
            })?;

        for hop_index in 0..max_hops {
            if frontier.is_empty() {
                break;
            }
            let batch: Vec<String> = frontier.iter().take(HOP_FRONTIER_SIZE).cloned().collect();
            let fetched = self.fetch_transactions(&batch, &semaphore).await;

            let mut next_frontier = Vec::new();
            for (txid, result) in fetched {
                let tx = match result {
                    Ok(tx) => tx,
                    Err(e) => {
                        log::warn!("path walker: skipping transaction {txid}: {e}");
                        continue;
                    }
                };
                if !visited_transactions.insert(tx.txid.clone()) {
                    continue;
                }
                total_nodes_analyzed += 1;

                let mut unvisited_in_tx = Vec::new();
                for addr in extract_addresses(&tx) {
                    let key = addr.to_lowercase();
                    if visited_addresses.contains(&key) {
                        continue;
                    }
                    match self.sanctions.find_by_address(&addr) {
                        Ok(matches) if !matches.is_empty() => {
                            let hop = hop_index + 1;
                            let value = tx_value_for_address(&tx, &addr);
                            path_nodes.push(PathNode {
                                address: addr.clone(),
                                txid: tx.txid.clone(),
                                hop,
                                value,
                                timestamp_ms: tx.block_time * 1000,
                                risk_contribution: risk::node_risk_contribution(hop, matches.len()),
                            });
                            sanctioned_nodes_found += 1;
                        }
                        Ok(_) => {}
                        Err(e) => log::warn!("path walker: sanctions lookup failed for {addr}: {e}"),
                    }
                    unvisited_in_tx.push(addr);
                }

                if hop_index + 1 < max_hops {
                    for addr in unvisited_in_tx.into_iter().take(EXPANSION_ADDRESSES_PER_TX) {
                        let key = addr.to_lowercase();
                        if !visited_addresses.insert(key) {
                            continue;
                        }
                        match self
                            .indexer
                            .get_address_transactions(&addr, WALK_ADDRESS_TX_LIMIT)
                            .await
                        {
                            Ok(txids) => next_frontier.extend(txids),
                            Err(e) => {
                                log::warn!("path walker: failed to expand address {addr}: {e}")
                            }
                        }
                    }
                }
            }
            frontier = next_frontier;
        }

        let mut analysis = PathAnalysis {
            target_address: target.to_string(),
            max_hops,
            total_nodes_analyzed,
            sanctioned_nodes_found,
            path_nodes,
            risk_propagation: 0,
        };
        analysis.risk_propagation = risk::risk_propagation(&analysis);
        Ok(analysis)
    }

    async fn fetch_transactions(
        &self,
        txids: &[String],
        semaphore: &Arc<Semaphore>,
    ) -> Vec<(String, Result<crate::model::BitcoinTransaction>)> {
        let mut fetched = Vec::with_capacity(txids.len());
        for chunk in txids.chunks(FANOUT_CONCURRENCY) {
            let mut set = JoinSet::new();
            for txid in chunk {
                let indexer = self.indexer.clone();
                let txid = txid.clone();
                let permit = semaphore.clone();
                set.spawn(async move {
                    let _permit = permit.acquire_owned().await;
                    let result = indexer.get_transaction(&txid).await;
                    (txid, result)
                });
            }
            while let Some(joined) = set.join_next().await {
                if let Ok(pair) = joined {
                    fetched.push(pair);
                }
            }
        }
        fetched
    }
}

fn tx_value_for_address(tx: &crate::model::BitcoinTransaction, address: &str) -> u64 {
    let mut total = 0u64;
    for input in &tx.inputs {
        if input.addresses.iter().any(|a| a == address) {
            total += input.value;
        }
    }
    for output in &tx.outputs {
        if output.addresses.iter().any(|a| a == address) {
            total += output.value;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::fake::FakeIndexerClient;
    use crate::model::{BitcoinTransaction, TxInput, TxOutput};
    use crate::sanctions::{SanctionsIndex, StaticSanctionsSource};
    use serde_json::json;

    fn sanctions_with(address: &str) -> Arc<SanctionsIndex> {
        let doc = json!({
            "metadata": {"source": "OFAC SDN", "lastUpdated": "2024-01-01", "version": "1", "totalEntities": 1, "cryptocurrencies": {"BTC": 1}},
            "entities": [{
                "entityId": "1", "entityName": "SANCTIONED", "entityType": "individual",
                "program": "X", "cryptocurrency": "BTC", "address": address,
                "remarks": null, "isActive": true
            }]
        });
        Arc::new(SanctionsIndex::new(StaticSanctionsSource::new(doc)))
    }

    fn tx(txid: &str, addr_in: &str, addr_out: &str, block_time: u64) -> BitcoinTransaction {
        BitcoinTransaction {
            txid: txid.to_string(),
            block_height: Some(100),
            block_time,
            inputs: vec![TxInput {
                prev_txid: None,
                prev_vout: None,
                addresses: vec![addr_in.to_string()],
                value: 1000,
            }],
            outputs: vec![TxOutput {
                addresses: vec![addr_out.to_string()],
                value: 900,
                script_pub_key: "".into(),
            }],
            fee: 100,
            size: 200,
        }
    }

    #[tokio::test]
    async fn requested_zero_hops_clamps_to_one_and_still_succeeds() {
        // max_hops is clamped to [1,10] (clamp_max_hops_respects_bounds
        // below), so a requested 0 runs a real one-hop walk rather than
        // short-circuiting; with no fixture transactions for "target" the
        // frontier is simply empty and the walk completes with nothing
        // found, not a dedicated zero-hop code path.
        let indexer = Arc::new(FakeIndexerClient::new());
        let sanctions = sanctions_with("zzz");
        let walker = PathWalker::new(indexer, sanctions);
        let analysis = walker.walk("target", 0).await.unwrap();
        assert_eq!(analysis.max_hops, 1);
        assert_eq!(analysis.total_nodes_analyzed, 0);
        assert_eq!(analysis.sanctioned_nodes_found, 0);
    }

    #[tokio::test]
    async fn discovers_sanctioned_node_at_hop_one() {
        let txid = "a".repeat(64);
        let indexer = Arc::new(
            FakeIndexerClient::new()
                .with_address_txids("target", vec![txid.clone()])
                .with_transaction(tx(&txid, "target", "sanctioned_addr", 1_700_000_000)),
        );
        let sanctions = sanctions_with("sanctioned_addr");
        let walker = PathWalker::new(indexer, sanctions);
        let analysis = walker.walk("target", 3).await.unwrap();
        assert_eq!(analysis.sanctioned_nodes_found, 1);
        assert_eq!(analysis.path_nodes.len(), 1);
        assert_eq!(analysis.path_nodes[0].hop, 1);
        assert!(analysis.total_nodes_analyzed >= 1);
    }

    #[tokio::test]
    async fn invariant_sanctioned_count_matches_node_list() {
        let txid = "b".repeat(64);
        let indexer = Arc::new(
            FakeIndexerClient::new()
                .with_address_txids("target", vec![txid.clone()])
                .with_transaction(tx(&txid, "target", "clean_addr", 0)),
        );
        let sanctions = sanctions_with("unrelated");
        let walker = PathWalker::new(indexer, sanctions);
        let analysis = walker.walk("target", 2).await.unwrap();
        assert_eq!(
            analysis.sanctioned_nodes_found as usize,
            analysis.path_nodes.len()
        );
        for node in &analysis.path_nodes {
            assert!(node.hop >= 1 && node.hop <= analysis.max_hops);
        }
    }

    #[tokio::test]
    async fn seed_fetch_failure_fails_the_whole_walk() {
        let indexer = Arc::new(FakeIndexerClient::new().failing_address("target"));
        let sanctions = sanctions_with("whatever");
        let walker = PathWalker::new(indexer, sanctions);
        let err = walker.walk("target", 4).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ExternalApi);
    }

    #[tokio::test]
    async fn walk_is_memoized() {
        let txid = "c".repeat(64);
        let indexer = Arc::new(
            FakeIndexerClient::new()
                .with_address_txids("target", vec![txid.clone()])
                .with_transaction(tx(&txid, "target", "clean_addr", 0)),
        );
        let sanctions = sanctions_with("unrelated");
        let walker = PathWalker::new(indexer.clone(), sanctions);
        let first = walker.walk("target", 2).await.unwrap();
        let calls_before = indexer.call_count();
        let second = walker.walk("target", 2).await.unwrap();
        assert_eq!(first.total_nodes_analyzed, second.total_nodes_analyzed);
        assert_eq!(indexer.call_count(), calls_before);
    }

    #[tokio::test]
    async fn failed_walk_is_not_cached() {
        let indexer = Arc::new(FakeIndexerClient::new().failing_address("target"));
        let sanctions = sanctions_with("whatever");
        let walker = PathWalker::new(indexer.clone(), sanctions);
        assert!(walker.walk("target", 2).await.is_err());
        let calls_after_first = indexer.call_count();
        assert!(walker.walk("target", 2).await.is_err());
        assert!(indexer.call_count() > calls_after_first);
    }

    #[test]
    fn clamp_max_hops_respects_bounds() {
        assert_eq!(clamp_max_hops(0), 1);
        assert_eq!(clamp_max_hops(5), 5);
        assert_eq!(clamp_max_hops(20), 10);
    }
}
