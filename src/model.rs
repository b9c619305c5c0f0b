//! Wire-shaped data types shared by the screening pipeline, the audit log
//! and (eventually) a JSON-RPC surface. Kept serde-derivable so the audit
//! log can persist them verbatim.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Source of a sanctions list. Currently only OFAC's SDN list is consumed,
/// but the field is kept open for future list sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListSource {
    Ofac,
}

/// A sanctioned entity, immutable once loaded. Addresses are deduplicated
/// and case-preserved; comparisons against them are case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanctionEntity {
    pub entity_id: String,
    pub entity_name: String,
    pub list_source: ListSource,
    pub addresses: HashSet<String>,
    pub aliases: HashSet<String>,
    pub last_updated: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchType {
    Direct,
    Indirect,
}

/// A hit linking an address to a sanctioned entity. `Direct` matches always
/// carry full confidence; `Indirect` matches come from the path walker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanctionMatch {
    pub list_source: ListSource,
    pub entity_name: String,
    pub entity_id: String,
    pub match_type: MatchType,
    pub confidence: u8,
    pub matched_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_txid: Option<String>,
    pub prev_vout: Option<u32>,
    pub addresses: Vec<String>,
    pub value: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    pub addresses: Vec<String>,
    pub value: u64,
    pub script_pub_key: String,
}

/// A transaction normalized from the indexer's provider-specific shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinTransaction {
    pub txid: String,
    pub block_height: Option<u64>,
    pub block_time: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub fee: u64,
    pub size: u64,
}

/// A sanctioned address discovered while walking the transaction graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathNode {
    pub address: String,
    pub txid: String,
    pub hop: u8,
    pub value: u64,
    pub timestamp_ms: u64,
    pub risk_contribution: u8,
}

/// The result of one bounded BFS walk anchored at a target address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathAnalysis {
    pub target_address: String,
    pub max_hops: u8,
    pub total_nodes_analyzed: u64,
    pub sanctioned_nodes_found: u64,
    pub path_nodes: Vec<PathNode>,
    pub risk_propagation: u8,
}

impl PathAnalysis {
    pub fn empty(target_address: impl Into<String>, max_hops: u8) -> Self {
        PathAnalysis {
            target_address: target_address.into(),
            max_hops,
            total_nodes_analyzed: 0,
            sanctioned_nodes_found: 0,
            path_nodes: Vec::new(),
            risk_propagation: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// The reply of `screen address`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub address: String,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub sanction_matches: Vec<SanctionMatch>,
    pub path_analysis: Option<PathAnalysis>,
    pub timestamp: String,
    pub confidence: u8,
    pub processing_time_ms: u64,
}

/// The reply of `screen transaction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxScreeningResult {
    pub tx_hash: String,
    pub overall_risk_score: u8,
    pub overall_risk_level: RiskLevel,
    pub sanction_matches: Vec<SanctionMatch>,
    pub screened_addresses: usize,
    pub total_addresses: usize,
    pub confidence: u8,
    pub transaction: Option<BitcoinTransaction>,
    pub timestamp: String,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ScreenAddress,
    ScreenAddressBatch,
    ScreenTransaction,
}

/// An append-only audit record. `result` is a sanitized, typed summary
/// rather than an arbitrary map, per the design notes' guidance to avoid
/// losing compile-time safety for the dynamic "result bag" the original
/// system carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub action: ActionKind,
    pub subject: String,
    pub tx_hash: Option<String>,
    pub result: AuditResult,
    pub timestamp: String,
    pub correlation_id: String,
    pub processing_time_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

/// Sanitized per-action summary stored alongside an audit entry. Kept as a
/// tagged union so each action's result shape is checked at compile time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditResult {
    Address {
        risk_score: u8,
        risk_level: RiskLevel,
        match_count: usize,
        walked: bool,
        /// Set when a walk was requested but failed as a whole (seed fetch
        /// error); `walked` is false in that case too, but this keeps the
        /// failure itself visible in the audit trail per §4.5 step 6.
        walk_error: Option<String>,
    },
    Batch {
        count: usize,
        invalid_count: usize,
    },
    Transaction {
        overall_risk_score: u8,
        overall_risk_level: RiskLevel,
        screened_addresses: usize,
    },
}
