//! Pure scoring functions. No I/O, no shared state; everything here is a
//! deterministic function of its inputs, which is what makes §8's
//! round-trip properties checkable in isolation.

use crate::model::{ListSource, MatchType, PathAnalysis, RiskLevel, SanctionMatch};

/// Direct-match component of a risk score: 0 with no matches, a base of 60
/// for any match, a small bonus for multiple matches, and a bonus if any
/// match comes from OFAC. Clamped to 80 so direct matches alone never
/// reach `CRITICAL`.
pub fn direct_score(matches: &[SanctionMatch]) -> u8 {
    if matches.is_empty() {
        return 0;
    }
    let mut score: i32 = 60;
    if matches.len() > 1 {
        score += (5 * matches.len() as i32).min(20);
    }
    if matches.iter().any(|m| m.list_source == ListSource::Ofac) {
        score += 15;
    }
    score.clamp(0, 80) as u8
}

/// Buckets a [0,100] score into a categorical risk level.
pub fn bucket(score: u8) -> RiskLevel {
    match score {
        0..=25 => RiskLevel::Low,
        26..=50 => RiskLevel::Medium,
        51..=75 => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}

/// Per-node risk contribution for a match discovered at `hop` hops away,
/// scaled up when multiple entities match the same address.
pub fn node_risk_contribution(hop: u8, match_count: usize) -> u8 {
    let base = (100 - 20 * hop as i32).max(0);
    let bonus = (25 * match_count as i32).min(50);
    (base + bonus).clamp(0, 100) as u8
}

/// Aggregates a walk's path nodes into a single [0,100] propagation score:
/// a hop-decayed weighted average of each node's contribution, plus a
/// bonus for the sheer number of sanctioned nodes found.
pub fn risk_propagation(analysis: &PathAnalysis) -> u8 {
    if analysis.path_nodes.is_empty() {
        return 0;
    }
    let mut weighted_sum = 0f64;
    let mut weight_sum = 0f64;
    for node in &analysis.path_nodes {
        let w = (1.0 - 0.15 * node.hop as f64).max(0.1);
        weighted_sum += node.risk_contribution as f64 * w;
        weight_sum += w;
    }
    let weighted_avg = if weight_sum > 0.0 {
        weighted_sum / weight_sum
    } else {
        0.0
    };
    let node_penalty = (5.0 * analysis.sanctioned_nodes_found as f64).min(25.0);
    (weighted_avg + node_penalty).round().clamp(0.0, 100.0) as u8
}

/// Confidence in the screening result: starts from whether there were any
/// direct matches at all, then adds a bonus proportional to how much of
/// the transaction graph the walker actually covered.
pub fn confidence_score(matches: &[SanctionMatch], analysis: Option<&PathAnalysis>) -> u8 {
    let mut score: i32 = 0;
    if matches.is_empty() {
        score += 30;
    } else {
        score += 70;
        if matches.len() > 1 {
            score += 10;
        }
    }
    if let Some(a) = analysis {
        if a.total_nodes_analyzed > 0 {
            score += 15;
            if a.total_nodes_analyzed > 10 {
                score += 5;
            }
        }
    }
    score.clamp(0, 100) as u8
}

/// Indirect risk's weight in the final screening score, per the design
/// notes' resolution of the 0.6-vs-0.5 discrepancy in favor of 0.6.
pub const INDIRECT_WEIGHT: f64 = 0.6;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatchType;

    fn direct_match(list_source: ListSource) -> SanctionMatch {
        SanctionMatch {
            list_source,
            entity_name: "TEST".into(),
            entity_id: "1".into(),
            match_type: MatchType::Direct,
            confidence: 100,
            matched_address: "addr".into(),
        }
    }

    #[test]
    fn direct_score_boundaries() {
        assert_eq!(direct_score(&[]), 0);
        assert_eq!(direct_score(&[direct_match(ListSource::Ofac)]), 75);
        assert_eq!(
            direct_score(&[direct_match(ListSource::Ofac), direct_match(ListSource::Ofac)]),
            80
        );
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(bucket(0), RiskLevel::Low);
        assert_eq!(bucket(25), RiskLevel::Low);
        assert_eq!(bucket(26), RiskLevel::Medium);
        assert_eq!(bucket(50), RiskLevel::Medium);
        assert_eq!(bucket(51), RiskLevel::High);
        assert_eq!(bucket(75), RiskLevel::High);
        assert_eq!(bucket(76), RiskLevel::Critical);
        assert_eq!(bucket(100), RiskLevel::Critical);
    }

    #[test]
    fn node_risk_contribution_boundaries() {
        assert_eq!(node_risk_contribution(1, 1), 100);
        assert_eq!(node_risk_contribution(5, 1), 25);
        assert_eq!(node_risk_contribution(6, 1), 25);
    }

    #[test]
    fn confidence_score_boundaries() {
        assert_eq!(confidence_score(&[], None), 30);
        let m = direct_match(ListSource::Ofac);
        let analysis = PathAnalysis {
            target_address: "t".into(),
            max_hops: 5,
            total_nodes_analyzed: 11,
            sanctioned_nodes_found: 0,
            path_nodes: vec![],
            risk_propagation: 0,
        };
        assert_eq!(confidence_score(&[m], Some(&analysis)), 90);
    }

    #[test]
    fn risk_propagation_empty_is_zero() {
        let empty = PathAnalysis::empty("t", 3);
        assert_eq!(risk_propagation(&empty), 0);
    }

    #[test]
    fn risk_propagation_single_hop_two_matches() {
        use crate::model::PathNode;
        let mut analysis = PathAnalysis::empty("t", 5);
        analysis.path_nodes.push(PathNode {
            address: "a".into(),
            txid: "t".into(),
            hop: 2,
            value: 0,
            timestamp_ms: 0,
            risk_contribution: 60,
        });
        analysis.sanctioned_nodes_found = 1;
        // weight at hop 2 = 1 - 0.15*2 = 0.70; weighted avg = 60; penalty = 5
        assert_eq!(risk_propagation(&analysis), 65);
    }
}
