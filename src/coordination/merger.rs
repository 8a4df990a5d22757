//! Result Merger (C4): deterministic union of retrieval records across agents.
//!
//! A pure function, grounded on `orchestrator_agent.py`'s node/edge aggregation —
//! recast with the exact collision rules from SPEC_FULL §4.4, which supersede the
//! original's later-write-wins dict overwrite.

use std::collections::HashMap;

use crate::coordination::domain_types::{
    AgentId, Citation, Edge, MergedRetrievalRecord, Node, RetrievalRecord, UnitScore,
};

/// Merges `records` into one [`MergedRetrievalRecord`].
///
/// - `nodes` are unioned by `id`; on collision the higher-`score` node wins, ties
///   keep the first-seen node.
/// - `edges` are unioned by `(source, target, type)`; on collision the first-seen
///   edge wins.
/// - `citations` are unioned by `node_id`; on collision the first-seen citation wins.
/// - `coverage` and `confidence` are the arithmetic mean across `records` (zero for
///   empty input).
/// - `agents_used` is `records`' agent ids, deduplicated in input order.
///
/// Deterministic for a fixed `records` ordering; callers control that ordering.
#[must_use]
pub fn merge(records: &[RetrievalRecord]) -> MergedRetrievalRecord {
    let query = records
        .first()
        .map(|record| record.query.clone())
        .unwrap_or_default();

    let mut node_order: Vec<String> = Vec::new();
    let mut nodes: HashMap<String, Node> = HashMap::new();
    for record in records {
        for node in &record.nodes {
            match nodes.get(&node.id) {
                None => {
                    node_order.push(node.id.clone());
                    nodes.insert(node.id.clone(), node.clone());
                }
                Some(existing) => {
                    if node.score.as_f64() > existing.score.as_f64() {
                        nodes.insert(node.id.clone(), node.clone());
                    }
                }
            }
        }
    }
    let nodes: Vec<Node> = node_order
        .into_iter()
        .map(|id| nodes.remove(&id).expect("id was just pushed into node_order"))
        .collect();

    let mut edge_order: Vec<(String, String, String)> = Vec::new();
    let mut edges: HashMap<(String, String, String), Edge> = HashMap::new();
    for record in records {
        for edge in &record.edges {
            let key = (edge.source.clone(), edge.target.clone(), edge.edge_type.clone());
            if !edges.contains_key(&key) {
                edge_order.push(key.clone());
                edges.insert(key, edge.clone());
            }
        }
    }
    let edges: Vec<Edge> = edge_order
        .into_iter()
        .map(|key| edges.remove(&key).expect("key was just pushed into edge_order"))
        .collect();

    let mut citation_order: Vec<String> = Vec::new();
    let mut citations: HashMap<String, Citation> = HashMap::new();
    for record in records {
        for citation in &record.citations {
            if !citations.contains_key(&citation.node_id) {
                citation_order.push(citation.node_id.clone());
                citations.insert(citation.node_id.clone(), citation.clone());
            }
        }
    }
    let citations: Vec<Citation> = citation_order
        .into_iter()
        .map(|id| citations.remove(&id).expect("id was just pushed into citation_order"))
        .collect();

    let (coverage, confidence) = if records.is_empty() {
        (UnitScore::default(), UnitScore::default())
    } else {
        #[allow(clippy::cast_precision_loss)]
        let count = records.len() as f64;
        let coverage_sum: f64 = records.iter().map(|r| r.coverage.as_f64()).sum();
        let confidence_sum: f64 = records.iter().map(|r| r.confidence.as_f64()).sum();
        (
            UnitScore::try_new(coverage_sum / count).unwrap_or_default(),
            UnitScore::try_new(confidence_sum / count).unwrap_or_default(),
        )
    };

    let mut agents_used: Vec<AgentId> = Vec::new();
    for record in records {
        if !agents_used.contains(&record.agent_id) {
            agents_used.push(record.agent_id.clone());
        }
    }

    MergedRetrievalRecord {
        query,
        nodes,
        edges,
        citations,
        coverage,
        confidence,
        agents_used,
    }
}
