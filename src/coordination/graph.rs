//! The graph-database collaborator seam used by the orchestrator's
//! `analysis_workflow` to find contradictions among merged nodes.
//!
//! Grounded on `orchestrator_agent.py::_perform_legal_analysis`'s Cypher query for
//! `RELATES_TO` edges with `type = "CONTRADICTS"`, re-expressed as an opaque trait:
//! the core does not know or care that the collaborator is a graph database.

use async_trait::async_trait;

use crate::coordination::domain_types::RawContradiction;
use crate::error::GraphError;

/// Finds contradiction edges among a set of node ids.
#[async_trait]
pub trait ContradictionSource: Send + Sync {
    /// Returns every `RELATES_TO` edge of attribute `type = "CONTRADICTS"` whose
    /// endpoints are both present in `node_ids`.
    async fn contradictions(&self, node_ids: &[String]) -> Result<Vec<RawContradiction>, GraphError>;
}
