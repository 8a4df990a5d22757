//! Retrieval Agents (C3): the uniform handler contract each of local/global/drift
//! wraps around one opaque external strategy.
//!
//! Grounded on `local_graphrag_agent.py`'s `handle_task` / `send_response` /
//! `send_error_response` trio: a strategy failure is reported as a RESULT envelope
//! with `success: false`, never as a thrown error — the router's ERROR synthesis is
//! reserved for genuinely unexpected conditions.

use async_trait::async_trait;
use serde::Deserialize;

use crate::coordination::domain_types::{AgentId, Envelope, RetrievalRecord, StrategyLabel};
use crate::coordination::router::Handler;
use crate::error::StrategyError;

/// The opaque external collaborator each retrieval agent wraps. From the core's
/// perspective local/global/drift differ only in which `RetrievalStrategy` they hold.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Retrieves up to `max_results` nodes/edges/citations for `query`.
    async fn retrieve(&self, query: &str, max_results: usize) -> Result<RetrievalRecord, StrategyError>;
}

#[derive(Debug, Deserialize)]
struct RetrieveTaskPayload {
    query: String,
    max_results: usize,
}

/// A retrieval agent: a thin [`Handler`] adapter around one [`RetrievalStrategy`].
pub struct RetrievalAgent {
    agent_id: AgentId,
    strategy: std::sync::Arc<dyn RetrievalStrategy>,
}

impl RetrievalAgent {
    #[must_use]
    pub fn new(strategy_label: StrategyLabel, strategy: std::sync::Arc<dyn RetrievalStrategy>) -> Self {
        Self {
            agent_id: strategy_label.agent_id(),
            strategy,
        }
    }
}

#[async_trait]
impl Handler for RetrievalAgent {
    async fn handle(&self, envelope: &Envelope) -> Result<Option<Envelope>, String> {
        let task_type = envelope
            .payload
            .get("task_type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        if task_type != "retrieve" {
            return Ok(Some(envelope.result_reply(
                self.agent_id.clone(),
                serde_json::json!({
                    "success": false,
                    "error": format!("{} does not handle task_type {task_type:?}", self.agent_id),
                }),
            )));
        }

        let parsed: Result<RetrieveTaskPayload, _> = serde_json::from_value(envelope.payload.clone());
        let task = match parsed {
            Ok(task) => task,
            Err(source) => {
                return Ok(Some(envelope.result_reply(
                    self.agent_id.clone(),
                    serde_json::json!({
                        "success": false,
                        "error": format!("malformed retrieve task: {source}"),
                    }),
                )));
            }
        };

        match self.strategy.retrieve(&task.query, task.max_results).await {
            Ok(result) => Ok(Some(envelope.result_reply(
                self.agent_id.clone(),
                serde_json::json!({
                    "success": true,
                    "result": result,
                    "original_task": "retrieve",
                    "agent_id": self.agent_id,
                }),
            ))),
            Err(source) => Ok(Some(envelope.result_reply(
                self.agent_id.clone(),
                serde_json::json!({
                    "success": false,
                    "error": source.to_string(),
                }),
            ))),
        }
    }
}
