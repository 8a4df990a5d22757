//! Orchestrator (C5): the task-type state machine that fans queries out to the
//! retrieval agents, merges their replies, and produces the final conversation
//! response.
//!
//! Grounded on `orchestrator_agent.py`'s `process_task` dispatch and
//! `_generate_ai_response`/`_perform_legal_analysis` workflows, with the Python
//! original's sequential `for agent in agents: await agent.retrieve(...)` loop
//! replaced by genuine concurrent fan-out (`futures::future::join_all` +
//! `tokio::time::timeout`), per SPEC_FULL §4.5.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::coordination::conversation_manager::ConversationManager;
use crate::coordination::domain_types::{
    AgentId, AnalysisResult, AssistantResult, AssistantResultMetadata, Contradiction, Envelope,
    Harmonization, MessageType, RawContradiction, Recommendation, RetrievalRecord,
    RetrievalStrategySelector, Severity, Ttl, UnitScore,
};
use crate::coordination::graph::ContradictionSource;
use crate::coordination::merger::merge;
use crate::coordination::router::{Handler, Router};
use crate::coordination::synthesis::{build_request, fallback_text, SynthesisClient};
use crate::error::SynthesisError;

#[derive(Debug, Deserialize)]
struct AssistantWorkflowPayload {
    query: String,
    #[serde(default = "default_strategy")]
    strategy: String,
    max_results: usize,
}

fn default_strategy() -> String {
    "hybrid".to_string()
}

#[derive(Debug, Deserialize)]
struct AnalysisWorkflowPayload {
    query: String,
    #[allow(dead_code)]
    analysis_type: String,
    #[allow(dead_code)]
    max_depth: usize,
}

/// The orchestrator, registered with the [`Router`] under the agent id
/// `"orchestrator"`.
pub struct Orchestrator {
    router: Arc<Router>,
    conversation_manager: Arc<ConversationManager>,
    contradiction_source: Arc<dyn ContradictionSource>,
    synthesis_client: Arc<dyn SynthesisClient>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        router: Arc<Router>,
        conversation_manager: Arc<ConversationManager>,
        contradiction_source: Arc<dyn ContradictionSource>,
        synthesis_client: Arc<dyn SynthesisClient>,
    ) -> Self {
        Self {
            router,
            conversation_manager,
            contradiction_source,
            synthesis_client,
        }
    }

    /// The fixed agent id the orchestrator registers under.
    #[must_use]
    pub fn agent_id() -> AgentId {
        AgentId::try_from("orchestrator".to_string()).expect("literal satisfies AgentId bounds")
    }

    /// Per §4.5 step 2: `floor(max_results / |agents|)` once more than one agent is
    /// selected, else `max_results` unchanged. Deliberately unclamped — a budget of
    /// zero is well-formed per SPEC_FULL §9's open-question resolution.
    fn per_agent_budget(max_results: usize, agent_count: usize) -> usize {
        if agent_count > 1 {
            max_results / agent_count
        } else {
            max_results
        }
    }

    async fn fan_out(
        &self,
        envelope: &Envelope,
        agents: &[AgentId],
        per_agent_budget: usize,
        query: &str,
    ) -> Vec<RetrievalRecord> {
        let now = chrono::Utc::now();
        let deadline = envelope.remaining(now);

        let tasks = agents.iter().map(|agent_id| {
            let router = Arc::clone(&self.router);
            let task_envelope = Envelope::new(
                envelope.conversation_id,
                MessageType::Task,
                Self::agent_id(),
                Some(agent_id.clone()),
                Ttl::default_a2a_timeout(),
                serde_json::json!({
                    "task_type": "retrieve",
                    "query": query,
                    "max_results": per_agent_budget,
                }),
            );
            // `route` runs on its own spawned task so the timeout below only bounds how
            // long the orchestrator waits for it; a laggard keeps running to completion
            // after the wait gives up, so the Router still appends its reply to the
            // trace once it arrives, per SPEC_FULL §5.
            let handle = tokio::spawn(async move { router.route(task_envelope).await });
            async move { tokio::time::timeout(deadline, handle).await }
        });

        let replies = futures::future::join_all(tasks).await;

        replies
            .into_iter()
            .filter_map(|outcome| outcome.ok().and_then(Result::ok).flatten())
            .filter(|reply| reply.payload.get("success").and_then(serde_json::Value::as_bool) == Some(true))
            .filter_map(|reply| serde_json::from_value::<RetrievalRecord>(reply.payload["result"].clone()).ok())
            .collect()
    }

    async fn assistant_workflow(&self, envelope: &Envelope) -> Envelope {
        let task: AssistantWorkflowPayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(task) => task,
            Err(source) => {
                return failure_reply(envelope, &format!("malformed assistant_workflow task: {source}"));
            }
        };

        let agents: Vec<AgentId> = RetrievalStrategySelector::parse(&task.strategy)
            .agents()
            .into_iter()
            .map(crate::coordination::domain_types::StrategyLabel::agent_id)
            .collect();
        let per_agent_budget = Self::per_agent_budget(task.max_results, agents.len());

        let records = self.fan_out(envelope, &agents, per_agent_budget, &task.query).await;
        if records.is_empty() {
            return failure_reply(envelope, "all agents failed");
        }

        let merged = merge(&records);
        let strategy_label = task.strategy.clone();
        let request = build_request(&task.query, &merged.citations, &strategy_label);

        let (response_text, synthesis_fallback) = match self.synthesis_client.synthesize(&request).await {
            Ok(text) => (text, None),
            Err(source) => (fallback_text(&source), Some("fallback".to_string())),
        };

        let result = AssistantResult {
            response_text,
            conversation_id: envelope.conversation_id,
            citations: merged.citations,
            nodes: merged.nodes,
            edges: merged.edges,
            metadata: AssistantResultMetadata {
                strategy: strategy_label,
                coverage: merged.coverage,
                confidence: merged.confidence,
                agents_used: merged.agents_used,
                synthesis: synthesis_fallback,
            },
        };

        envelope.result_reply(
            Self::agent_id(),
            serde_json::json!({
                "success": true,
                "result": result,
                "original_task": "assistant_workflow",
            }),
        )
    }

    async fn analysis_workflow(&self, envelope: &Envelope) -> Envelope {
        let task: AnalysisWorkflowPayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(task) => task,
            Err(source) => {
                return failure_reply(envelope, &format!("malformed analysis_workflow task: {source}"));
            }
        };

        const ANALYSIS_MAX_RESULTS: usize = 15;
        let agents: Vec<AgentId> = crate::coordination::domain_types::StrategyLabel::ALL
            .iter()
            .map(|label| label.agent_id())
            .collect();
        let per_agent_budget = Self::per_agent_budget(ANALYSIS_MAX_RESULTS, agents.len());

        let records = self.fan_out(envelope, &agents, per_agent_budget, &task.query).await;
        if records.is_empty() {
            return failure_reply(envelope, "all agents failed");
        }

        let merged = merge(&records);
        let node_ids: Vec<String> = merged.nodes.iter().map(|node| node.id.clone()).collect();

        let raw_contradictions = match self.contradiction_source.contradictions(&node_ids).await {
            Ok(raw) => raw,
            Err(source) => {
                return failure_reply(envelope, &format!("graph query failed: {source}"));
            }
        };

        let contradictions: Vec<Contradiction> = raw_contradictions
            .into_iter()
            .enumerate()
            .map(|(index, raw)| build_contradiction(index, raw))
            .collect();

        let harmonizations: Vec<Harmonization> = contradictions.iter().map(build_harmonization).collect();
        let recommendations: Vec<Recommendation> = contradictions.iter().map(build_recommendation).collect();
        let stats = severity_stats(&contradictions);
        let summary = build_summary(&contradictions, &stats);

        let result = AnalysisResult {
            query: task.query,
            contradictions,
            recommendations,
            summary,
            confidence: merged.confidence,
            stats,
            harmonizations,
            citations: merged.citations,
        };

        envelope.result_reply(
            Self::agent_id(),
            serde_json::json!({
                "success": true,
                "result": result,
                "original_task": "analysis_workflow",
            }),
        )
    }
}

fn failure_reply(envelope: &Envelope, error: &str) -> Envelope {
    envelope.result_reply(
        Orchestrator::agent_id(),
        serde_json::json!({
            "success": false,
            "error": error,
        }),
    )
}

fn parse_severity(raw: &str) -> Severity {
    match raw {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        _ => Severity::Low,
    }
}

fn build_contradiction(index: usize, raw: RawContradiction) -> Contradiction {
    let severity = raw
        .severity
        .as_deref()
        .map(parse_severity)
        .unwrap_or_else(|| Severity::from_priority(&raw.priority));

    Contradiction {
        id: format!("contradiction-{index}"),
        title: format!("Conflict between {} and {}", raw.source_node_id, raw.target_node_id),
        description: raw.description,
        severity,
        priority: raw.priority,
        category: raw.category,
        sources: vec![raw.source_node_id, raw.target_node_id],
        impact: format!("{severity:?} severity conflict may affect compliance obligations"),
        recommendation: recommendation_text(severity),
    }
}

fn recommendation_text(severity: Severity) -> String {
    match severity {
        Severity::Critical => "Resolve immediately through controlling authority review.".to_string(),
        Severity::High => "Schedule a short-term harmonization review.".to_string(),
        Severity::Medium => "Plan a medium-term alignment review.".to_string(),
        Severity::Low => "Monitor; no immediate action required.".to_string(),
    }
}

fn build_harmonization(contradiction: &Contradiction) -> Harmonization {
    Harmonization {
        contradiction_id: contradiction.id.clone(),
        title: format!("Harmonize: {}", contradiction.title),
        suggestion: "Align the conflicting provisions under a single controlling authority.".to_string(),
    }
}

fn build_recommendation(contradiction: &Contradiction) -> Recommendation {
    let (priority, timeline, cost_impact) = match contradiction.severity {
        Severity::Critical => ("high", "Immediate (7 days)", "Critical – immediate compliance costs"),
        Severity::High => ("high", "Short-term (30 days)", "High – compliance and harmonization costs"),
        Severity::Medium => ("medium", "Medium-term (90 days)", "Medium – review and alignment costs"),
        Severity::Low => ("low", "Long-term (180 days)", "Low – monitoring and review costs"),
    };

    Recommendation {
        contradiction_id: contradiction.id.clone(),
        priority: priority.to_string(),
        timeline: timeline.to_string(),
        cost_impact: cost_impact.to_string(),
    }
}

/// Counts contradictions by severity under the `"<severity>_priority"` keys the
/// scenario in SPEC_FULL §8 (S6) asserts on, e.g. `stats.high_priority`.
fn severity_stats(contradictions: &[Contradiction]) -> BTreeMap<String, usize> {
    let mut stats = BTreeMap::new();
    for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low] {
        stats.insert(format!("{}_priority", severity.as_str()), 0);
    }
    for contradiction in contradictions {
        *stats
            .entry(format!("{}_priority", contradiction.severity.as_str()))
            .or_insert(0) += 1;
    }
    stats
}

fn build_summary(contradictions: &[Contradiction], stats: &BTreeMap<String, usize>) -> String {
    if contradictions.is_empty() {
        return "No contradictions found. Consider broadening the query.".to_string();
    }

    let breakdown: Vec<String> = [Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
        .iter()
        .filter_map(|severity| {
            let count = stats.get(&format!("{}_priority", severity.as_str())).copied().unwrap_or(0);
            (count > 0).then(|| format!("{count} {}", severity.as_str()))
        })
        .collect();

    format!(
        "Found {} contradiction(s): {}.",
        contradictions.len(),
        breakdown.join(", ")
    )
}

#[async_trait]
impl Handler for Orchestrator {
    async fn handle(&self, envelope: &Envelope) -> Result<Option<Envelope>, String> {
        self.conversation_manager.touch(envelope.conversation_id, envelope.ttl);

        let task_type = envelope
            .payload
            .get("task_type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        let reply = match task_type {
            "assistant_workflow" => self.assistant_workflow(envelope).await,
            "analysis_workflow" => self.analysis_workflow(envelope).await,
            other => failure_reply(envelope, &format!("Unknown task type: {other}")),
        };

        Ok(Some(reply))
    }
}
