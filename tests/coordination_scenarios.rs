//! Integration tests exercising the coordination core end to end: envelopes flow
//! through the real [`Router`] into real [`RetrievalAgent`]/[`Orchestrator`]
//! handlers, backed by an in-memory trace store and stub external collaborators.
//!
//! Scenarios mirror the worked examples named in the specification this crate
//! implements.

use std::sync::Arc;

use async_trait::async_trait;
use legal_coord_core::coordination::domain_types::{
    AgentId, ConversationId, Envelope, MessageType, Node, RawContradiction, RetrievalRecord,
    StrategyLabel, Ttl, UnitScore,
};
use legal_coord_core::coordination::graph::ContradictionSource;
use legal_coord_core::coordination::orchestrator::Orchestrator;
use legal_coord_core::coordination::retrieval_agents::{RetrievalAgent, RetrievalStrategy};
use legal_coord_core::coordination::router::{Handler, Router};
use legal_coord_core::coordination::synthesis::SynthesisClient;
use legal_coord_core::coordination::trace_store::{InMemoryTraceStore, TraceStore};
use legal_coord_core::error::{GraphError, StrategyError, SynthesisError};

struct FixedStrategy {
    label: StrategyLabel,
    nodes: Vec<(&'static str, f64)>,
}

#[async_trait]
impl RetrievalStrategy for FixedStrategy {
    async fn retrieve(&self, query: &str, _max_results: usize) -> Result<RetrievalRecord, StrategyError> {
        Ok(RetrievalRecord {
            agent_id: self.label.agent_id(),
            strategy: self.label,
            query: query.to_string(),
            nodes: self
                .nodes
                .iter()
                .map(|(id, score)| Node {
                    id: (*id).to_string(),
                    node_type: "case".to_string(),
                    content: format!("content for {id}"),
                    metadata: serde_json::json!({}),
                    score: UnitScore::try_new(*score).unwrap(),
                })
                .collect(),
            edges: Vec::new(),
            citations: Vec::new(),
            coverage: UnitScore::try_new(0.5).unwrap(),
            confidence: UnitScore::try_new(0.5).unwrap(),
        })
    }
}

struct FailingStrategy;

#[async_trait]
impl RetrievalStrategy for FailingStrategy {
    async fn retrieve(&self, _query: &str, _max_results: usize) -> Result<RetrievalRecord, StrategyError> {
        Err(StrategyError::Failed {
            message: "upstream unavailable".to_string(),
        })
    }
}

struct StubSynthesis;

#[async_trait]
impl SynthesisClient for StubSynthesis {
    async fn synthesize(&self, request: &legal_coord_core::coordination::synthesis::SynthesisRequest) -> Result<String, SynthesisError> {
        Ok(format!("synthesized answer for {}", request.query))
    }
}

struct EmptyGraph;

#[async_trait]
impl ContradictionSource for EmptyGraph {
    async fn contradictions(&self, _node_ids: &[String]) -> Result<Vec<RawContradiction>, GraphError> {
        Ok(Vec::new())
    }
}

struct FixedGraph {
    contradictions: Vec<RawContradiction>,
}

#[async_trait]
impl ContradictionSource for FixedGraph {
    async fn contradictions(&self, _node_ids: &[String]) -> Result<Vec<RawContradiction>, GraphError> {
        Ok(self.contradictions.clone())
    }
}

fn agent_id(raw: &str) -> AgentId {
    AgentId::try_from(raw.to_string()).unwrap()
}

fn new_conversation() -> ConversationId {
    ConversationId::generate()
}

#[tokio::test]
async fn test_s1_ttl_expired_envelope_is_dropped_but_traced() {
    let trace_store: Arc<dyn TraceStore> = Arc::new(InMemoryTraceStore::new());
    let router = Router::new(Arc::clone(&trace_store));
    router.register(
        agent_id("local_agent"),
        Arc::new(RetrievalAgent::new(
            StrategyLabel::Local,
            Arc::new(FixedStrategy {
                label: StrategyLabel::Local,
                nodes: vec![("N1", 0.5)],
            }),
        )),
    );

    let conversation_id = new_conversation();
    let mut envelope = Envelope::new(
        conversation_id,
        MessageType::Task,
        agent_id("client"),
        Some(agent_id("local_agent")),
        Ttl::try_new(1).unwrap(),
        serde_json::json!({"task_type": "retrieve", "query": "q", "max_results": 5}),
    );
    envelope.timestamp = chrono::Utc::now() - chrono::Duration::seconds(2);

    let reply = router.route(envelope.clone()).await;
    assert!(reply.is_none());

    let trace = trace_store.by_conversation(conversation_id).await.unwrap();
    assert_eq!(trace.len(), 1);
    assert_eq!(trace[0].message_id, envelope.message_id);
}

#[tokio::test]
async fn test_s2_hybrid_happy_path_merges_all_three_agents() {
    let trace_store: Arc<dyn TraceStore> = Arc::new(InMemoryTraceStore::new());
    let router = Arc::new(Router::new(Arc::clone(&trace_store)));

    router.register(
        StrategyLabel::Local.agent_id(),
        Arc::new(RetrievalAgent::new(
            StrategyLabel::Local,
            Arc::new(FixedStrategy {
                label: StrategyLabel::Local,
                nodes: vec![("N1", 0.5), ("N2", 0.5)],
            }),
        )),
    );
    router.register(
        StrategyLabel::Global.agent_id(),
        Arc::new(RetrievalAgent::new(
            StrategyLabel::Global,
            Arc::new(FixedStrategy {
                label: StrategyLabel::Global,
                nodes: vec![("N3", 0.5), ("N4", 0.5), ("N5", 0.5)],
            }),
        )),
    );
    router.register(
        StrategyLabel::Drift.agent_id(),
        Arc::new(RetrievalAgent::new(
            StrategyLabel::Drift,
            Arc::new(FixedStrategy {
                label: StrategyLabel::Drift,
                nodes: vec![("N6", 0.5), ("N7", 0.5), ("N8", 0.5), ("N9", 0.5)],
            }),
        )),
    );

    let conversation_manager = Arc::new(
        legal_coord_core::coordination::conversation_manager::ConversationManager::new(),
    );
    let orchestrator = Orchestrator::new(
        Arc::clone(&router),
        conversation_manager,
        Arc::new(EmptyGraph),
        Arc::new(StubSynthesis),
    );
    router.register(Orchestrator::agent_id(), Arc::new(orchestrator));

    let conversation_id = new_conversation();
    let envelope = Envelope::new(
        conversation_id,
        MessageType::Task,
        agent_id("client"),
        Some(Orchestrator::agent_id()),
        Ttl::default_a2a_timeout(),
        serde_json::json!({
            "task_type": "assistant_workflow",
            "query": "what is the rule?",
            "strategy": "hybrid",
            "max_results": 12,
        }),
    );

    let reply = router.route(envelope).await.expect("orchestrator should reply");
    assert_eq!(reply.message_type, MessageType::Result);
    let payload = reply.payload;
    assert_eq!(payload["success"], true);
    let result = &payload["result"];
    assert_eq!(result["nodes"].as_array().unwrap().len(), 9);
    let agents_used: Vec<String> = result["metadata"]["agents_used"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(agents_used, vec!["local_agent", "global_agent", "drift_agent"]);
}

#[tokio::test]
async fn test_s3_collision_merge_keeps_higher_score() {
    use legal_coord_core::coordination::merger::merge;

    let low = RetrievalRecord {
        agent_id: StrategyLabel::Local.agent_id(),
        strategy: StrategyLabel::Local,
        query: "q".to_string(),
        nodes: vec![Node {
            id: "N1".to_string(),
            node_type: "case".to_string(),
            content: "low".to_string(),
            metadata: serde_json::json!({}),
            score: UnitScore::try_new(0.6).unwrap(),
        }],
        edges: Vec::new(),
        citations: Vec::new(),
        coverage: UnitScore::try_new(0.5).unwrap(),
        confidence: UnitScore::try_new(0.5).unwrap(),
    };
    let high = RetrievalRecord {
        agent_id: StrategyLabel::Global.agent_id(),
        strategy: StrategyLabel::Global,
        query: "q".to_string(),
        nodes: vec![Node {
            id: "N1".to_string(),
            node_type: "case".to_string(),
            content: "high".to_string(),
            metadata: serde_json::json!({}),
            score: UnitScore::try_new(0.9).unwrap(),
        }],
        edges: Vec::new(),
        citations: Vec::new(),
        coverage: UnitScore::try_new(0.5).unwrap(),
        confidence: UnitScore::try_new(0.5).unwrap(),
    };

    let merged = merge(&[low, high]);
    assert_eq!(merged.nodes.len(), 1);
    assert_eq!(merged.nodes[0].content, "high");
    assert!((merged.nodes[0].score.as_f64() - 0.9).abs() < f64::EPSILON);
}

struct PayloadEchoAgent {
    label: StrategyLabel,
}

#[async_trait]
impl Handler for PayloadEchoAgent {
    async fn handle(&self, envelope: &Envelope) -> Result<Option<Envelope>, String> {
        Ok(Some(envelope.result_reply(
            self.label.agent_id(),
            serde_json::json!({"success": false, "error": "backend down"}),
        )))
    }
}

#[tokio::test]
async fn test_s4_one_agent_errors_remaining_two_still_merge() {
    let trace_store: Arc<dyn TraceStore> = Arc::new(InMemoryTraceStore::new());
    let router = Arc::new(Router::new(Arc::clone(&trace_store)));

    router.register(
        StrategyLabel::Local.agent_id(),
        Arc::new(RetrievalAgent::new(
            StrategyLabel::Local,
            Arc::new(FixedStrategy {
                label: StrategyLabel::Local,
                nodes: vec![("N1", 0.5)],
            }),
        )),
    );
    router.register(
        StrategyLabel::Global.agent_id(),
        Arc::new(PayloadEchoAgent {
            label: StrategyLabel::Global,
        }),
    );
    router.register(
        StrategyLabel::Drift.agent_id(),
        Arc::new(RetrievalAgent::new(
            StrategyLabel::Drift,
            Arc::new(FixedStrategy {
                label: StrategyLabel::Drift,
                nodes: vec![("N2", 0.5)],
            }),
        )),
    );

    let conversation_manager = Arc::new(
        legal_coord_core::coordination::conversation_manager::ConversationManager::new(),
    );
    let orchestrator = Orchestrator::new(
        Arc::clone(&router),
        conversation_manager,
        Arc::new(EmptyGraph),
        Arc::new(StubSynthesis),
    );
    router.register(Orchestrator::agent_id(), Arc::new(orchestrator));

    let envelope = Envelope::new(
        new_conversation(),
        MessageType::Task,
        agent_id("client"),
        Some(Orchestrator::agent_id()),
        Ttl::default_a2a_timeout(),
        serde_json::json!({
            "task_type": "assistant_workflow",
            "query": "q",
            "strategy": "hybrid",
            "max_results": 9,
        }),
    );

    let reply = router.route(envelope).await.expect("orchestrator should reply");
    let payload = reply.payload;
    assert_eq!(payload["success"], true);
    let agents_used: Vec<String> = payload["result"]["metadata"]["agents_used"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(agents_used, vec!["local_agent", "drift_agent"]);
    assert_eq!(payload["result"]["metadata"]["strategy"], "hybrid");
}

#[tokio::test]
async fn test_s5_all_agents_error_yields_failure_reply() {
    let trace_store: Arc<dyn TraceStore> = Arc::new(InMemoryTraceStore::new());
    let router = Arc::new(Router::new(Arc::clone(&trace_store)));

    for label in StrategyLabel::ALL {
        router.register(
            label.agent_id(),
            Arc::new(RetrievalAgent::new(label, Arc::new(FailingStrategy))),
        );
    }

    let conversation_manager = Arc::new(
        legal_coord_core::coordination::conversation_manager::ConversationManager::new(),
    );
    let orchestrator = Orchestrator::new(
        Arc::clone(&router),
        conversation_manager,
        Arc::new(EmptyGraph),
        Arc::new(StubSynthesis),
    );
    router.register(Orchestrator::agent_id(), Arc::new(orchestrator));

    let envelope = Envelope::new(
        new_conversation(),
        MessageType::Task,
        agent_id("client"),
        Some(Orchestrator::agent_id()),
        Ttl::default_a2a_timeout(),
        serde_json::json!({
            "task_type": "assistant_workflow",
            "query": "q",
            "strategy": "hybrid",
            "max_results": 9,
        }),
    );

    let reply = router.route(envelope).await.expect("orchestrator should reply");
    let payload = reply.payload;
    assert_eq!(payload["success"], false);
    assert_eq!(payload["error"], "all agents failed");
}

#[tokio::test]
async fn test_s6_analysis_produces_one_high_priority_recommendation() {
    let trace_store: Arc<dyn TraceStore> = Arc::new(InMemoryTraceStore::new());
    let router = Arc::new(Router::new(Arc::clone(&trace_store)));

    router.register(
        StrategyLabel::Local.agent_id(),
        Arc::new(RetrievalAgent::new(
            StrategyLabel::Local,
            Arc::new(FixedStrategy {
                label: StrategyLabel::Local,
                nodes: vec![("A", 0.5)],
            }),
        )),
    );
    router.register(
        StrategyLabel::Global.agent_id(),
        Arc::new(RetrievalAgent::new(
            StrategyLabel::Global,
            Arc::new(FixedStrategy {
                label: StrategyLabel::Global,
                nodes: vec![("B", 0.5)],
            }),
        )),
    );
    router.register(
        StrategyLabel::Drift.agent_id(),
        Arc::new(RetrievalAgent::new(
            StrategyLabel::Drift,
            Arc::new(FixedStrategy {
                label: StrategyLabel::Drift,
                nodes: vec![],
            }),
        )),
    );

    let graph = FixedGraph {
        contradictions: vec![RawContradiction {
            source_node_id: "A".to_string(),
            target_node_id: "B".to_string(),
            priority: "high".to_string(),
            severity: Some("high".to_string()),
            category: "x".to_string(),
            description: "conflicting holdings".to_string(),
        }],
    };

    let conversation_manager = Arc::new(
        legal_coord_core::coordination::conversation_manager::ConversationManager::new(),
    );
    let orchestrator = Orchestrator::new(
        Arc::clone(&router),
        conversation_manager,
        Arc::new(graph),
        Arc::new(StubSynthesis),
    );
    router.register(Orchestrator::agent_id(), Arc::new(orchestrator));

    let envelope = Envelope::new(
        new_conversation(),
        MessageType::Task,
        agent_id("client"),
        Some(Orchestrator::agent_id()),
        Ttl::default_a2a_timeout(),
        serde_json::json!({
            "task_type": "analysis_workflow",
            "query": "q",
            "analysis_type": "contradiction",
            "max_depth": 3,
        }),
    );

    let reply = router.route(envelope).await.expect("orchestrator should reply");
    let payload = reply.payload;
    assert_eq!(payload["success"], true);
    let result = &payload["result"];
    assert_eq!(result["contradictions"].as_array().unwrap().len(), 1);
    assert_eq!(result["harmonizations"].as_array().unwrap().len(), 1);
    let recommendation = &result["recommendations"][0];
    assert_eq!(recommendation["priority"], "high");
    assert_eq!(recommendation["timeline"], "Short-term (30 days)");
    assert_eq!(result["stats"]["high_priority"], 1);
}

#[tokio::test]
async fn test_unregistered_recipient_yields_no_reply() {
    let trace_store: Arc<dyn TraceStore> = Arc::new(InMemoryTraceStore::new());
    let router = Router::new(trace_store);

    let envelope = Envelope::new(
        new_conversation(),
        MessageType::Task,
        agent_id("client"),
        Some(agent_id("nobody_home")),
        Ttl::default_a2a_timeout(),
        serde_json::json!({"task_type": "retrieve", "query": "q", "max_results": 1}),
    );

    assert!(router.route(envelope).await.is_none());
}

#[tokio::test]
async fn test_unknown_task_type_yields_failure_reply() {
    let trace_store: Arc<dyn TraceStore> = Arc::new(InMemoryTraceStore::new());
    let router = Arc::new(Router::new(Arc::clone(&trace_store)));
    let conversation_manager = Arc::new(
        legal_coord_core::coordination::conversation_manager::ConversationManager::new(),
    );
    let orchestrator = Orchestrator::new(
        Arc::clone(&router),
        conversation_manager,
        Arc::new(EmptyGraph),
        Arc::new(StubSynthesis),
    );
    router.register(Orchestrator::agent_id(), Arc::new(orchestrator));

    let envelope = Envelope::new(
        new_conversation(),
        MessageType::Task,
        agent_id("client"),
        Some(Orchestrator::agent_id()),
        Ttl::default_a2a_timeout(),
        serde_json::json!({"task_type": "brew_coffee"}),
    );

    let reply = router.route(envelope).await.expect("orchestrator should reply");
    assert_eq!(reply.payload["success"], false);
    assert_eq!(reply.payload["error"], "Unknown task type: brew_coffee");
}
