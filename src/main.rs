//! Entry point for the coordination core's server binary.
//!
//! Wires together the Trace Store, Router, Conversation Manager, retrieval
//! agents, and Orchestrator, then serves the API Boundary Adapter's HTTP routes.
//! The retrieval-strategy, graph, and synthesis collaborators are out of scope
//! for the core per SPEC_FULL §1 — the placeholder implementations below stand
//! in until a deployment wires up the real vector store, graph database, and LLM
//! client.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use legal_coord_core::api::ApiState;
use legal_coord_core::config::AppConfig;
use legal_coord_core::coordination::conversation_manager::ConversationManager;
use legal_coord_core::coordination::domain_types::{RawContradiction, RetrievalRecord, StrategyLabel};
use legal_coord_core::coordination::graph::ContradictionSource;
use legal_coord_core::coordination::orchestrator::Orchestrator;
use legal_coord_core::coordination::retrieval_agents::{RetrievalAgent, RetrievalStrategy};
use legal_coord_core::coordination::router::Router;
use legal_coord_core::coordination::synthesis::{SynthesisClient, SynthesisRequest};
use legal_coord_core::coordination::trace_store::{InMemoryTraceStore, SqliteTraceStore, TraceStore};
use legal_coord_core::database::{DatabaseConfig, DatabaseConnection, DatabasePath};
use legal_coord_core::error::{GraphError, StrategyError, SynthesisError};
use tracing::info;

/// An empty-result retrieval strategy; returns zero nodes/edges/citations.
struct PlaceholderStrategy {
    label: StrategyLabel,
}

#[async_trait]
impl RetrievalStrategy for PlaceholderStrategy {
    async fn retrieve(&self, query: &str, _max_results: usize) -> Result<RetrievalRecord, StrategyError> {
        Ok(RetrievalRecord {
            agent_id: self.label.agent_id(),
            strategy: self.label,
            query: query.to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
            citations: Vec::new(),
            coverage: Default::default(),
            confidence: Default::default(),
        })
    }
}

/// A graph collaborator that reports no contradictions.
struct PlaceholderGraph;

#[async_trait]
impl ContradictionSource for PlaceholderGraph {
    async fn contradictions(&self, _node_ids: &[String]) -> Result<Vec<RawContradiction>, GraphError> {
        Ok(Vec::new())
    }
}

/// A synthesis collaborator that echoes the query without calling an LLM.
struct PlaceholderSynthesis;

#[async_trait]
impl SynthesisClient for PlaceholderSynthesis {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, SynthesisError> {
        Ok(format!(
            "No language model is configured; echoing the query: {}",
            request.query
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    legal_coord_core::observability::init_tracing(&config.log_directive, false)
        .map_err(|source| anyhow::anyhow!("failed to initialize tracing: {source}"))?;

    info!("starting legal coordination core");

    let trace_store: Arc<dyn TraceStore> = if config.database_path == ":memory:" {
        Arc::new(InMemoryTraceStore::new())
    } else {
        let path = DatabasePath::new(&config.database_path)?;
        let connection = DatabaseConnection::initialize(DatabaseConfig::new(path)).await?;
        Arc::new(SqliteTraceStore::new(connection))
    };

    let router = Arc::new(Router::new(Arc::clone(&trace_store)));
    let conversation_manager = Arc::new(ConversationManager::new());

    for label in StrategyLabel::ALL {
        let agent = RetrievalAgent::new(label, Arc::new(PlaceholderStrategy { label }));
        router.register(label.agent_id(), Arc::new(agent));
    }

    let orchestrator = Orchestrator::new(
        Arc::clone(&router),
        Arc::clone(&conversation_manager),
        Arc::new(PlaceholderGraph),
        Arc::new(PlaceholderSynthesis),
    );
    router.register(Orchestrator::agent_id(), Arc::new(orchestrator));

    spawn_conversation_sweep(Arc::clone(&conversation_manager));
    spawn_trace_cleanup(Arc::clone(&trace_store));

    let state = ApiState {
        router,
        trace_store: Arc::clone(&trace_store),
        conversation_manager,
    };

    let (listener, addr) = legal_coord_core::server::start_server(&config).await?;
    info!(%addr, "listening");
    let app = legal_coord_core::server::create_router(state);
    legal_coord_core::server::serve(listener, app).await?;

    trace_store.close().await;

    Ok(())
}

/// Periodically reaps expired conversations, mirroring the teacher's
/// `tokio::spawn` + `tokio::time::interval` background-task pattern.
fn spawn_conversation_sweep(conversation_manager: Arc<ConversationManager>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = conversation_manager.sweep();
            if !removed.is_empty() {
                info!(count = removed.len(), "swept expired conversations");
            }
        }
    });
}

/// How many hours a trace envelope is retained before `spawn_trace_cleanup` removes
/// it. The Trace Store is a replay log, not the conversation's source of truth, so
/// this is deliberately much longer than any single envelope's TTL.
const TRACE_RETENTION_HOURS: i64 = 24;

/// Periodically deletes trace envelopes older than [`TRACE_RETENTION_HOURS`], the
/// second of the two periodic jobs named in SPEC_FULL §5 (conversation sweep being
/// the first). Runs on the same one-minute cadence as the conversation sweep.
fn spawn_trace_cleanup(trace_store: Arc<dyn TraceStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let older_than = chrono::Utc::now() - chrono::Duration::hours(TRACE_RETENTION_HOURS);
            match trace_store.cleanup(older_than).await {
                Ok(count) if count > 0 => info!(count, "swept expired trace envelopes"),
                Ok(_) => {}
                Err(source) => tracing::warn!(%source, "trace cleanup failed"),
            }
        }
    });
}
