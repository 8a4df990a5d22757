//! The Agent Coordination Core: envelope trace, router, retrieval agents, result
//! merger, orchestrator, conversation manager, and the collaborator seams they
//! depend on (graph queries, LLM synthesis, retrieval strategies).

pub mod conversation_manager;
pub mod domain_types;
pub mod graph;
pub mod merger;
pub mod orchestrator;
pub mod retrieval_agents;
pub mod router;
pub mod synthesis;
pub mod trace_store;

pub use conversation_manager::ConversationManager;
pub use orchestrator::Orchestrator;
pub use router::{Handler, Router};
pub use trace_store::{InMemoryTraceStore, SqliteTraceStore, TraceStore};
