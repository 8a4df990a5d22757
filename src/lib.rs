//! # legal-coord-core
//!
//! The Agent Coordination Core for a multi-agent legal-research backend: a
//! conversation-scoped message bus that routes typed envelopes between a
//! user-facing orchestrator and a set of specialist retrieval agents, fans
//! queries out in parallel, merges partial results under deadlines, and
//! persists a replayable conversation trace.
//!
//! ## Architecture
//!
//! Functional core / imperative shell, the same split the teacher's
//! `database`/`message_router` modules use: validation and pure derivations
//! (envelope construction, result merging, severity/recommendation mapping) are
//! free functions with no I/O; everything that touches the network, the clock,
//! or the filesystem lives behind an async trait ([`coordination::router::Handler`],
//! [`coordination::trace_store::TraceStore`], [`coordination::graph::ContradictionSource`],
//! [`coordination::synthesis::SynthesisClient`], [`coordination::retrieval_agents::RetrievalStrategy`]).

pub mod api;
pub mod config;
pub mod coordination;
pub mod database;
pub mod error;
pub mod observability;
pub mod server;

pub use crate::coordination::domain_types::{
    AgentId, AnalysisResult, AssistantResult, ConversationId, Envelope, MessageId, MessageType,
};
pub use crate::error::AppError;

// Common imports, mirroring the teacher's bottom-of-file re-export convention.
pub use ::tracing::{debug, error, info, instrument, warn};
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use tokio::time::timeout;
pub use uuid::Uuid;
