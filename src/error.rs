//! Top-level and per-component error types.
//!
//! One `thiserror` enum per component boundary, matching the style of
//! `message_router::traits`'s `RouterError`/`DeliveryError`/`ConversationError` family:
//! every variant carries enough structured context to render a useful trace-log line,
//! and `#[from]` is used wherever one error is a thin wrapper over another.

use thiserror::Error;

use crate::coordination::domain_types::{AgentId, ConversationId, MessageId};

/// Errors raised by the Router (C2) and Trace Store (C1).
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("trace store error: {source}")]
    TraceStore {
        #[from]
        source: TraceStoreError,
    },

    #[error("handler {agent_id} failed: {message}")]
    HandlerFailure { agent_id: AgentId, message: String },

    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

/// Errors raised by the SQLite-backed trace store.
#[derive(Debug, Error)]
pub enum TraceStoreError {
    #[error("database error: {source}")]
    Database {
        #[from]
        source: sqlx::Error,
    },

    #[error("migration error: {source}")]
    Migration {
        #[from]
        source: sqlx::migrate::MigrateError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("envelope {message_id} could not be encoded: {source}")]
    Encoding {
        message_id: MessageId,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored envelope for conversation {conversation_id} was malformed: {reason}")]
    Decoding {
        conversation_id: ConversationId,
        reason: String,
    },
}

/// Errors from the conversation manager.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("conversation {conversation_id} not found")]
    NotFound { conversation_id: ConversationId },
}

/// Errors from a `RetrievalStrategy` collaborator.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("{message}")]
    Failed { message: String },
}

/// Errors from the `ContradictionSource` graph collaborator.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph query failed: {message}")]
    QueryFailed { message: String },
}

/// Errors from the `SynthesisClient` collaborator.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis failed: {message}")]
    Failed { message: String },
}

/// Errors surfaced while loading [`crate::config::AppConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {source}")]
    Source {
        #[from]
        source: config::ConfigError,
    },

    #[error("invalid configuration value for {field}: {reason}")]
    Validation { field: String, reason: String },
}

/// Top-level error type for the binary/CLI boundary, unifying every component error
/// so `main.rs` and the CLI can propagate with `?` without one enum per call site,
/// mirroring the teacher's top-level `CaxtonError`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error(transparent)]
    TraceStore(#[from] TraceStoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
