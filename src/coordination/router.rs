//! Router (C2): the sole dispatch entry point between every component in the core.
//!
//! Grounded on the original system's `A2AAdapter.route` (TTL check, best-effort
//! trace append, handler dispatch, ERROR synthesis on unexpected failure), recast
//! with the teacher's `Arc<dyn Trait>` + `DashMap` handler-registry DI style.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::coordination::domain_types::{AgentId, Envelope};
use crate::coordination::trace_store::TraceStore;

/// A component capable of handling a TASK envelope addressed to it.
///
/// `Err` is reserved for unrecoverable, unexpected failure (a panic-equivalent) —
/// per §4.2 step 5 the router turns this into a synthesized ERROR reply. A handler
/// that completed but wants to report a business failure (e.g. a retrieval agent
/// whose strategy call errored) replies with `Ok(Some(reply))` carrying
/// `success: false` in its payload instead of returning `Err`.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles `envelope`, returning an optional reply envelope.
    async fn handle(&self, envelope: &Envelope) -> Result<Option<Envelope>, String>;
}

/// Dispatches envelopes to registered handlers, appending every dispatched or
/// synthesized envelope to the trace store along the way.
pub struct Router {
    handlers: DashMap<AgentId, Arc<dyn Handler>>,
    trace_store: Arc<dyn TraceStore>,
}

impl Router {
    #[must_use]
    pub fn new(trace_store: Arc<dyn TraceStore>) -> Self {
        Self {
            handlers: DashMap::new(),
            trace_store,
        }
    }

    /// Installs `handler` under `agent_id`. A second registration for the same id
    /// overwrites the first.
    pub fn register(&self, agent_id: AgentId, handler: Arc<dyn Handler>) {
        self.handlers.insert(agent_id, handler);
    }

    /// Routes `envelope` to its recipient's handler, per §4.2's six-step contract.
    ///
    /// Safe for concurrent callers: handlers are invoked without any lock held by
    /// the router, and the handler registry is a lock-free concurrent map.
    pub async fn route(&self, envelope: Envelope) -> Option<Envelope> {
        let now = chrono::Utc::now();
        if envelope.is_expired_at(now) {
            warn!(message_id = %envelope.message_id, "dropping expired envelope");
            return None;
        }

        if let Err(source) = self.trace_store.append(&envelope).await {
            warn!(message_id = %envelope.message_id, %source, "trace append failed, routing proceeds");
        }

        let recipient = envelope.recipient.clone()?;
        let handler = match self.handlers.get(&recipient) {
            Some(handler) => Arc::clone(handler.value()),
            None => {
                debug!(%recipient, "no handler registered for recipient");
                return None;
            }
        };

        match handler.handle(&envelope).await {
            Ok(reply) => {
                if let Some(reply) = &reply {
                    if let Err(source) = self.trace_store.append(reply).await {
                        warn!(message_id = %reply.message_id, %source, "trace append failed, routing proceeds");
                    }
                }
                reply
            }
            Err(message) => {
                warn!(%recipient, %message, "handler failed, synthesizing error reply");
                let error_reply = envelope.error_reply(&message);
                if let Err(source) = self.trace_store.append(&error_reply).await {
                    warn!(message_id = %error_reply.message_id, %source, "trace append failed, routing proceeds");
                }
                Some(error_reply)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::domain_types::{MessageType, Ttl};
    use crate::coordination::trace_store::InMemoryTraceStore;

    fn agent(name: &str) -> AgentId {
        AgentId::try_from(name.to_string()).unwrap()
    }

    struct EchoHandler;

    #[async_trait]
    impl Handler for EchoHandler {
        async fn handle(&self, envelope: &Envelope) -> Result<Option<Envelope>, String> {
            Ok(Some(
                envelope.result_reply(agent("echo"), serde_json::json!({"success": true})),
            ))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl Handler for FailingHandler {
        async fn handle(&self, _envelope: &Envelope) -> Result<Option<Envelope>, String> {
            Err("boom".to_string())
        }
    }

    fn task_envelope(recipient: AgentId, ttl_seconds: u64) -> Envelope {
        Envelope::new(
            crate::coordination::domain_types::ConversationId::generate(),
            MessageType::Task,
            agent("orchestrator"),
            Some(recipient),
            Ttl::try_new(ttl_seconds).unwrap(),
            serde_json::json!({"task_type": "retrieve"}),
        )
    }

    #[tokio::test]
    async fn test_should_return_handler_reply_on_success() {
        let router = Router::new(Arc::new(InMemoryTraceStore::new()));
        router.register(agent("echo"), Arc::new(EchoHandler));

        let reply = router.route(task_envelope(agent("echo"), 30)).await;
        assert!(reply.is_some());
        assert_eq!(reply.unwrap().message_type, MessageType::Result);
    }

    #[tokio::test]
    async fn test_should_return_none_for_unregistered_recipient() {
        let router = Router::new(Arc::new(InMemoryTraceStore::new()));
        let reply = router.route(task_envelope(agent("nobody"), 30)).await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_should_drop_expired_envelope_silently() {
        let router = Router::new(Arc::new(InMemoryTraceStore::new()));
        router.register(agent("echo"), Arc::new(EchoHandler));

        let mut envelope = task_envelope(agent("echo"), 30);
        envelope.timestamp = chrono::Utc::now() - chrono::Duration::seconds(60);

        let reply = router.route(envelope).await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_should_synthesize_error_reply_on_handler_failure() {
        let router = Router::new(Arc::new(InMemoryTraceStore::new()));
        router.register(agent("fails"), Arc::new(FailingHandler));

        let reply = router.route(task_envelope(agent("fails"), 30)).await;
        let reply = reply.expect("router should synthesize an error reply");
        assert_eq!(reply.message_type, MessageType::Error);
        assert_eq!(reply.sender, agent("system"));
        assert_eq!(reply.payload["error"], "boom");
    }

    #[tokio::test]
    async fn test_should_append_dispatched_envelope_to_trace_store() {
        let trace_store = Arc::new(InMemoryTraceStore::new());
        let router = Router::new(trace_store.clone());
        router.register(agent("echo"), Arc::new(EchoHandler));

        let envelope = task_envelope(agent("echo"), 30);
        let conversation_id = envelope.conversation_id;
        router.route(envelope).await;

        let trace = trace_store.by_conversation(conversation_id).await.unwrap();
        assert_eq!(trace.len(), 2, "task and reply should both be appended");
    }
}
