//! Envelope & Trace Store (C1): append-only persistence of every envelope, keyed by
//! conversation id, with replay via [`TraceStore::by_conversation`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::coordination::domain_types::{ConversationId, Envelope, MessageId, MessageType};
use crate::database::DatabaseConnection;
use crate::error::TraceStoreError;

/// Persistence contract for the conversation trace.
///
/// `append` is idempotent on `message_id` per invariant 2: re-appending an
/// already-stored id returns `Ok(())` without modifying the stored envelope.
#[async_trait]
pub trait TraceStore: Send + Sync {
    /// Appends `envelope` to the trace. A no-op, not an error, if `envelope.message_id`
    /// is already stored.
    async fn append(&self, envelope: &Envelope) -> Result<(), TraceStoreError>;

    /// All envelopes sharing `conversation_id`, ascending by `timestamp`.
    async fn by_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Envelope>, TraceStoreError>;

    /// Deletes every envelope whose `timestamp` is strictly before `older_than`,
    /// returning the number of rows removed.
    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<u64, TraceStoreError>;

    /// Releases any resources held by the store (e.g. the underlying connection
    /// pool). Called once, at shutdown.
    async fn close(&self);
}

fn message_type_str(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Task => "task",
        MessageType::Result => "result",
        MessageType::Error => "error",
        MessageType::Heartbeat => "heartbeat",
    }
}

fn parse_message_type(raw: &str) -> MessageType {
    match raw {
        "task" => MessageType::Task,
        "result" => MessageType::Result,
        "error" => MessageType::Error,
        _ => MessageType::Heartbeat,
    }
}

const INSERT_ENVELOPE: &str = r"
INSERT OR IGNORE INTO trace_envelopes (
    message_id, conversation_id, message_type, sender, recipient, timestamp, ttl_seconds, payload, metadata
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?);
";

const SELECT_BY_CONVERSATION: &str = r"
SELECT message_id, conversation_id, message_type, sender, recipient, timestamp, ttl_seconds, payload, metadata
FROM trace_envelopes
WHERE conversation_id = ?
ORDER BY timestamp ASC, rowid ASC;
";

const DELETE_OLDER_THAN: &str = r"
DELETE FROM trace_envelopes WHERE timestamp < ?;
";

/// SQLite-backed trace store, grounded on the teacher's `SqliteMessageStorage` but
/// with idempotent `INSERT OR IGNORE` semantics instead of `INSERT OR REPLACE`.
pub struct SqliteTraceStore {
    connection: DatabaseConnection,
}

impl SqliteTraceStore {
    #[must_use]
    pub fn new(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    fn row_to_envelope(row: &sqlx::sqlite::SqliteRow) -> Result<Envelope, TraceStoreError> {
        let conversation_id_str: String = row.get("conversation_id");
        let conversation_id: ConversationId = conversation_id_str
            .parse::<uuid::Uuid>()
            .map(ConversationId::new)
            .map_err(|source| TraceStoreError::Decoding {
                conversation_id: ConversationId::generate(),
                reason: format!("invalid conversation_id: {source}"),
            })?;

        let message_id_str: String = row.get("message_id");
        let message_id: MessageId = message_id_str
            .parse::<uuid::Uuid>()
            .map(MessageId::new)
            .map_err(|source| TraceStoreError::Decoding {
                conversation_id,
                reason: format!("invalid message_id: {source}"),
            })?;

        let message_type = parse_message_type(row.get::<String, _>("message_type").as_str());
        let sender_raw: String = row.get("sender");
        let sender = crate::coordination::domain_types::AgentId::try_from(sender_raw)
            .map_err(|_| TraceStoreError::Decoding {
                conversation_id,
                reason: "stored sender exceeds AgentId bounds".to_string(),
            })?;
        let recipient: Option<String> = row.get("recipient");
        let recipient = recipient
            .map(crate::coordination::domain_types::AgentId::try_from)
            .transpose()
            .map_err(|_| TraceStoreError::Decoding {
                conversation_id,
                reason: "stored recipient exceeds AgentId bounds".to_string(),
            })?;

        let timestamp_str: String = row.get("timestamp");
        let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|source| TraceStoreError::Decoding {
                conversation_id,
                reason: format!("invalid timestamp: {source}"),
            })?;

        let ttl_seconds: i64 = row.get("ttl_seconds");
        let ttl = crate::coordination::domain_types::Ttl::try_new(ttl_seconds.unsigned_abs())
            .map_err(|_| TraceStoreError::Decoding {
                conversation_id,
                reason: "stored ttl_seconds out of range".to_string(),
            })?;

        let payload_str: String = row.get("payload");
        let payload =
            serde_json::from_str(&payload_str).map_err(|source| TraceStoreError::Decoding {
                conversation_id,
                reason: format!("invalid payload json: {source}"),
            })?;
        let metadata_str: String = row.get("metadata");
        let metadata =
            serde_json::from_str(&metadata_str).map_err(|source| TraceStoreError::Decoding {
                conversation_id,
                reason: format!("invalid metadata json: {source}"),
            })?;

        Ok(Envelope {
            message_id,
            conversation_id,
            message_type,
            sender,
            recipient,
            timestamp,
            ttl,
            payload,
            metadata,
        })
    }
}

#[async_trait]
impl TraceStore for SqliteTraceStore {
    async fn append(&self, envelope: &Envelope) -> Result<(), TraceStoreError> {
        let payload = serde_json::to_string(&envelope.payload).map_err(|source| {
            TraceStoreError::Encoding {
                message_id: envelope.message_id,
                source,
            }
        })?;
        let metadata = serde_json::to_string(&envelope.metadata).map_err(|source| {
            TraceStoreError::Encoding {
                message_id: envelope.message_id,
                source,
            }
        })?;

        sqlx::query(INSERT_ENVELOPE)
            .bind(envelope.message_id.to_string())
            .bind(envelope.conversation_id.to_string())
            .bind(message_type_str(envelope.message_type))
            .bind(envelope.sender.as_ref())
            .bind(envelope.recipient.as_ref().map(AsRef::as_ref))
            .bind(envelope.timestamp.to_rfc3339())
            .bind(i64::try_from(envelope.ttl.into_inner()).unwrap_or(i64::MAX))
            .bind(payload)
            .bind(metadata)
            .execute(self.connection.pool())
            .await?;

        Ok(())
    }

    async fn by_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Envelope>, TraceStoreError> {
        let rows = sqlx::query(SELECT_BY_CONVERSATION)
            .bind(conversation_id.to_string())
            .fetch_all(self.connection.pool())
            .await?;

        rows.iter().map(Self::row_to_envelope).collect()
    }

    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<u64, TraceStoreError> {
        let result = sqlx::query(DELETE_OLDER_THAN)
            .bind(older_than.to_rfc3339())
            .execute(self.connection.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.connection.pool().close().await;
    }
}

/// In-memory trace store used by tests and by [`crate::config::AppConfig::for_testing`],
/// grounded on the teacher's `DashMap`-backed in-process state (`ConversationManagerImpl`).
#[derive(Default)]
pub struct InMemoryTraceStore {
    envelopes: dashmap::DashMap<MessageId, Envelope>,
}

impl InMemoryTraceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TraceStore for InMemoryTraceStore {
    async fn append(&self, envelope: &Envelope) -> Result<(), TraceStoreError> {
        self.envelopes
            .entry(envelope.message_id)
            .or_insert_with(|| envelope.clone());
        Ok(())
    }

    async fn by_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Envelope>, TraceStoreError> {
        let mut matching: Vec<Envelope> = self
            .envelopes
            .iter()
            .filter(|entry| entry.value().conversation_id == conversation_id)
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by_key(|envelope| envelope.timestamp);
        Ok(matching)
    }

    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<u64, TraceStoreError> {
        let to_remove: Vec<MessageId> = self
            .envelopes
            .iter()
            .filter(|entry| entry.value().timestamp < older_than)
            .map(|entry| *entry.key())
            .collect();
        let count = to_remove.len() as u64;
        for id in to_remove {
            self.envelopes.remove(&id);
        }
        Ok(count)
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::domain_types::AgentId;

    fn sample_envelope(conversation_id: ConversationId) -> Envelope {
        Envelope::new(
            conversation_id,
            MessageType::Task,
            AgentId::try_from("orchestrator".to_string()).unwrap(),
            Some(AgentId::try_from("local_agent".to_string()).unwrap()),
            crate::coordination::domain_types::Ttl::try_new(30).unwrap(),
            serde_json::json!({"task_type": "retrieve"}),
        )
    }

    #[tokio::test]
    async fn test_should_make_duplicate_append_a_no_op_in_memory() {
        let store = InMemoryTraceStore::new();
        let conversation_id = ConversationId::generate();
        let envelope = sample_envelope(conversation_id);

        store.append(&envelope).await.unwrap();
        store.append(&envelope).await.unwrap();

        let stored = store.by_conversation(conversation_id).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_should_return_envelopes_ordered_by_timestamp() {
        let store = InMemoryTraceStore::new();
        let conversation_id = ConversationId::generate();
        let mut first = sample_envelope(conversation_id);
        first.timestamp = Utc::now() - chrono::Duration::seconds(10);
        let second = sample_envelope(conversation_id);

        store.append(&second).await.unwrap();
        store.append(&first).await.unwrap();

        let stored = store.by_conversation(conversation_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored[0].timestamp <= stored[1].timestamp);
    }

    #[tokio::test]
    async fn test_should_only_return_envelopes_for_requested_conversation() {
        let store = InMemoryTraceStore::new();
        let a = ConversationId::generate();
        let b = ConversationId::generate();

        store.append(&sample_envelope(a)).await.unwrap();
        store.append(&sample_envelope(b)).await.unwrap();

        assert_eq!(store.by_conversation(a).await.unwrap().len(), 1);
        assert_eq!(store.by_conversation(b).await.unwrap().len(), 1);
    }
}
