//! Domain types for the agent coordination core.
//!
//! These types exist to prevent primitive obsession across the router, orchestrator,
//! and trace store: every value with a validity constraint (a non-negative TTL, a
//! bounded retrieval score, a non-empty query) is modeled as its own type rather than
//! passed around as a bare `String`/`u64`/`f64`.

use chrono::{DateTime, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for an envelope.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    From,
    Into
))]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generates a fresh random message id.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Identifier grouping every envelope exchanged in one logical conversation.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    From,
    Into
))]
pub struct ConversationId(Uuid);

impl ConversationId {
    /// Generates a fresh opaque conversation id.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Identifier for a registered handler (an agent or the orchestrator itself).
#[nutype(
    validate(len_char_min = 1, len_char_max = 256),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        PartialOrd,
        Ord,
        Serialize,
        Deserialize,
        Display,
        TryFrom,
        Into,
        AsRef
    )
)]
pub struct AgentId(String);

/// Time-to-live for an envelope, in whole seconds. Must be positive per §3.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 86_400),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Serialize,
        Deserialize,
        Display,
        TryFrom,
        Into
    )
)]
pub struct Ttl(u64);

impl Ttl {
    /// The default inter-agent timeout named in §6.
    #[must_use]
    pub fn default_a2a_timeout() -> Self {
        Self::try_new(30).expect("30 is within Ttl's valid range")
    }

    /// View as a `chrono::Duration`.
    #[must_use]
    pub fn as_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.into_inner()).unwrap_or(i64::MAX))
    }

    /// View as a `std::time::Duration`, for use with `tokio::time::timeout`.
    #[must_use]
    pub fn as_std_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.into_inner())
    }
}

/// A score or probability confined to `[0, 1]`, used for `coverage`, `confidence`, and
/// per-node/citation `score` fields.
#[nutype(
    validate(greater_or_equal = 0.0, less_or_equal = 1.0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        PartialOrd,
        Serialize,
        Deserialize,
        Display,
        Default,
        TryFrom,
        Into
    ),
    default = 0.0
)]
pub struct UnitScore(f64);

impl UnitScore {
    /// Gets the value as `f64`.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.into_inner()
    }
}

/// One of the four envelope kinds named in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// A request for work, addressed to a recipient.
    Task,
    /// A successful or unsuccessful outcome, addressed back to the task's sender.
    Result,
    /// Synthesized by the Router when a handler fails unexpectedly.
    Error,
    /// Reserved for liveness signaling; the core does not emit these itself.
    Heartbeat,
}

/// A structured JSON-like value used for envelope `payload` and `metadata`, preserving
/// insertion order the way the source system's dictionaries do.
pub type StructuredValue = serde_json::Value;

/// The unit of communication between every component in the core. Immutable once
/// constructed — all fields are set at construction time via [`Envelope::new`] or
/// [`Envelope::reply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub message_type: MessageType,
    pub sender: AgentId,
    pub recipient: Option<AgentId>,
    pub timestamp: DateTime<Utc>,
    pub ttl: Ttl,
    pub payload: StructuredValue,
    #[serde(default)]
    pub metadata: StructuredValue,
}

impl Envelope {
    /// Builds a new envelope, filling `message_id`, `timestamp`, and `metadata` by
    /// default per the builder strategy in SPEC_FULL §9 — callers supply only the
    /// fields that vary.
    #[must_use]
    pub fn new(
        conversation_id: ConversationId,
        message_type: MessageType,
        sender: AgentId,
        recipient: Option<AgentId>,
        ttl: Ttl,
        payload: StructuredValue,
    ) -> Self {
        Self {
            message_id: MessageId::generate(),
            conversation_id,
            message_type,
            sender,
            recipient,
            timestamp: Utc::now(),
            ttl,
            payload,
            metadata: serde_json::json!({}),
        }
    }

    /// Whether this envelope's TTL had already elapsed as of `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.timestamp + self.ttl.as_duration()
    }

    /// The instant after which a caller waiting on a reply should stop waiting.
    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.timestamp + self.ttl.as_duration()
    }

    /// Time remaining before `deadline()`, floored at zero.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        let deadline = self.deadline();
        if now >= deadline {
            std::time::Duration::ZERO
        } else {
            (deadline - now)
                .to_std()
                .unwrap_or(std::time::Duration::ZERO)
        }
    }

    /// Builds a RESULT envelope replying to `self`, addressed back to `self.sender`.
    #[must_use]
    pub fn result_reply(&self, sender: AgentId, payload: StructuredValue) -> Self {
        Self::new(
            self.conversation_id,
            MessageType::Result,
            sender,
            Some(self.sender.clone()),
            self.ttl,
            payload,
        )
    }

    /// Builds the ERROR envelope the Router synthesizes on unexpected handler
    /// failure, per §4.2 step 5.
    #[must_use]
    pub fn error_reply(&self, error_message: &str) -> Self {
        let system = AgentId::try_from("system".to_string())
            .expect("\"system\" satisfies AgentId's length bounds");
        Self::new(
            self.conversation_id,
            MessageType::Error,
            system,
            Some(self.sender.clone()),
            self.ttl,
            serde_json::json!({
                "error": error_message,
                "original_message_id": self.message_id,
            }),
        )
    }
}

/// The three strategy labels a `retrieve` task or retrieval record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyLabel {
    Local,
    Global,
    Drift,
}

impl StrategyLabel {
    /// All three strategy labels, in the fixed order the orchestrator uses for
    /// `hybrid`/`analysis_workflow` fan-out and for `agents_used` ordering.
    pub const ALL: [StrategyLabel; 3] = [Self::Local, Self::Global, Self::Drift];

    /// The agent id each strategy is registered under with the Router.
    #[must_use]
    pub fn agent_id(self) -> AgentId {
        let name = match self {
            Self::Local => "local_agent",
            Self::Global => "global_agent",
            Self::Drift => "drift_agent",
        };
        AgentId::try_from(name.to_string()).expect("agent id literal satisfies AgentId bounds")
    }
}

impl std::fmt::Display for StrategyLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Local => "local",
            Self::Global => "global",
            Self::Drift => "drift",
        };
        write!(f, "{s}")
    }
}

/// The `strategy` field accepted by an `assistant_workflow` task, a superset of
/// [`StrategyLabel`] that also allows `hybrid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategySelector {
    Single(StrategyLabel),
    Hybrid,
}

impl RetrievalStrategySelector {
    /// Parses the `strategy` field of an assistant/analysis task payload. Anything
    /// other than `local`/`global`/`drift` is treated as hybrid, per §4.5 step 1.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "local" => Self::Single(StrategyLabel::Local),
            "global" => Self::Single(StrategyLabel::Global),
            "drift" => Self::Single(StrategyLabel::Drift),
            _ => Self::Hybrid,
        }
    }

    /// The agent set this selector fans out to.
    #[must_use]
    pub fn agents(self) -> Vec<StrategyLabel> {
        match self {
            Self::Single(label) => vec![label],
            Self::Hybrid => StrategyLabel::ALL.to_vec(),
        }
    }
}

/// A node in a retrieval record, per §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub content: String,
    #[serde(default)]
    pub metadata: StructuredValue,
    pub score: UnitScore,
}

/// An edge in a retrieval record, per §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub weight: UnitScore,
    #[serde(default)]
    pub metadata: StructuredValue,
}

/// A citation in a retrieval record, per §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub node_id: String,
    #[serde(rename = "type")]
    pub citation_type: String,
    pub content: String,
    pub score: UnitScore,
}

/// The result payload produced by one retrieval agent handling a `retrieve` task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRecord {
    pub agent_id: AgentId,
    pub strategy: StrategyLabel,
    pub query: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub citations: Vec<Citation>,
    pub coverage: UnitScore,
    pub confidence: UnitScore,
}

/// The output of [`crate::coordination::merger::merge`]: a [`RetrievalRecord`]-shaped
/// union across every surviving agent reply, plus the `agents_used` list that the
/// per-agent [`RetrievalRecord`] has no field for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRetrievalRecord {
    pub query: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub citations: Vec<Citation>,
    pub coverage: UnitScore,
    pub confidence: UnitScore,
    pub agents_used: Vec<AgentId>,
}

/// The final payload of a successful `assistant_workflow` task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantResult {
    pub response_text: String,
    pub conversation_id: ConversationId,
    pub citations: Vec<Citation>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub metadata: AssistantResultMetadata,
}

/// Metadata accompanying an [`AssistantResult`], per §3 and §9's fallback-visibility
/// redesign flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantResultMetadata {
    pub strategy: String,
    pub coverage: UnitScore,
    pub confidence: UnitScore,
    pub agents_used: Vec<AgentId>,
    /// Set to `Some("fallback")` when synthesis failed and the apology text
    /// substituted for it, per the REDESIGN FLAG in §9.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<String>,
}

/// Severity of a detected contradiction between two legal sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Derives severity from a `priority` string when the graph edge carries no
    /// explicit `severity` attribute, per §4.5 step 2's mapping.
    #[must_use]
    pub fn from_priority(priority: &str) -> Self {
        match priority {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }

    /// The lowercase wire label, matching the keys used in `stats` (`"high_priority"`
    /// etc. is built by the orchestrator, this just names the severity itself).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// A contradiction between two legal sources, per §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub priority: String,
    pub category: String,
    pub sources: Vec<String>,
    pub impact: String,
    pub recommendation: String,
}

/// A suggested harmonization for a contradiction, one per contradiction per §4.5 step 3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Harmonization {
    pub contradiction_id: String,
    pub title: String,
    pub suggestion: String,
}

/// A severity-driven recommendation, per the table in §4.5 step 4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub contradiction_id: String,
    pub priority: String,
    pub timeline: String,
    pub cost_impact: String,
}

/// The final payload of a successful `analysis_workflow` task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub query: String,
    pub contradictions: Vec<Contradiction>,
    pub recommendations: Vec<Recommendation>,
    pub summary: String,
    pub confidence: UnitScore,
    pub stats: BTreeMap<String, usize>,
    pub harmonizations: Vec<Harmonization>,
    pub citations: Vec<Citation>,
}

/// A raw contradiction edge as returned by the `ContradictionSource` collaborator,
/// before the orchestrator derives severity/recommendation/harmonization.
#[derive(Debug, Clone)]
pub struct RawContradiction {
    pub source_node_id: String,
    pub target_node_id: String,
    pub priority: String,
    pub severity: Option<String>,
    pub category: String,
    pub description: String,
}


#[cfg(test)]
mod envelope_round_trip {
    use super::*;
    use proptest::prelude::*;

    fn arb_message_type() -> impl Strategy<Value = MessageType> {
        prop_oneof![
            Just(MessageType::Task),
            Just(MessageType::Result),
            Just(MessageType::Error),
            Just(MessageType::Heartbeat),
        ]
    }

    fn arb_agent_id() -> impl Strategy<Value = AgentId> {
        "[a-z]{1,12}".prop_map(|label| AgentId::try_from(label).expect("generated label is in bounds"))
    }

    proptest! {
        /// Invariant 7 (SPEC_FULL §8): `decode(encode(E)) == E` for all well-formed `E`.
        /// The trace store's JSON encoding (`serde_json::to_string`/`from_str`) is the
        /// encoding named in §4.1.
        #[test]
        fn round_trips_through_json_encoding(
            message_type in arb_message_type(),
            sender in arb_agent_id(),
            recipient in proptest::option::of(arb_agent_id()),
            ttl_seconds in 1u64..=86_400,
            payload_value in any::<i64>(),
        ) {
            let envelope = Envelope {
                message_id: MessageId::generate(),
                conversation_id: ConversationId::generate(),
                message_type,
                sender,
                recipient,
                timestamp: Utc::now(),
                ttl: Ttl::try_new(ttl_seconds).expect("ttl_seconds is within bounds"),
                payload: serde_json::json!({"value": payload_value}),
                metadata: serde_json::json!({"source": "proptest"}),
            };

            let encoded = serde_json::to_string(&envelope).expect("envelope should encode");
            let decoded: Envelope = serde_json::from_str(&encoded).expect("envelope should decode");
            prop_assert_eq!(decoded, envelope);
        }
    }
}
