//! Conversation Manager (C6): tracks per-conversation expiry, reaps stale entries,
//! and mints fresh conversation ids.
//!
//! Simplified from the teacher's richer `ConversationManagerImpl` (which tracks
//! participant sets and message counts) down to the TTL-only state the spec's
//! Conversation State calls for.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::coordination::domain_types::{ConversationId, Ttl};

/// Tracks `conversation_id -> expiry_instant`.
#[derive(Default)]
pub struct ConversationManager {
    expiries: DashMap<ConversationId, DateTime<Utc>>,
}

impl ConversationManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh, opaque conversation id. Does not register it — the first
    /// `touch` call does that.
    #[must_use]
    pub fn new_conversation_id(&self) -> ConversationId {
        ConversationId::generate()
    }

    /// Sets `conversation_id`'s expiry to `now + ttl` if that is later than its
    /// current expiry (or if it has no recorded expiry yet).
    pub fn touch(&self, conversation_id: ConversationId, ttl: Ttl) {
        let candidate = Utc::now() + ttl.as_duration();
        self.expiries
            .entry(conversation_id)
            .and_modify(|expiry| {
                if candidate > *expiry {
                    *expiry = candidate;
                }
            })
            .or_insert(candidate);
    }

    /// Removes every conversation whose expiry has passed, returning their ids.
    pub fn sweep(&self) -> Vec<ConversationId> {
        let now = Utc::now();
        let expired: Vec<ConversationId> = self
            .expiries
            .iter()
            .filter(|entry| *entry.value() <= now)
            .map(|entry| *entry.key())
            .collect();
        for conversation_id in &expired {
            self.expiries.remove(conversation_id);
        }
        expired
    }

    /// Current tracked conversation count, for diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}
