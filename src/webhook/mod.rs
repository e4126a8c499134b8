//! Inbound webhook handling.
//!
//! The upstream table service pushes change notifications at this service.
//! This module owns the envelope types, the replay-suppression registry,
//! and the crypto (envelope decryption, request signatures); the HTTP-facing
//! state machine lives in [`crate::http`].

mod crypto;

pub use crypto::{decrypt_event, verify_signature};

use serde::Deserialize;
use std::collections::{HashSet, VecDeque};

/// Payload `type` marking a URL verification challenge.
pub const URL_VERIFICATION_TYPE: &str = "url_verification";

/// Event type for Bitable record changes.
pub const RECORD_CHANGED_EVENT: &str = "drive.file.bitable_record_changed_v1";

/// Upper bound on remembered event identifiers.
pub const MAX_PROCESSED_EVENTS: usize = 1000;

/// Inbound event envelope.
///
/// One shape covers all three request kinds: the verification challenge,
/// the encrypted envelope, and the plain event notification.
#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    /// Challenge token to echo back during URL verification.
    pub challenge: Option<String>,
    /// Top-level verification token (legacy envelope position).
    pub token: Option<String>,
    /// Payload type discriminator.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Encrypted envelope body, base64.
    pub encrypt: Option<String>,
    /// Envelope schema version.
    pub schema: Option<String>,
    /// Event header for v2 envelopes.
    pub header: Option<EventHeader>,
    /// Event body.
    pub event: Option<EventBody>,
}

/// Event header (v2 envelope).
#[derive(Debug, Clone, Deserialize)]
pub struct EventHeader {
    /// Unique event identifier, used for deduplication.
    pub event_id: Option<String>,
    /// Event type discriminator.
    pub event_type: Option<String>,
    /// Creation time reported by the notifier.
    pub create_time: Option<String>,
    /// Verification token.
    pub token: Option<String>,
    /// Originating application.
    pub app_id: Option<String>,
    /// Tenant key.
    pub tenant_key: Option<String>,
}

/// Event body fields this service cares about; everything else is tolerated
/// and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct EventBody {
    /// Table the change applies to.
    pub table_id: Option<String>,
    /// File token of the Bitable.
    pub file_token: Option<String>,
    /// File type of the Bitable.
    pub file_type: Option<String>,
}

impl EventPayload {
    /// Whether this is a URL verification challenge.
    #[must_use]
    pub fn is_url_verification(&self) -> bool {
        self.kind.as_deref() == Some(URL_VERIFICATION_TYPE) && self.challenge.is_some()
    }

    /// Whether this signals a Bitable record change.
    #[must_use]
    pub fn is_record_changed(&self) -> bool {
        self.header
            .as_ref()
            .and_then(|h| h.event_type.as_deref())
            .is_some_and(|t| t == RECORD_CHANGED_EVENT)
    }

    /// The verification token, from the header or the legacy top level.
    #[must_use]
    pub fn verification_token(&self) -> Option<&str> {
        self.header
            .as_ref()
            .and_then(|h| h.token.as_deref())
            .or(self.token.as_deref())
    }

    /// The event identifier, when present.
    #[must_use]
    pub fn event_id(&self) -> Option<&str> {
        self.header.as_ref().and_then(|h| h.event_id.as_deref())
    }

    /// The table identifier the event applies to, when present.
    #[must_use]
    pub fn table_id(&self) -> Option<&str> {
        self.event.as_ref().and_then(|e| e.table_id.as_deref())
    }
}

/// Bounded set of recently-seen event identifiers.
///
/// Eviction is strictly insertion-order (not LRU): when full, the oldest
/// admitted identifier makes room, regardless of how recently it was
/// checked. Process-lifetime state; a restart forgets everything, which is
/// accepted.
pub struct ProcessedEventRegistry {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl ProcessedEventRegistry {
    /// Creates a registry with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_PROCESSED_EVENTS)
    }

    /// Creates a registry with a custom capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Admits an event identifier.
    ///
    /// Returns `false` if the identifier was already present (a replay).
    pub fn insert(&mut self, event_id: &str) -> bool {
        if self.seen.contains(event_id) {
            return false;
        }
        if self.order.len() >= self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        self.seen.insert(event_id.to_string());
        self.order.push_back(event_id.to_string());
        true
    }

    /// Number of identifiers currently remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for ProcessedEventRegistry {
    fn default() -> Self {
        Self::new()
    }
}
