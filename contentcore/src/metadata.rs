//! Event metadata types.
//!
//! Metadata travels with every event. Besides causation and correlation it can
//! carry the [`CommandEnvelope`] of the command that produced the event, which
//! is what makes a content stream's history replayable onto another stream.

use crate::command::CommandEnvelope;
use crate::types::{EventId, UserId};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A correlation identifier that links related events across command boundaries.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Creates a new correlation ID with the current timestamp.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

/// A causation identifier that links an event to the event that caused it.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct CausationId(Uuid);

impl From<EventId> for CausationId {
    fn from(event_id: EventId) -> Self {
        Self::try_new(*event_id.as_ref())
            .expect("EventId should always be a valid v7 UUID for CausationId")
    }
}

/// Metadata attached to a stored event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Links events in the same logical workflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Links this event to the specific event that caused it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<CausationId>,
    /// The user or system that initiated the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiating_user_id: Option<UserId>,
    /// The command that produced this event, if it came from a replayable command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandEnvelope>,
    /// Additional custom metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl EventMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the causation ID.
    #[must_use]
    pub const fn with_causation_id(mut self, causation_id: CausationId) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    /// Sets the correlation ID.
    #[must_use]
    pub const fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Sets the initiating user.
    #[must_use]
    pub fn with_initiating_user_id(mut self, user_id: UserId) -> Self {
        self.initiating_user_id = Some(user_id);
        self
    }

    /// Records the command envelope this event originates from.
    #[must_use]
    pub fn with_command(mut self, envelope: CommandEnvelope) -> Self {
        self.command = Some(envelope);
        self
    }

    /// Adds custom metadata.
    #[must_use]
    pub fn with_custom(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }
}
