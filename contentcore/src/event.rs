//! Events as they are written to and read from the event log.
//!
//! On the wire an event is an [`EventType`] tag, a JSON payload and
//! [`EventMetadata`]. Inside the library, events that need behaviour (most
//! importantly being copied into another content stream on publish) are
//! represented as [`DomainEvent`] trait objects, produced by the
//! [`EventNormalizer`](crate::event_normalizer::EventNormalizer).

use crate::errors::{CapabilityError, CapabilityResult};
use crate::metadata::EventMetadata;
use crate::stream_name::StreamName;
use crate::types::{ContentStreamId, EventId, EventVersion, SequenceNumber, Timestamp};
use nutype::nutype;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The type tag under which an event payload is stored, e.g. `ContentStreamWasForked`.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct EventType(String);

impl EventType {
    /// Builds an event type from a static name known to be valid.
    ///
    /// # Panics
    ///
    /// Panics if `name` is blank or longer than 255 characters.
    pub fn from_static(name: &'static str) -> Self {
        Self::try_new(name).expect("static event type names are valid")
    }
}

/// An event with behaviour attached.
pub trait DomainEvent: std::fmt::Debug + Send + Sync {
    /// The tag this event is stored under.
    fn event_type(&self) -> EventType;

    /// The JSON payload this event is stored as.
    fn to_payload(&self) -> CapabilityResult<Value>;

    /// The event viewed as publishable, if it can be copied to another content stream.
    fn as_publishable(&self) -> Option<&dyn PublishableToOtherContentStreams> {
        None
    }
}

/// Capability of an event to be re-targeted to another content stream.
///
/// Publishing copies every publishable event of a workspace's content stream
/// onto the base content stream through this capability.
pub trait PublishableToOtherContentStreams {
    /// Returns a copy of this event that belongs to `target`.
    fn create_copy_for_content_stream(&self, target: &ContentStreamId) -> Box<dyn DomainEvent>;
}

/// Serializes `value` into an event or command payload.
pub fn encode_payload<T: Serialize>(name: &str, value: &T) -> CapabilityResult<Value> {
    serde_json::to_value(value).map_err(|e| CapabilityError::EncodingFailed {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Deserializes an event or command payload.
pub fn decode_payload<T: DeserializeOwned>(name: &str, payload: &Value) -> CapabilityResult<T> {
    T::deserialize(payload).map_err(|e| CapabilityError::DecodingFailed {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// An event that is about to be appended to a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct EventToWrite {
    /// Unique identifier for this event
    pub event_id: EventId,
    /// The payload's type tag
    pub event_type: EventType,
    /// The event payload
    pub payload: Value,
    /// Metadata stored alongside the payload
    pub metadata: EventMetadata,
}

impl EventToWrite {
    /// Creates a new event with a fresh id and empty metadata.
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self {
            event_id: EventId::new(),
            event_type,
            payload,
            metadata: EventMetadata::new(),
        }
    }

    /// Encodes a domain event.
    pub fn from_domain_event(event: &dyn DomainEvent) -> CapabilityResult<Self> {
        Ok(Self::new(event.event_type(), event.to_payload()?))
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// An event as it exists in the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    /// Unique identifier for this event
    pub event_id: EventId,
    /// Global position in the event log
    pub sequence_number: SequenceNumber,
    /// The stream this event belongs to
    pub stream_name: StreamName,
    /// Position of this event within its stream
    pub version: EventVersion,
    /// The payload's type tag
    pub event_type: EventType,
    /// The event payload
    pub payload: Value,
    /// Metadata stored alongside the payload
    pub metadata: EventMetadata,
    /// When the event was committed
    pub recorded_at: Timestamp,
}

impl StoredEvent {
    /// Decodes the payload into a concrete event type.
    pub fn decode<T: DeserializeOwned>(&self) -> CapabilityResult<T> {
        decode_payload(&self.event_type, &self.payload)
    }
}
