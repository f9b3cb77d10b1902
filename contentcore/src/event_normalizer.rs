//! Registry mapping event type tags to decoders.
//!
//! Stored events only carry a type tag and a JSON payload. To act on an event
//! (for example to copy it onto another content stream during publish) the
//! payload has to be turned back into a [`DomainEvent`]. The normalizer holds
//! one decoder per event type; types without a decoder are reported as
//! [`CapabilityError::UnknownEventType`] instead of being skipped.

use crate::content_stream::events::{
    ContentStreamWasCreated, ContentStreamWasForked, ContentStreamWasRemoved,
};
use crate::errors::{CapabilityError, CapabilityResult};
use crate::event::{decode_payload, DomainEvent, EventType, StoredEvent};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type-erased decoder for one event type.
pub type EventDecoder = Arc<dyn Fn(&Value) -> CapabilityResult<Box<dyn DomainEvent>> + Send + Sync>;

/// Maps event types to their decoders.
#[derive(Clone)]
pub struct EventNormalizer {
    decoders: HashMap<EventType, EventDecoder>,
}

impl fmt::Debug for EventNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.decoders.keys().map(AsRef::as_ref).collect();
        types.sort_unstable();
        f.debug_struct("EventNormalizer")
            .field("event_types", &types)
            .finish()
    }
}

impl EventNormalizer {
    /// Creates a normalizer that knows the content-stream lifecycle events.
    pub fn new() -> Self {
        let mut normalizer = Self::empty();
        normalizer
            .register_core_events()
            .expect("core event types are registered exactly once");
        normalizer
    }

    fn register_core_events(&mut self) -> CapabilityResult<()> {
        self.register::<ContentStreamWasCreated>(ContentStreamWasCreated::event_type_name())?;
        self.register::<ContentStreamWasForked>(ContentStreamWasForked::event_type_name())?;
        self.register::<ContentStreamWasRemoved>(ContentStreamWasRemoved::event_type_name())
    }

    /// Creates a normalizer without any registered types.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers a serde-decodable event type under `event_type`.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityError::AlreadyRegistered` if the tag is taken.
    pub fn register<E>(&mut self, event_type: EventType) -> CapabilityResult<()>
    where
        E: DomainEvent + DeserializeOwned + 'static,
    {
        let name = event_type.to_string();
        self.register_decoder(
            event_type,
            Arc::new(move |payload| {
                let event: E = decode_payload(&name, payload)?;
                Ok(Box::new(event) as Box<dyn DomainEvent>)
            }),
        )
    }

    /// Registers a custom decoder under `event_type`.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityError::AlreadyRegistered` if the tag is taken.
    pub fn register_decoder(
        &mut self,
        event_type: EventType,
        decoder: EventDecoder,
    ) -> CapabilityResult<()> {
        if self.decoders.contains_key(&event_type) {
            return Err(CapabilityError::AlreadyRegistered(event_type.to_string()));
        }
        self.decoders.insert(event_type, decoder);
        Ok(())
    }

    /// Whether a decoder exists for `event_type`.
    pub fn is_registered(&self, event_type: &EventType) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Turns a stored event back into a domain event.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityError::UnknownEventType` for unregistered types and
    /// `CapabilityError::DecodingFailed` if the payload does not match.
    pub fn denormalize(&self, event: &StoredEvent) -> CapabilityResult<Box<dyn DomainEvent>> {
        let decoder = self
            .decoders
            .get(&event.event_type)
            .ok_or_else(|| CapabilityError::UnknownEventType(event.event_type.clone()))?;
        decoder(&event.payload)
    }
}

impl Default for EventNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::EventMetadata;
    use crate::stream_name::StreamName;
    use crate::types::{EventId, EventVersion, SequenceNumber, Timestamp};
    use serde_json::json;

    fn stored(event_type: &str, payload: Value) -> StoredEvent {
        StoredEvent {
            event_id: EventId::new(),
            sequence_number: SequenceNumber::new(1),
            stream_name: StreamName::try_new("test:ContentStream:cs").unwrap(),
            version: EventVersion::first(),
            event_type: EventType::try_new(event_type).unwrap(),
            payload,
            metadata: EventMetadata::new(),
            recorded_at: Timestamp::now(),
        }
    }

    #[test]
    fn core_events_are_preregistered() {
        let normalizer = EventNormalizer::new();
        let event = stored(
            "ContentStreamWasForked",
            json!({
                "newContentStreamId": "user-cs",
                "sourceContentStreamId": "live-cs",
                "versionOfSourceContentStream": 4,
                "initiatingUserId": "system"
            }),
        );

        let decoded = normalizer.denormalize(&event).unwrap();
        assert_eq!(decoded.event_type().as_ref(), "ContentStreamWasForked");
        assert!(decoded.as_publishable().is_none());
    }

    #[test]
    fn unknown_types_are_reported() {
        let normalizer = EventNormalizer::new();
        let err = normalizer
            .denormalize(&stored("NodeWasMoved", json!({})))
            .unwrap_err();
        assert!(matches!(err, CapabilityError::UnknownEventType(t) if t.as_ref() == "NodeWasMoved"));
    }

    #[test]
    fn registering_twice_fails() {
        let mut normalizer = EventNormalizer::new();
        let err = normalizer
            .register::<ContentStreamWasCreated>(ContentStreamWasCreated::event_type_name())
            .unwrap_err();
        assert!(matches!(err, CapabilityError::AlreadyRegistered(_)));
    }

    #[test]
    fn decoding_failure_is_a_capability_error() {
        let normalizer = EventNormalizer::new();
        let err = normalizer
            .denormalize(&stored("ContentStreamWasRemoved", json!({"nope": 1})))
            .unwrap_err();
        assert!(matches!(err, CapabilityError::DecodingFailed { .. }));
    }
}
