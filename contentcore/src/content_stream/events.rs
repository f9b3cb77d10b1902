//! Lifecycle events of content streams.

use crate::errors::CapabilityResult;
use crate::event::{encode_payload, DomainEvent, EventType};
use crate::types::{ContentStreamId, EventVersion, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A brand-new, unforked content stream was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStreamWasCreated {
    /// The new content stream
    pub content_stream_id: ContentStreamId,
    /// Who created it
    pub initiating_user_id: UserId,
}

/// A content stream was forked from the current tip of another one.
///
/// Always the first and only fork event of the new stream; publishing reads
/// `version_of_source_content_stream` from it for its concurrency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStreamWasForked {
    /// The new content stream
    pub new_content_stream_id: ContentStreamId,
    /// The stream it was forked from
    pub source_content_stream_id: ContentStreamId,
    /// Version of the source stream at fork time
    pub version_of_source_content_stream: EventVersion,
    /// Who forked it
    pub initiating_user_id: UserId,
}

/// A content stream was removed. Its events stay in the log as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStreamWasRemoved {
    /// The removed content stream
    pub content_stream_id: ContentStreamId,
    /// Who removed it
    pub initiating_user_id: UserId,
}

macro_rules! content_stream_event {
    ($event:ident) => {
        impl $event {
            /// The tag this event is stored under.
            pub fn event_type_name() -> EventType {
                EventType::from_static(stringify!($event))
            }
        }

        impl DomainEvent for $event {
            fn event_type(&self) -> EventType {
                Self::event_type_name()
            }

            fn to_payload(&self) -> CapabilityResult<Value> {
                encode_payload(stringify!($event), self)
            }
        }
    };
}

content_stream_event!(ContentStreamWasCreated);
content_stream_event!(ContentStreamWasForked);
content_stream_event!(ContentStreamWasRemoved);

/// Whether `event_type` is one of the content-stream lifecycle events.
pub fn is_lifecycle_event(event_type: &EventType) -> bool {
    [
        ContentStreamWasCreated::event_type_name(),
        ContentStreamWasForked::event_type_name(),
        ContentStreamWasRemoved::event_type_name(),
    ]
    .contains(event_type)
}
