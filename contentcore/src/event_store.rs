//! Event log abstraction.
//!
//! This module defines the `EventStore` trait that serves as the port to the
//! append-only, per-stream ordered event log. Every write is an optimistic
//! concurrency commit: the caller states which version it believes the stream
//! is at, and the whole append fails atomically if that belief is wrong.

use crate::errors::EventStoreResult;
use crate::event::{EventToWrite, StoredEvent};
use crate::stream_name::StreamName;
use crate::types::{EventVersion, SequenceNumber};
use async_trait::async_trait;
use std::fmt;

/// Expected version for optimistic concurrency control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Any version is acceptable (no concurrency control)
    Any,
    /// The stream must not have any events
    NoStream,
    /// The stream must have at least one event
    StreamExists,
    /// The stream's last event must have exactly this version
    Exact(EventVersion),
}

impl ExpectedVersion {
    /// Whether a stream currently at `current` satisfies this expectation.
    pub fn is_satisfied_by(self, current: Option<EventVersion>) -> bool {
        match self {
            Self::Any => true,
            Self::NoStream => current.is_none(),
            Self::StreamExists => current.is_some(),
            Self::Exact(expected) => current == Some(expected),
        }
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any version"),
            Self::NoStream => f.write_str("no stream"),
            Self::StreamExists => f.write_str("an existing stream"),
            Self::Exact(version) => fmt::Display::fmt(version, f),
        }
    }
}

/// Configuration for reading a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Start reading at this version (inclusive). None = from the beginning
    pub from_version: Option<EventVersion>,
    /// Maximum number of events to read (None = no limit)
    pub max_events: Option<usize>,
}

impl ReadOptions {
    /// Reads the whole stream.
    pub const fn new() -> Self {
        Self {
            from_version: None,
            max_events: None,
        }
    }

    /// Sets the starting version.
    #[must_use]
    pub const fn from_version(mut self, version: EventVersion) -> Self {
        self.from_version = Some(version);
        self
    }

    /// Sets the maximum number of events to read.
    #[must_use]
    pub const fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = Some(max_events);
        self
    }
}

/// What an append committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEvents {
    /// The stream that was written to
    pub stream_name: StreamName,
    /// The stream's version after the append, `None` if it still has no events
    pub version: Option<EventVersion>,
    /// Global position of the last committed event, `None` if nothing was written
    pub last_sequence_number: Option<SequenceNumber>,
}

/// The port to the event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Reads events of one stream, ordered by version.
    ///
    /// Reading a stream without events returns an empty list.
    async fn read_stream(
        &self,
        stream_name: &StreamName,
        options: &ReadOptions,
    ) -> EventStoreResult<Vec<StoredEvent>>;

    /// Reads events of all streams in commit order, starting after `after`.
    async fn read_all(
        &self,
        after: SequenceNumber,
        max_events: Option<usize>,
    ) -> EventStoreResult<Vec<StoredEvent>>;

    /// Appends events to a stream atomically.
    ///
    /// # Errors
    ///
    /// Returns `EventStoreError::VersionConflict` and writes nothing if the
    /// stream does not satisfy `expected_version`. This holds for empty
    /// appends too.
    async fn append(
        &self,
        stream_name: &StreamName,
        events: Vec<EventToWrite>,
        expected_version: ExpectedVersion,
    ) -> EventStoreResult<CommittedEvents>;

    /// Version of the last event of a stream, `None` if the stream has no events.
    async fn stream_version(&self, stream_name: &StreamName)
        -> EventStoreResult<Option<EventVersion>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn expected_version_checks() {
        let v3 = Some(EventVersion::new(3));
        assert!(ExpectedVersion::Any.is_satisfied_by(None));
        assert!(ExpectedVersion::Any.is_satisfied_by(v3));
        assert!(ExpectedVersion::NoStream.is_satisfied_by(None));
        assert!(!ExpectedVersion::NoStream.is_satisfied_by(v3));
        assert!(ExpectedVersion::StreamExists.is_satisfied_by(v3));
        assert!(!ExpectedVersion::StreamExists.is_satisfied_by(None));
        assert!(ExpectedVersion::Exact(EventVersion::new(3)).is_satisfied_by(v3));
        assert!(!ExpectedVersion::Exact(EventVersion::new(2)).is_satisfied_by(v3));
        assert!(!ExpectedVersion::Exact(EventVersion::first()).is_satisfied_by(None));
    }

    #[test]
    fn read_options_builder() {
        let options = ReadOptions::new()
            .from_version(EventVersion::new(4))
            .with_max_events(1);
        assert_eq!(options.from_version, Some(EventVersion::new(4)));
        assert_eq!(options.max_events, Some(1));
        assert_eq!(ReadOptions::default(), ReadOptions::new());
    }

    proptest! {
        #[test]
        fn exact_only_matches_its_own_version(expected in 0u64..1000, current in 0u64..1000) {
            let satisfied = ExpectedVersion::Exact(EventVersion::new(expected))
                .is_satisfied_by(Some(EventVersion::new(current)));
            prop_assert_eq!(satisfied, expected == current);
        }
    }
}
