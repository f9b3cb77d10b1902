//! A process-local event log.

use async_trait::async_trait;
use contentcore::errors::{EventStoreError, EventStoreResult};
use contentcore::event::{EventToWrite, StoredEvent};
use contentcore::event_store::{CommittedEvents, EventStore, ExpectedVersion, ReadOptions};
use contentcore::stream_name::StreamName;
use contentcore::types::{EventVersion, SequenceNumber, Timestamp};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Thread-safe in-memory event log for tests and development.
///
/// Clones share the same log.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

#[derive(Default)]
struct Log {
    // every committed event in commit order; position i holds sequence number i + 1
    events: Vec<StoredEvent>,
    // positions in `events`, per stream
    streams: HashMap<StreamName, Vec<usize>>,
}

impl Log {
    fn stream_version(&self, stream_name: &StreamName) -> Option<EventVersion> {
        self.streams
            .get(stream_name)
            .and_then(|positions| positions.last())
            .map(|&position| self.events[position].version)
    }

    fn last_sequence_number(&self) -> SequenceNumber {
        self.events
            .last()
            .map_or_else(SequenceNumber::none, |event| event.sequence_number)
    }
}

impl std::fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let log = self.log.read();
        f.debug_struct("InMemoryEventStore")
            .field("events", &log.events.len())
            .field("streams", &log.streams.len())
            .finish()
    }
}

impl InMemoryEventStore {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of the last committed event; [`SequenceNumber::none`] if the log is empty.
    pub fn last_sequence_number(&self) -> SequenceNumber {
        self.log.read().last_sequence_number()
    }

    /// Names of all streams with at least one event, sorted.
    pub fn stream_names(&self) -> Vec<StreamName> {
        let mut names: Vec<_> = self.log.read().streams.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn read_stream(
        &self,
        stream_name: &StreamName,
        options: &ReadOptions,
    ) -> EventStoreResult<Vec<StoredEvent>> {
        let log = self.log.read();
        let Some(positions) = log.streams.get(stream_name) else {
            return Ok(Vec::new());
        };

        Ok(positions
            .iter()
            .map(|&position| &log.events[position])
            .filter(|event| options.from_version.map_or(true, |from| event.version >= from))
            .take(options.max_events.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn read_all(
        &self,
        after: SequenceNumber,
        max_events: Option<usize>,
    ) -> EventStoreResult<Vec<StoredEvent>> {
        let log = self.log.read();
        let start = usize::try_from(after.value()).unwrap_or(usize::MAX);
        Ok(log
            .events
            .get(start..)
            .unwrap_or_default()
            .iter()
            .take(max_events.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn append(
        &self,
        stream_name: &StreamName,
        events: Vec<EventToWrite>,
        expected_version: ExpectedVersion,
    ) -> EventStoreResult<CommittedEvents> {
        let mut log = self.log.write();

        let current = log.stream_version(stream_name);
        if !expected_version.is_satisfied_by(current) {
            return Err(EventStoreError::VersionConflict {
                stream: stream_name.clone(),
                expected: expected_version,
                current,
            });
        }

        let mut version = current;
        let mut last_sequence_number = None;
        for event in events {
            let next_version = version.map_or_else(EventVersion::first, EventVersion::next);
            let sequence_number = log.last_sequence_number().next();
            let position = log.events.len();
            log.events.push(StoredEvent {
                event_id: event.event_id,
                sequence_number,
                stream_name: stream_name.clone(),
                version: next_version,
                event_type: event.event_type,
                payload: event.payload,
                metadata: event.metadata,
                recorded_at: Timestamp::now(),
            });
            log.streams
                .entry(stream_name.clone())
                .or_default()
                .push(position);
            version = Some(next_version);
            last_sequence_number = Some(sequence_number);
        }

        trace!(stream = %stream_name, ?version, "Appended events");
        Ok(CommittedEvents {
            stream_name: stream_name.clone(),
            version,
            last_sequence_number,
        })
    }

    async fn stream_version(
        &self,
        stream_name: &StreamName,
    ) -> EventStoreResult<Option<EventVersion>> {
        Ok(self.log.read().stream_version(stream_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentcore::event::EventType;
    use proptest::prelude::*;
    use serde_json::json;

    fn stream(name: &str) -> StreamName {
        StreamName::try_new(name).unwrap()
    }

    fn event(n: u64) -> EventToWrite {
        EventToWrite::new(EventType::from_static("Something"), json!({ "n": n }))
    }

    #[tokio::test]
    async fn clone_shares_storage() {
        let store = InMemoryEventStore::new();
        let other = store.clone();
        store
            .append(&stream("a"), vec![event(0)], ExpectedVersion::NoStream)
            .await
            .unwrap();
        assert_eq!(
            other.stream_version(&stream("a")).await.unwrap(),
            Some(EventVersion::first())
        );
    }

    #[tokio::test]
    async fn missing_stream_reads_empty() {
        let store = InMemoryEventStore::new();
        assert!(store
            .read_stream(&stream("nope"), &ReadOptions::new())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.stream_version(&stream("nope")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn conflicting_append_writes_nothing() {
        let store = InMemoryEventStore::new();
        store
            .append(&stream("a"), vec![event(0)], ExpectedVersion::NoStream)
            .await
            .unwrap();

        let err = store
            .append(
                &stream("a"),
                vec![event(1), event(2)],
                ExpectedVersion::Exact(EventVersion::new(5)),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EventStoreError::VersionConflict { current: Some(v), .. } if v == EventVersion::first()
        ));
        assert_eq!(store.last_sequence_number(), SequenceNumber::new(1));
    }

    #[tokio::test]
    async fn empty_append_still_checks_the_expected_version() {
        let store = InMemoryEventStore::new();
        store
            .append(&stream("a"), vec![event(0)], ExpectedVersion::NoStream)
            .await
            .unwrap();

        assert!(store
            .append(&stream("a"), Vec::new(), ExpectedVersion::NoStream)
            .await
            .is_err());

        let committed = store
            .append(&stream("a"), Vec::new(), ExpectedVersion::Exact(EventVersion::first()))
            .await
            .unwrap();
        assert_eq!(committed.version, Some(EventVersion::first()));
        assert_eq!(committed.last_sequence_number, None);
    }

    #[tokio::test]
    async fn read_all_interleaves_streams_in_commit_order() {
        let store = InMemoryEventStore::new();
        store
            .append(&stream("a"), vec![event(0)], ExpectedVersion::Any)
            .await
            .unwrap();
        store
            .append(&stream("b"), vec![event(1)], ExpectedVersion::Any)
            .await
            .unwrap();
        store
            .append(&stream("a"), vec![event(2)], ExpectedVersion::Any)
            .await
            .unwrap();

        let all = store.read_all(SequenceNumber::none(), None).await.unwrap();
        let order: Vec<_> = all
            .iter()
            .map(|e| (e.stream_name.to_string(), e.sequence_number.value()))
            .collect();
        assert_eq!(
            order,
            vec![("a".into(), 1), ("b".into(), 2), ("a".into(), 3)]
        );

        let tail = store
            .read_all(SequenceNumber::new(1), Some(1))
            .await
            .unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].stream_name, stream("b"));
    }

    #[tokio::test]
    async fn read_stream_honours_options() {
        let store = InMemoryEventStore::new();
        store
            .append(
                &stream("a"),
                (0..5).map(event).collect(),
                ExpectedVersion::NoStream,
            )
            .await
            .unwrap();

        let read = store
            .read_stream(
                &stream("a"),
                &ReadOptions::new()
                    .from_version(EventVersion::new(2))
                    .with_max_events(2),
            )
            .await
            .unwrap();
        let versions: Vec<_> = read.iter().map(|e| e.version.value()).collect();
        assert_eq!(versions, vec![2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_creators_have_exactly_one_winner() {
        let store = InMemoryEventStore::new();
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append(&stream("contended"), vec![event(n)], ExpectedVersion::NoStream)
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    proptest! {
        #[test]
        fn version_is_event_count_minus_one(batches in prop::collection::vec(0usize..4, 1..8)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let store = InMemoryEventStore::new();
                let mut count = 0usize;
                for batch in batches {
                    store
                        .append(&stream("p"), (0..batch as u64).map(event).collect(), ExpectedVersion::Any)
                        .await
                        .unwrap();
                    count += batch;
                    let version = store.stream_version(&stream("p")).await.unwrap();
                    prop_assert_eq!(version, EventVersion::for_event_count(count));
                }
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
