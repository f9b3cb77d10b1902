//! Behavioural contract every [`EventStore`] backend must satisfy.
//!
//! Invoke [`event_store_contract_tests!`](crate::event_store_contract_tests)
//! with a constructor for the backend under test to get one test per scenario.

use contentcore::errors::EventStoreError;
use contentcore::event::{EventToWrite, EventType};
use contentcore::event_store::{EventStore, ExpectedVersion, ReadOptions};
use contentcore::stream_name::StreamName;
use contentcore::types::{EventVersion, SequenceNumber};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// A scenario of the contract did not hold.
#[derive(Debug, Error)]
#[error("[{scenario}] {detail}")]
pub struct ContractTestFailure {
    scenario: &'static str,
    detail: String,
}

impl ContractTestFailure {
    fn new(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self {
            scenario,
            detail: detail.into(),
        }
    }

    fn store_error(scenario: &'static str, operation: &'static str, error: EventStoreError) -> Self {
        Self::new(
            scenario,
            format!("{operation} operation returned unexpected error: {error}"),
        )
    }
}

/// Result of one contract scenario.
pub type ContractTestResult = Result<(), ContractTestFailure>;

fn contract_stream(scenario: &'static str, label: &str) -> Result<StreamName, ContractTestFailure> {
    // unique per run so backends with shared storage can run scenarios in parallel
    let raw = format!("contract:{scenario}:{label}:{}", Uuid::now_v7());
    StreamName::try_new(raw.clone()).map_err(|error| {
        ContractTestFailure::new(scenario, format!("unable to construct stream name `{raw}`: {error}"))
    })
}

fn contract_event(n: usize) -> EventToWrite {
    EventToWrite::new(EventType::from_static("ContractTestEvent"), json!({ "n": n }))
}

/// One append is readable back, and versions start at zero.
pub async fn test_basic_read_write<S: EventStore>(store: S) -> ContractTestResult {
    const SCENARIO: &str = "basic_read_write";
    let stream = contract_stream(SCENARIO, "single")?;

    let committed = store
        .append(&stream, vec![contract_event(0)], ExpectedVersion::NoStream)
        .await
        .map_err(|e| ContractTestFailure::store_error(SCENARIO, "append", e))?;
    if committed.version != Some(EventVersion::first()) {
        return Err(ContractTestFailure::new(
            SCENARIO,
            format!("expected version 0 after one event, observed {:?}", committed.version),
        ));
    }

    let events = store
        .read_stream(&stream, &ReadOptions::new())
        .await
        .map_err(|e| ContractTestFailure::store_error(SCENARIO, "read_stream", e))?;
    if events.len() != 1 || events[0].stream_name != stream {
        return Err(ContractTestFailure::new(
            SCENARIO,
            format!("expected exactly one event of the stream, observed {}", events.len()),
        ));
    }
    Ok(())
}

/// Version equals the number of committed events minus one.
pub async fn test_version_tracks_event_count<S: EventStore>(store: S) -> ContractTestResult {
    const SCENARIO: &str = "version_tracks_event_count";
    let stream = contract_stream(SCENARIO, "counted")?;

    let mut count = 0;
    for batch in [1, 3, 2] {
        store
            .append(&stream, (0..batch).map(contract_event).collect(), ExpectedVersion::Any)
            .await
            .map_err(|e| ContractTestFailure::store_error(SCENARIO, "append", e))?;
        count += batch;

        let version = store
            .stream_version(&stream)
            .await
            .map_err(|e| ContractTestFailure::store_error(SCENARIO, "stream_version", e))?;
        if version != EventVersion::for_event_count(count) {
            return Err(ContractTestFailure::new(
                SCENARIO,
                format!("after {count} events expected version {}, observed {version:?}", count - 1),
            ));
        }
    }
    Ok(())
}

/// A stream without events has no version and reads empty.
pub async fn test_missing_stream_reads<S: EventStore>(store: S) -> ContractTestResult {
    const SCENARIO: &str = "missing_stream_reads";
    let stream = contract_stream(SCENARIO, "missing")?;

    let version = store
        .stream_version(&stream)
        .await
        .map_err(|e| ContractTestFailure::store_error(SCENARIO, "stream_version", e))?;
    let events = store
        .read_stream(&stream, &ReadOptions::new())
        .await
        .map_err(|e| ContractTestFailure::store_error(SCENARIO, "read_stream", e))?;

    if version.is_some() || !events.is_empty() {
        return Err(ContractTestFailure::new(
            SCENARIO,
            format!("expected no events, observed version {version:?} and {} events", events.len()),
        ));
    }
    Ok(())
}

/// A stale expected version is rejected and nothing of the batch is written.
pub async fn test_conflict_writes_nothing<S: EventStore>(store: S) -> ContractTestResult {
    const SCENARIO: &str = "conflict_writes_nothing";
    let stream = contract_stream(SCENARIO, "shared")?;

    store
        .append(&stream, vec![contract_event(0)], ExpectedVersion::NoStream)
        .await
        .map_err(|e| ContractTestFailure::store_error(SCENARIO, "append", e))?;

    match store
        .append(
            &stream,
            vec![contract_event(1), contract_event(2)],
            ExpectedVersion::NoStream,
        )
        .await
    {
        Err(EventStoreError::VersionConflict { .. }) => {}
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "append", error)),
        Ok(_) => {
            return Err(ContractTestFailure::new(
                SCENARIO,
                "expected version conflict but append succeeded",
            ))
        }
    }

    let events = store
        .read_stream(&stream, &ReadOptions::new())
        .await
        .map_err(|e| ContractTestFailure::store_error(SCENARIO, "read_stream", e))?;
    if events.len() != 1 {
        return Err(ContractTestFailure::new(
            SCENARIO,
            format!("expected the stream to remain at one event, observed {}", events.len()),
        ));
    }
    Ok(())
}

/// An empty append still checks its expected version.
pub async fn test_empty_append_checks_version<S: EventStore>(store: S) -> ContractTestResult {
    const SCENARIO: &str = "empty_append_checks_version";
    let stream = contract_stream(SCENARIO, "empty")?;

    match store
        .append(&stream, Vec::new(), ExpectedVersion::StreamExists)
        .await
    {
        Err(EventStoreError::VersionConflict { .. }) => {}
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "append", error)),
        Ok(_) => {
            return Err(ContractTestFailure::new(
                SCENARIO,
                "empty append against a missing stream with StreamExists succeeded",
            ))
        }
    }

    let committed = store
        .append(&stream, Vec::new(), ExpectedVersion::NoStream)
        .await
        .map_err(|e| ContractTestFailure::store_error(SCENARIO, "append", e))?;
    if committed.version.is_some() || committed.last_sequence_number.is_some() {
        return Err(ContractTestFailure::new(
            SCENARIO,
            format!("empty append committed something: {committed:?}"),
        ));
    }
    Ok(())
}

/// The global log yields events of all streams in commit order.
pub async fn test_read_all_preserves_commit_order<S: EventStore>(store: S) -> ContractTestResult {
    const SCENARIO: &str = "read_all_preserves_commit_order";
    let left = contract_stream(SCENARIO, "left")?;
    let right = contract_stream(SCENARIO, "right")?;

    let mut positions = Vec::new();
    for (stream, n) in [(&left, 0), (&right, 1), (&left, 2)] {
        let committed = store
            .append(stream, vec![contract_event(n)], ExpectedVersion::Any)
            .await
            .map_err(|e| ContractTestFailure::store_error(SCENARIO, "append", e))?;
        positions.push(committed.last_sequence_number.ok_or_else(|| {
            ContractTestFailure::new(SCENARIO, "append reported no sequence number")
        })?);
    }

    let after = SequenceNumber::new(positions[0].value() - 1);
    let events = store
        .read_all(after, None)
        .await
        .map_err(|e| ContractTestFailure::store_error(SCENARIO, "read_all", e))?;
    let ours: Vec<_> = events
        .iter()
        .filter(|e| e.stream_name == left || e.stream_name == right)
        .map(|e| e.sequence_number)
        .collect();
    if ours != positions {
        return Err(ContractTestFailure::new(
            SCENARIO,
            format!("expected positions {positions:?}, observed {ours:?}"),
        ));
    }
    Ok(())
}

/// Generates one `#[tokio::test]` per contract scenario.
///
/// `make_store` is called once per scenario.
#[macro_export]
macro_rules! event_store_contract_tests {
    (suite = $suite:ident, make_store = $make_store:expr $(,)?) => {
        #[allow(non_snake_case)]
        mod $suite {
            use $crate::contract::{
                test_basic_read_write, test_conflict_writes_nothing,
                test_empty_append_checks_version, test_missing_stream_reads,
                test_read_all_preserves_commit_order, test_version_tracks_event_count,
            };

            #[tokio::test(flavor = "multi_thread")]
            async fn basic_read_write_contract() {
                test_basic_read_write(($make_store)())
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn version_tracks_event_count_contract() {
                test_version_tracks_event_count(($make_store)())
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn missing_stream_reads_contract() {
                test_missing_stream_reads(($make_store)())
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn conflict_writes_nothing_contract() {
                test_conflict_writes_nothing(($make_store)())
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn empty_append_checks_version_contract() {
                test_empty_append_checks_version(($make_store)())
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn read_all_preserves_commit_order_contract() {
                test_read_all_preserves_commit_order(($make_store)())
                    .await
                    .expect("event store contract failed");
            }
        }
    };
}
