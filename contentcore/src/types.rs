//! Core types for the `ContentCore` content-stream versioning library.
//!
//! This module defines the identifiers and value objects used throughout the
//! library. String identifiers use smart constructors so that once a value
//! exists it is known to be valid ("parse, don't validate").

use chrono::{DateTime, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifier of one content stream: an independent, append-only event sequence.
///
/// `ContentStreamId` values are non-empty and at most 255 characters. They are
/// opaque; [`ContentStreamId::create`] produces a fresh, globally unique value.
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
pub struct ContentStreamId(String);

impl ContentStreamId {
    /// Creates a new, globally unique content stream id.
    pub fn create() -> Self {
        Self::try_new(Uuid::now_v7().to_string())
            .expect("a UUID string is always a valid content stream id")
    }
}

/// Name of a workspace.
///
/// Workspace names are lowercase, start with a letter or digit, may contain
/// dashes, and are at most 36 characters long.
#[nutype(
    sanitize(trim),
    validate(
        not_empty,
        len_char_max = 36,
        predicate = |name: &str| is_valid_workspace_name(name)
    ),
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
pub struct WorkspaceName(String);

fn is_valid_workspace_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_lowercase() || first.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl WorkspaceName {
    /// The name of the conventional root workspace.
    pub fn live() -> Self {
        Self::try_new("live").expect("\"live\" is a valid workspace name")
    }
}

/// Human readable title of a workspace.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
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
pub struct WorkspaceTitle(String);

/// Free-form description of a workspace. May be empty.
#[nutype(
    sanitize(trim),
    validate(len_char_max = 4096),
    derive(
        Debug,
        Clone,
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
pub struct WorkspaceDescription(String);

impl WorkspaceDescription {
    /// An empty description.
    pub fn empty() -> Self {
        Self::try_new("").expect("the empty string is a valid description")
    }
}

/// Identifies the user (or system actor) that initiated a command, or owns a workspace.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
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
pub struct UserId(String);

impl UserId {
    /// The actor used when no user is attached to a command.
    pub fn system() -> Self {
        Self::try_new("system").expect("\"system\" is a valid user id")
    }
}

/// Identifier of a node aggregate, stable across content streams.
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
pub struct NodeAggregateId(String);

/// An opaque point in the content dimension space, e.g. `{language: de}`.
///
/// No resolution semantics are attached; two points are the same point iff
/// their coordinates are equal.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DimensionSpacePoint(BTreeMap<String, String>);

impl DimensionSpacePoint {
    /// Builds a point from `(dimension, value)` pairs.
    pub fn from_coordinates<I, K, V>(coordinates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            coordinates
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// The coordinates of this point.
    pub const fn coordinates(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Address of a node, used to select changes for partial publish and discard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAddress {
    /// The addressed node aggregate
    pub node_aggregate_id: NodeAggregateId,
    /// The dimension space point the node is addressed in
    pub dimension_space_point: DimensionSpacePoint,
}

impl NodeAddress {
    /// Creates a new node address.
    pub const fn new(
        node_aggregate_id: NodeAggregateId,
        dimension_space_point: DimensionSpacePoint,
    ) -> Self {
        Self {
            node_aggregate_id,
            dimension_space_point,
        }
    }
}

/// A globally unique event identifier using UUIDv7 format.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
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
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new `EventId` with the current timestamp.
    pub fn new() -> Self {
        // Uuid::now_v7() always returns a valid v7 UUID
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// The version of an event within its stream.
///
/// Versions start at 0 for the first event. The version of a stream is the
/// version of its last event, i.e. the number of committed events minus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventVersion(u64);

impl EventVersion {
    /// The version of the first event in a stream.
    pub const fn first() -> Self {
        Self(0)
    }

    /// Creates a version from its raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the next version after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The raw value.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The version a stream has after `count` committed events, `None` for zero.
    pub fn for_event_count(count: usize) -> Option<Self> {
        count
            .checked_sub(1)
            .map(|last| Self(u64::try_from(last).unwrap_or(u64::MAX)))
    }
}

impl From<EventVersion> for u64 {
    fn from(version: EventVersion) -> Self {
        version.0
    }
}

impl std::fmt::Display for EventVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Global position of an event in the whole event log. Starts at 1.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// The position before the first event; nothing has been applied yet.
    pub const fn none() -> Self {
        Self(0)
    }

    /// Creates a sequence number from its raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The raw value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// A timestamp for when an event was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a new timestamp from a UTC `DateTime`.
    pub const fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Creates a timestamp representing the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
