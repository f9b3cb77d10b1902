//! Error types for `ContentCore`.
//!
//! Errors are split by subsystem so callers can tell apart what they can fix
//! from what they should retry and from what indicates a defect:
//!
//! - **EventStoreError**: failures of the event log, including optimistic
//!   concurrency conflicts.
//! - **ContentStreamError**: content-stream preconditions (`AlreadyExists`,
//!   `DoesNotExistYet`).
//! - **CapabilityError**: a command or event lacks a capability an algorithm
//!   needs, or cannot be decoded. Always a programming or configuration error.
//! - **WorkspaceError**: everything the workspace command handler can report.
//!   [`WorkspaceError::category`] classifies each variant.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! match handler.publish_workspace(command).await {
//!     Ok(result) => result.block_until_projections_up_to_date().await?,
//!     Err(error) if error.category() == ErrorCategory::Concurrency => {
//!         handler.rebase_workspace(rebase).await?;
//!     }
//!     Err(error) => return Err(error),
//! }
//! ```

use crate::command::CommandKind;
use crate::event::EventType;
use crate::event_store::ExpectedVersion;
use crate::stream_name::StreamName;
use crate::types::{ContentStreamId, EventVersion, SequenceNumber, WorkspaceName};
use thiserror::Error;

/// Errors that can occur when interacting with the event log.
#[derive(Debug, Clone, Error)]
pub enum EventStoreError {
    /// The stream was not at the version the writer expected. Nothing was written.
    #[error(
        "Version conflict on stream '{stream}': expected {expected}, but current is {}",
        .current.map_or_else(|| "<no stream>".to_string(), |v| v.to_string())
    )]
    VersionConflict {
        /// The stream with the version conflict
        stream: StreamName,
        /// The version that was expected
        expected: ExpectedVersion,
        /// The actual current version, `None` if the stream has no events
        current: Option<EventVersion>,
    },

    /// Serialization of an event or its metadata failed.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Deserialization of an event or its metadata failed.
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// The event store is temporarily unavailable.
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Precondition failures of content-stream commands.
#[derive(Debug, Clone, Error)]
pub enum ContentStreamError {
    /// A content stream with this id already has committed events.
    #[error("Content stream '{0}' already exists")]
    AlreadyExists(ContentStreamId),

    /// The content stream has no committed events, or has been removed.
    #[error("Content stream '{0}' does not exist yet")]
    DoesNotExistYet(ContentStreamId),

    /// The event log failed.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),
}

/// A command or event lacks a capability that an algorithm requires, or cannot be decoded.
///
/// These errors are never collected or skipped: they indicate that a command
/// or event type is wired up incorrectly.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    /// The command cannot be re-targeted to another content stream.
    #[error("Command '{0}' is not rebasable to other content streams")]
    NotRebasable(CommandKind),

    /// The command cannot be matched against node addresses.
    #[error("Command '{0}' cannot be matched against node addresses; it cannot be published or discarded individually")]
    NotAddressMatchable(CommandKind),

    /// The event cannot be copied to another content stream.
    #[error("Event '{0}' is not publishable to other content streams")]
    NotPublishable(EventType),

    /// No decoder is registered for the command kind.
    #[error("Unknown command kind '{0}'")]
    UnknownCommandKind(CommandKind),

    /// No decoder is registered for the event type.
    #[error("Unknown event type '{0}'")]
    UnknownEventType(EventType),

    /// A decoder for this name is already registered.
    #[error("A decoder for '{0}' is already registered")]
    AlreadyRegistered(String),

    /// The command envelope was written in a format this version cannot read.
    #[error("Command envelope for '{kind}' has unsupported format version {format_version}")]
    UnsupportedEnvelopeVersion {
        /// The kind recorded in the envelope
        kind: CommandKind,
        /// The format version recorded in the envelope
        format_version: u16,
    },

    /// A registered decoder rejected the payload.
    #[error("Failed to decode '{name}': {reason}")]
    DecodingFailed {
        /// The command kind or event type being decoded
        name: String,
        /// Why decoding failed
        reason: String,
    },

    /// A value could not be encoded.
    #[error("Failed to encode '{name}': {reason}")]
    EncodingFailed {
        /// The command kind or event type being encoded
        name: String,
        /// Why encoding failed
        reason: String,
    },
}

/// Failure reported by a read-side projection while catching up.
#[derive(Debug, Clone, Error)]
#[error("Read side could not catch up to sequence number {target}: {reason}")]
pub struct ReadSideError {
    /// The position the caller waited for
    pub target: SequenceNumber,
    /// Why catching up failed
    pub reason: String,
}

/// An individual content mutation was rejected by the mutation command handler.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct MutationError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl MutationError {
    /// Creates a mutation error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a mutation error wrapping an underlying error.
    pub fn from_source(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    /// The human readable description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Coarse classification of a [`WorkspaceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The input violated a precondition. Fix the input and retry.
    Precondition,
    /// The base moved underneath the operation. Rebase, then retry.
    Concurrency,
    /// A command or event type is wired up incorrectly, or an invariant broke.
    Programming,
    /// The event log or read side failed.
    Infrastructure,
}

/// Errors reported by the workspace command handler.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A workspace with this name already exists.
    #[error("The workspace '{0}' already exists")]
    WorkspaceAlreadyExists(WorkspaceName),

    /// The workspace does not exist.
    #[error("The workspace '{0}' does not exist")]
    WorkspaceDoesNotExist(WorkspaceName),

    /// The workspace is a root workspace and has no base.
    #[error("The workspace '{0}' has no base workspace name")]
    HasNoBaseWorkspaceName(WorkspaceName),

    /// The base workspace of a workspace does not exist.
    #[error("The workspace '{base}' (base workspace of '{workspace}') does not exist")]
    BaseWorkspaceDoesNotExist {
        /// The workspace whose base is missing
        workspace: WorkspaceName,
        /// The missing base workspace
        base: WorkspaceName,
    },

    /// The base content stream advanced since the workspace was forked from it.
    #[error(
        "The base workspace has been modified in the meantime; please rebase. \
         Expected version {expected_version} of source content stream '{base_content_stream_id}'"
    )]
    BaseWorkspaceHasBeenModifiedInTheMeantime {
        /// The base content stream that moved
        base_content_stream_id: ContentStreamId,
        /// The base version recorded when the workspace stream was forked
        expected_version: EventVersion,
    },

    /// The workspace has unpublished changes.
    #[error("The workspace '{0}' contains changes; it needs to be empty")]
    WorkspaceIsNotEmpty(WorkspaceName),

    /// A workspace cannot be its own base.
    #[error("The base workspace of '{0}' must be different from the workspace itself")]
    BaseWorkspaceEqualsWorkspace(WorkspaceName),

    /// The workspace already lies on the base chain of the requested base.
    #[error("The workspace '{workspace}' is already on the base path of '{base}'")]
    CircularRelationBetweenWorkspaces {
        /// The workspace being re-based
        workspace: WorkspaceName,
        /// The requested base workspace
        base: WorkspaceName,
    },

    /// A recorded command could not be re-applied while publishing or discarding individual nodes.
    #[error("Command {index} ('{kind}') could not be applied to content stream '{content_stream_id}': {reason}")]
    CommandReplayFailed {
        /// The stream the command was replayed onto
        content_stream_id: ContentStreamId,
        /// Position of the command in the replayed sequence
        index: usize,
        /// The command kind
        kind: CommandKind,
        /// Why the mutation command handler rejected it
        reason: String,
    },

    /// A structural invariant of a content stream is broken.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A content-stream command failed.
    #[error(transparent)]
    ContentStream(#[from] ContentStreamError),

    /// A command or event lacks a required capability.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Waiting for the read side failed.
    #[error(transparent)]
    ReadSide(#[from] ReadSideError),

    /// The event log failed.
    #[error(transparent)]
    EventStore(#[from] EventStoreError),
}

impl WorkspaceError {
    /// Classifies the error so callers can decide how to react.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::WorkspaceAlreadyExists(_)
            | Self::WorkspaceDoesNotExist(_)
            | Self::HasNoBaseWorkspaceName(_)
            | Self::BaseWorkspaceDoesNotExist { .. }
            | Self::WorkspaceIsNotEmpty(_)
            | Self::BaseWorkspaceEqualsWorkspace(_)
            | Self::CircularRelationBetweenWorkspaces { .. }
            | Self::ContentStream(
                ContentStreamError::AlreadyExists(_) | ContentStreamError::DoesNotExistYet(_),
            ) => ErrorCategory::Precondition,
            Self::BaseWorkspaceHasBeenModifiedInTheMeantime { .. }
            | Self::CommandReplayFailed { .. }
            | Self::EventStore(EventStoreError::VersionConflict { .. })
            | Self::ContentStream(ContentStreamError::EventStore(
                EventStoreError::VersionConflict { .. },
            )) => ErrorCategory::Concurrency,
            Self::Capability(_) | Self::InvariantViolation(_) => ErrorCategory::Programming,
            Self::ReadSide(_) | Self::EventStore(_) | Self::ContentStream(_) => {
                ErrorCategory::Infrastructure
            }
        }
    }
}

/// Type alias for event store results.
pub type EventStoreResult<T> = Result<T, EventStoreError>;

/// Type alias for content-stream command results.
pub type ContentStreamResult<T> = Result<T, ContentStreamError>;

/// Type alias for capability checks and decoding.
pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Type alias for workspace command results.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
