//! `ContentCore` - content-stream versioning for event-sourced content repositories
//!
//! Content lives in content streams: append-only event sequences that can be
//! forked from one another. Workspaces are named pointers to a content stream
//! arranged in a tree, so that an editor's changes can be published into the
//! base workspace, rebased onto what others published in the meantime, or
//! discarded, either wholesale or for individual nodes.
//!
//! The library is storage agnostic. It talks to the event log through
//! [`EventStore`], to the read side through [`WorkspaceFinder`] and
//! [`ReadSideCatchUp`], and to the content domain through
//! [`MutationCommandHandler`], [`CommandRegistry`] and [`EventNormalizer`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod command_result;
pub mod config;
pub mod content_stream;
pub mod errors;
pub mod event;
pub mod event_normalizer;
pub mod event_store;
pub mod metadata;
pub mod mutation;
pub mod replay;
pub mod stream_name;
pub mod types;
pub mod workspace;

pub use command::{
    CommandEnvelope, CommandHandler, CommandKind, ContentCommand, MatchableWithNodeAddress,
    RebasableToOtherContentStreams,
};
pub use command_result::{CommandResult, ReadSideCatchUp};
pub use config::{CatchUpBatchSize, ConfigError, ContentRepositoryConfig};
pub use errors::{
    CapabilityError, ContentStreamError, ErrorCategory, EventStoreError, MutationError,
    ReadSideError, WorkspaceError,
};
pub use event::{DomainEvent, EventToWrite, EventType, PublishableToOtherContentStreams, StoredEvent};
pub use event_normalizer::EventNormalizer;
pub use event_store::{CommittedEvents, EventStore, ExpectedVersion, ReadOptions};
pub use metadata::EventMetadata;
pub use mutation::MutationCommandHandler;
pub use replay::CommandRegistry;
pub use stream_name::{StreamName, StreamNamespace};
pub use types::{
    ContentStreamId, DimensionSpacePoint, EventId, EventVersion, NodeAddress, NodeAggregateId,
    SequenceNumber, Timestamp, UserId, WorkspaceDescription, WorkspaceName, WorkspaceTitle,
};
pub use workspace::{RebaseOutcome, Workspace, WorkspaceCommandHandler, WorkspaceFinder, WorkspaceStatus};
