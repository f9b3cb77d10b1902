//! Creates, forks and removes content streams.

use super::commands::{CreateContentStream, ForkContentStream, RemoveContentStream};
use super::events::{ContentStreamWasCreated, ContentStreamWasForked, ContentStreamWasRemoved};
use super::repository::ContentStreamRepository;
use crate::command::CommandHandler;
use crate::command_result::{CommandResult, ReadSideCatchUp};
use crate::errors::{ContentStreamError, ContentStreamResult, EventStoreError};
use crate::event::{DomainEvent, EventToWrite};
use crate::event_store::{EventStore, ExpectedVersion};
use crate::metadata::EventMetadata;
use crate::types::{ContentStreamId, UserId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

/// Command handler for the content-stream lifecycle.
#[derive(Clone)]
pub struct ContentStreamCommandHandler {
    event_store: Arc<dyn EventStore>,
    repository: Arc<ContentStreamRepository>,
    catch_up: Arc<dyn ReadSideCatchUp>,
}

impl std::fmt::Debug for ContentStreamCommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStreamCommandHandler")
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl ContentStreamCommandHandler {
    /// Creates the handler.
    pub fn new(
        event_store: Arc<dyn EventStore>,
        repository: Arc<ContentStreamRepository>,
        catch_up: Arc<dyn ReadSideCatchUp>,
    ) -> Self {
        Self {
            event_store,
            repository,
            catch_up,
        }
    }

    /// The repository this handler resolves content streams with.
    pub fn repository(&self) -> &ContentStreamRepository {
        &self.repository
    }

    async fn commit(
        &self,
        id: &ContentStreamId,
        event: &dyn DomainEvent,
        initiating_user_id: &UserId,
        expected_version: ExpectedVersion,
    ) -> ContentStreamResult<CommandResult> {
        let write = EventToWrite::from_domain_event(event)
            .map_err(|e| EventStoreError::SerializationFailed(e.to_string()))?
            .with_metadata(EventMetadata::new().with_initiating_user_id(initiating_user_id.clone()));
        let stream_name = self.repository.stream_name(id);
        let committed = self
            .event_store
            .append(&stream_name, vec![write], expected_version)
            .await;
        self.repository.invalidate(id);

        match committed {
            Ok(committed) => Ok(CommandResult::from_committed(
                &committed,
                Arc::clone(&self.catch_up),
            )),
            // Lost a race against another writer creating the same stream.
            Err(EventStoreError::VersionConflict { .. })
                if expected_version == ExpectedVersion::NoStream =>
            {
                Err(ContentStreamError::AlreadyExists(id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CommandHandler<CreateContentStream> for ContentStreamCommandHandler {
    type Output = CommandResult;
    type Error = ContentStreamError;

    #[instrument(skip(self), fields(content_stream_id = %command.content_stream_id))]
    async fn handle(&self, command: CreateContentStream) -> ContentStreamResult<CommandResult> {
        self.repository
            .require_absent(&command.content_stream_id)
            .await?;

        let event = ContentStreamWasCreated {
            content_stream_id: command.content_stream_id.clone(),
            initiating_user_id: command.initiating_user_id.clone(),
        };
        let result = self
            .commit(
                &command.content_stream_id,
                &event,
                &command.initiating_user_id,
                ExpectedVersion::NoStream,
            )
            .await?;
        info!("Content stream created");
        Ok(result)
    }
}

#[async_trait]
impl CommandHandler<ForkContentStream> for ContentStreamCommandHandler {
    type Output = CommandResult;
    type Error = ContentStreamError;

    #[instrument(
        skip(self),
        fields(
            content_stream_id = %command.content_stream_id,
            source_content_stream_id = %command.source_content_stream_id
        )
    )]
    async fn handle(&self, command: ForkContentStream) -> ContentStreamResult<CommandResult> {
        let source = self
            .repository
            .require_existing(&command.source_content_stream_id)
            .await?;
        self.repository
            .require_absent(&command.content_stream_id)
            .await?;

        let event = ContentStreamWasForked {
            new_content_stream_id: command.content_stream_id.clone(),
            source_content_stream_id: command.source_content_stream_id.clone(),
            version_of_source_content_stream: source.version,
            initiating_user_id: command.initiating_user_id.clone(),
        };
        let result = self
            .commit(
                &command.content_stream_id,
                &event,
                &command.initiating_user_id,
                ExpectedVersion::NoStream,
            )
            .await?;
        info!(source_version = %source.version, "Content stream forked");
        Ok(result)
    }
}

#[async_trait]
impl CommandHandler<RemoveContentStream> for ContentStreamCommandHandler {
    type Output = CommandResult;
    type Error = ContentStreamError;

    #[instrument(skip(self), fields(content_stream_id = %command.content_stream_id))]
    async fn handle(&self, command: RemoveContentStream) -> ContentStreamResult<CommandResult> {
        let stream = self
            .repository
            .require_existing(&command.content_stream_id)
            .await?;

        let event = ContentStreamWasRemoved {
            content_stream_id: command.content_stream_id.clone(),
            initiating_user_id: command.initiating_user_id.clone(),
        };
        let result = self
            .commit(
                &command.content_stream_id,
                &event,
                &command.initiating_user_id,
                ExpectedVersion::Exact(stream.version),
            )
            .await?;
        info!("Content stream removed");
        Ok(result)
    }
}
