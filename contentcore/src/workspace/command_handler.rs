//! The workspace state machine: create, publish, rebase and discard.
//!
//! A workspace's state is the content stream it currently points to. Every
//! publish, rebase and discard forks a fresh stream and swaps the pointer by
//! emitting a workspace event; the workspace itself is never recreated.
//!
//! # Publish
//!
//! Publishing copies every publishable event of the workspace stream `W` onto
//! the base stream `B`, committing with the expected version `B` had when `W`
//! was forked from it. That version is read from the single
//! `ContentStreamWasForked` event `W` starts with. If `B` advanced in the
//! meantime the commit is rejected with
//! [`WorkspaceError::BaseWorkspaceHasBeenModifiedInTheMeantime`].
//!
//! The remaining stream of a partial publish is forked from the published
//! stream rather than from `B`. Its expected version is the published stream's
//! fork version plus the events it added to `B`.
//!
//! # Rebase
//!
//! Rebasing first decodes and re-targets the commands recorded in `W`'s event
//! metadata, so a command that cannot be rebased aborts before anything is
//! written. It then forks `R` from the tip of `B` and replays the commands onto
//! it, in order, blocking on the read side after each.
//! Failed commands are collected; if any failed the workspace keeps pointing
//! to `W` and `WorkspaceRebaseFailed` is recorded instead of an error.
//!
//! # Partial publish and discard
//!
//! Recorded commands are split by node address. Partial publish replays the
//! matching ones onto a fork `M` of `B`, the remaining ones onto a fork `Rm`
//! of `M`, then publishes `M` into `B` and points the workspace to `Rm`.
//! Partial discard replays only the non-matching commands onto a fork of `B`.

use super::commands::{
    ChangeBaseWorkspace, ChangeWorkspaceOwner, CreateRootWorkspace, CreateWorkspace,
    DeleteWorkspace, DiscardIndividualNodesFromWorkspace, DiscardWorkspace,
    PublishIndividualNodesFromWorkspace, PublishWorkspace, RebaseWorkspace, RenameWorkspace,
};
use super::events::{
    RootWorkspaceWasCreated, WorkspaceBaseWorkspaceWasChanged, WorkspaceEvent,
    WorkspaceOwnerWasChanged, WorkspaceRebaseFailed, WorkspaceWasCreated, WorkspaceWasDiscarded,
    WorkspaceWasPartiallyDiscarded, WorkspaceWasPartiallyPublished, WorkspaceWasPublished,
    WorkspaceWasRebased, WorkspaceWasRemoved, WorkspaceWasRenamed,
};
use super::model::{Workspace, WorkspaceFinder};
use super::rebase_statistics::WorkspaceRebaseStatistics;
use crate::command::{rebase_command, CommandEnvelope, CommandHandler, ContentCommand};
use crate::command_result::{CommandResult, ReadSideCatchUp};
use crate::config::ContentRepositoryConfig;
use crate::content_stream::events::{is_lifecycle_event, ContentStreamWasForked};
use crate::content_stream::{
    ContentStreamCommandHandler, ContentStreamRepository, CreateContentStream, ForkContentStream,
    RemoveContentStream,
};
use crate::errors::{CapabilityError, CapabilityResult, EventStoreError, WorkspaceError, WorkspaceResult};
use crate::event::{DomainEvent, EventToWrite, StoredEvent};
use crate::event_normalizer::EventNormalizer;
use crate::event_store::{EventStore, ExpectedVersion, ReadOptions};
use crate::metadata::EventMetadata;
use crate::mutation::MutationCommandHandler;
use crate::replay::{extract_commands, partition_by_addresses, CommandRegistry};
use crate::stream_name::StreamNamespace;
use crate::types::{ContentStreamId, EventVersion, UserId, WorkspaceName};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Collaborators of the workspace command handler.
pub struct WorkspaceCommandHandlerDependencies {
    /// Repository configuration
    pub config: ContentRepositoryConfig,
    /// The event log
    pub event_store: Arc<dyn EventStore>,
    /// Read access to workspaces
    pub workspace_finder: Arc<dyn WorkspaceFinder>,
    /// Applies replayed content mutations
    pub mutation_handler: Arc<dyn MutationCommandHandler>,
    /// Decodes recorded commands
    pub command_registry: Arc<CommandRegistry>,
    /// Decodes stored events for publishing
    pub event_normalizer: Arc<EventNormalizer>,
    /// Read-side barrier for everything this handler commits
    pub catch_up: Arc<dyn ReadSideCatchUp>,
}

/// Outcome of a rebase.
///
/// A rebase whose recorded commands partially failed is not an error: it is
/// recorded as `WorkspaceRebaseFailed` and reported here with its statistics.
#[derive(Debug)]
pub enum RebaseOutcome {
    /// The workspace now points to the rebased stream.
    Rebased {
        /// Barrier for the `WorkspaceWasRebased` event
        result: CommandResult,
        /// Per-command results
        statistics: WorkspaceRebaseStatistics,
    },
    /// Some commands could not be re-applied; the workspace was left unchanged.
    Failed {
        /// Barrier for the `WorkspaceRebaseFailed` event
        result: CommandResult,
        /// Per-command results, including the failures
        statistics: WorkspaceRebaseStatistics,
    },
}

impl RebaseOutcome {
    /// The read-side barrier of the recorded workspace event.
    pub const fn result(&self) -> &CommandResult {
        match self {
            Self::Rebased { result, .. } | Self::Failed { result, .. } => result,
        }
    }

    /// The per-command results.
    pub const fn statistics(&self) -> &WorkspaceRebaseStatistics {
        match self {
            Self::Rebased { statistics, .. } | Self::Failed { statistics, .. } => statistics,
        }
    }

    /// Whether the workspace was switched to the rebased stream.
    pub const fn is_rebased(&self) -> bool {
        matches!(self, Self::Rebased { .. })
    }
}

/// Orchestrates the workspace lifecycle on top of content streams.
pub struct WorkspaceCommandHandler {
    namespace: StreamNamespace,
    event_store: Arc<dyn EventStore>,
    repository: Arc<ContentStreamRepository>,
    content_streams: ContentStreamCommandHandler,
    workspace_finder: Arc<dyn WorkspaceFinder>,
    mutation_handler: Arc<dyn MutationCommandHandler>,
    command_registry: Arc<CommandRegistry>,
    event_normalizer: Arc<EventNormalizer>,
    catch_up: Arc<dyn ReadSideCatchUp>,
}

impl std::fmt::Debug for WorkspaceCommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceCommandHandler")
            .field("namespace", &self.namespace)
            .field("command_registry", &self.command_registry)
            .field("event_normalizer", &self.event_normalizer)
            .finish_non_exhaustive()
    }
}

impl WorkspaceCommandHandler {
    /// Wires up the handler.
    pub fn new(dependencies: WorkspaceCommandHandlerDependencies) -> Self {
        let WorkspaceCommandHandlerDependencies {
            config,
            event_store,
            workspace_finder,
            mutation_handler,
            command_registry,
            event_normalizer,
            catch_up,
        } = dependencies;
        let repository = Arc::new(ContentStreamRepository::new(
            Arc::clone(&event_store),
            &config,
        ));
        let content_streams = ContentStreamCommandHandler::new(
            Arc::clone(&event_store),
            Arc::clone(&repository),
            Arc::clone(&catch_up),
        );
        Self {
            namespace: config.namespace,
            event_store,
            repository,
            content_streams,
            workspace_finder,
            mutation_handler,
            command_registry,
            event_normalizer,
            catch_up,
        }
    }

    /// The content-stream command handler used for forks and removals.
    pub const fn content_stream_handler(&self) -> &ContentStreamCommandHandler {
        &self.content_streams
    }

    async fn require_workspace(&self, name: &WorkspaceName) -> WorkspaceResult<Workspace> {
        self.workspace_finder
            .find_one_by_name(name)
            .await?
            .ok_or_else(|| WorkspaceError::WorkspaceDoesNotExist(name.clone()))
    }

    async fn require_absent_workspace(&self, name: &WorkspaceName) -> WorkspaceResult<()> {
        match self.workspace_finder.find_one_by_name(name).await? {
            Some(_) => Err(WorkspaceError::WorkspaceAlreadyExists(name.clone())),
            None => Ok(()),
        }
    }

    async fn require_base_workspace(&self, workspace: &Workspace) -> WorkspaceResult<Workspace> {
        let base = workspace
            .base_workspace_name
            .as_ref()
            .ok_or_else(|| WorkspaceError::HasNoBaseWorkspaceName(workspace.workspace_name.clone()))?;
        self.workspace_finder
            .find_one_by_name(base)
            .await?
            .ok_or_else(|| WorkspaceError::BaseWorkspaceDoesNotExist {
                workspace: workspace.workspace_name.clone(),
                base: base.clone(),
            })
    }

    async fn fork_and_block(
        &self,
        id: &ContentStreamId,
        source: &ContentStreamId,
        user: &UserId,
    ) -> WorkspaceResult<()> {
        self.content_streams
            .handle(ForkContentStream::new(id.clone(), source.clone(), user.clone()))
            .await?
            .block_until_projections_up_to_date()
            .await?;
        Ok(())
    }

    async fn read_content_stream(&self, id: &ContentStreamId) -> WorkspaceResult<Vec<StoredEvent>> {
        Ok(self
            .event_store
            .read_stream(&self.repository.stream_name(id), &ReadOptions::new())
            .await?)
    }

    async fn commit_workspace_event(
        &self,
        workspace_name: &WorkspaceName,
        event: WorkspaceEvent,
        initiating_user_id: &UserId,
        expected_version: ExpectedVersion,
    ) -> WorkspaceResult<CommandResult> {
        let write = EventToWrite::from_domain_event(&event)?
            .with_metadata(EventMetadata::new().with_initiating_user_id(initiating_user_id.clone()));
        let committed = self
            .event_store
            .append(
                &self.namespace.workspace(workspace_name),
                vec![write],
                expected_version,
            )
            .await
            .map_err(|e| match e {
                EventStoreError::VersionConflict { .. }
                    if expected_version == ExpectedVersion::StreamExists =>
                {
                    WorkspaceError::WorkspaceDoesNotExist(workspace_name.clone())
                }
                other => other.into(),
            })?;
        info!(event_type = %event.event_type(), "Recorded workspace event");
        Ok(CommandResult::from_committed(
            &committed,
            Arc::clone(&self.catch_up),
        ))
    }

    /// Copies the publishable events of `source` onto `target`.
    ///
    /// Commits with the expected version `target` had when `source` was forked
    /// from it. Returns an empty result if there was nothing to copy; the
    /// concurrency check is applied regardless.
    #[instrument(skip(self))]
    async fn publish_content_stream(
        &self,
        source: &ContentStreamId,
        target: &ContentStreamId,
    ) -> WorkspaceResult<CommandResult> {
        self.repository.require_existing(source).await?;
        let target_stream = self.repository.require_existing(target).await?;

        let events = self.read_content_stream(source).await?;
        let forked = single_fork_event(source, &events)?;

        let expected_version = self.expected_target_version(&forked, target).await?;
        let modified_in_the_meantime = || WorkspaceError::BaseWorkspaceHasBeenModifiedInTheMeantime {
            base_content_stream_id: target.clone(),
            expected_version: expected_version.unwrap_or(forked.version_of_source_content_stream),
        };
        let Some(expected_version) = expected_version else {
            // forked from an older stream of the base workspace
            return Err(modified_in_the_meantime());
        };

        let mut writes = Vec::with_capacity(events.len().saturating_sub(1));
        for event in events.iter().skip(1) {
            if is_lifecycle_event(&event.event_type) {
                return Err(WorkspaceError::InvariantViolation(format!(
                    "content stream '{source}' contains '{}' at version {}",
                    event.event_type, event.version
                )));
            }
            writes.push(self.copy_for_content_stream(event, target)?);
        }

        if writes.is_empty() {
            if target_stream.version != expected_version {
                return Err(modified_in_the_meantime());
            }
            debug!("Nothing to publish");
            return Ok(CommandResult::empty());
        }

        let count = writes.len();
        let committed = self
            .event_store
            .append(
                &target_stream.stream_name,
                writes,
                ExpectedVersion::Exact(expected_version),
            )
            .await;
        self.repository.invalidate(target);
        let committed = committed.map_err(|e| match e {
            EventStoreError::VersionConflict { .. } => modified_in_the_meantime(),
            other => other.into(),
        })?;
        info!(events = count, "Published content stream");
        Ok(CommandResult::from_committed(
            &committed,
            Arc::clone(&self.catch_up),
        ))
    }

    /// The version `target` must be at for a stream with fork event `forked` to publish.
    ///
    /// A stream forked directly from `target` expects the recorded fork version.
    /// The remaining stream of a partial publish is forked from the published
    /// stream `M` instead; it expects `target` to have advanced by exactly the
    /// events `M` held at that fork. `None` if neither relation holds.
    async fn expected_target_version(
        &self,
        forked: &ContentStreamWasForked,
        target: &ContentStreamId,
    ) -> WorkspaceResult<Option<EventVersion>> {
        if &forked.source_content_stream_id == target {
            return Ok(Some(forked.version_of_source_content_stream));
        }
        let intermediate = self
            .read_content_stream(&forked.source_content_stream_id)
            .await?;
        let fork_type = ContentStreamWasForked::event_type_name();
        let Some(first) = intermediate.first().filter(|e| e.event_type == fork_type) else {
            return Ok(None);
        };
        let published: ContentStreamWasForked = first.decode()?;
        if &published.source_content_stream_id != target {
            return Ok(None);
        }
        Ok(Some(EventVersion::new(
            published.version_of_source_content_stream.value()
                + forked.version_of_source_content_stream.value(),
        )))
    }

    fn copy_for_content_stream(
        &self,
        event: &StoredEvent,
        target: &ContentStreamId,
    ) -> CapabilityResult<EventToWrite> {
        let domain_event = self.event_normalizer.denormalize(event)?;
        let publishable = domain_event
            .as_publishable()
            .ok_or_else(|| CapabilityError::NotPublishable(event.event_type.clone()))?;
        let copy = publishable.create_copy_for_content_stream(target);
        Ok(EventToWrite::from_domain_event(copy.as_ref())?
            .with_metadata(event.metadata.clone().with_causation_id(event.event_id.into())))
    }

    /// Re-targets every command to `target`, failing on the first one that cannot be.
    fn retarget_all(
        commands: &[Box<dyn ContentCommand>],
        target: &ContentStreamId,
    ) -> CapabilityResult<Vec<Box<dyn ContentCommand>>> {
        commands
            .iter()
            .map(|command| rebase_command(command.as_ref(), target))
            .collect()
    }

    /// Applies commands one by one; the first rejected command aborts the operation.
    async fn replay_all(
        &self,
        commands: Vec<Box<dyn ContentCommand>>,
        target: &ContentStreamId,
    ) -> WorkspaceResult<()> {
        for (index, command) in commands.into_iter().enumerate() {
            let kind = command.kind();
            debug!(index, %kind, content_stream_id = %target, "Replaying command");
            let result = self.mutation_handler.handle(command).await.map_err(|e| {
                WorkspaceError::CommandReplayFailed {
                    content_stream_id: target.clone(),
                    index,
                    kind,
                    reason: e.message().to_string(),
                }
            })?;
            result.block_until_projections_up_to_date().await?;
        }
        Ok(())
    }

    async fn has_events_except_forking(&self, id: &ContentStreamId) -> WorkspaceResult<bool> {
        let events = self.read_content_stream(id).await?;
        let forked = ContentStreamWasForked::event_type_name();
        Ok(events.iter().any(|event| event.event_type != forked))
    }

    async fn require_non_circular_relation(
        &self,
        workspace: &Workspace,
        new_base: &Workspace,
    ) -> WorkspaceResult<()> {
        let circular = || WorkspaceError::CircularRelationBetweenWorkspaces {
            workspace: workspace.workspace_name.clone(),
            base: new_base.workspace_name.clone(),
        };
        let mut visited = HashSet::new();
        let mut next = new_base.base_workspace_name.clone();
        while let Some(name) = next {
            if name == workspace.workspace_name || !visited.insert(name.clone()) {
                return Err(circular());
            }
            next = self
                .workspace_finder
                .find_one_by_name(&name)
                .await?
                .and_then(|ws| ws.base_workspace_name);
        }
        Ok(())
    }
}

/// The fork event a publishable stream must start with, and must contain only once.
fn single_fork_event(
    source: &ContentStreamId,
    events: &[StoredEvent],
) -> WorkspaceResult<ContentStreamWasForked> {
    let fork_type = ContentStreamWasForked::event_type_name();
    let fork_count = events.iter().filter(|e| e.event_type == fork_type).count();
    if fork_count != 1 {
        return Err(WorkspaceError::InvariantViolation(format!(
            "content stream '{source}' must contain exactly one ContentStreamWasForked event, found {fork_count}"
        )));
    }
    match events.first() {
        Some(first) if first.event_type == fork_type => Ok(first.decode()?),
        Some(first) => Err(WorkspaceError::InvariantViolation(format!(
            "content stream '{source}' must start with ContentStreamWasForked, found '{}'",
            first.event_type
        ))),
        None => Err(WorkspaceError::InvariantViolation(format!(
            "content stream '{source}' has no events"
        ))),
    }
}

#[async_trait]
impl CommandHandler<CreateRootWorkspace> for WorkspaceCommandHandler {
    type Output = CommandResult;
    type Error = WorkspaceError;

    #[instrument(skip(self, command), fields(workspace = %command.workspace_name))]
    async fn handle(&self, command: CreateRootWorkspace) -> WorkspaceResult<CommandResult> {
        self.repository.reset();
        self.require_absent_workspace(&command.workspace_name).await?;

        self.content_streams
            .handle(CreateContentStream::new(
                command.new_content_stream_id.clone(),
                command.initiating_user_id.clone(),
            ))
            .await?
            .block_until_projections_up_to_date()
            .await?;

        let event = RootWorkspaceWasCreated {
            workspace_name: command.workspace_name.clone(),
            workspace_title: command.workspace_title,
            workspace_description: command.workspace_description,
            new_content_stream_id: command.new_content_stream_id,
            initiating_user_id: command.initiating_user_id.clone(),
        };
        self.commit_workspace_event(
            &command.workspace_name,
            event.into(),
            &command.initiating_user_id,
            ExpectedVersion::Any,
        )
        .await
    }
}

#[async_trait]
impl CommandHandler<CreateWorkspace> for WorkspaceCommandHandler {
    type Output = CommandResult;
    type Error = WorkspaceError;

    #[instrument(
        skip(self, command),
        fields(workspace = %command.workspace_name, base = %command.base_workspace_name)
    )]
    async fn handle(&self, command: CreateWorkspace) -> WorkspaceResult<CommandResult> {
        self.repository.reset();
        self.require_absent_workspace(&command.workspace_name).await?;
        let base = self
            .workspace_finder
            .find_one_by_name(&command.base_workspace_name)
            .await?
            .ok_or_else(|| WorkspaceError::BaseWorkspaceDoesNotExist {
                workspace: command.workspace_name.clone(),
                base: command.base_workspace_name.clone(),
            })?;

        self.fork_and_block(
            &command.new_content_stream_id,
            &base.current_content_stream_id,
            &command.initiating_user_id,
        )
        .await?;

        let event = WorkspaceWasCreated {
            workspace_name: command.workspace_name.clone(),
            base_workspace_name: command.base_workspace_name,
            workspace_title: command.workspace_title,
            workspace_description: command.workspace_description,
            new_content_stream_id: command.new_content_stream_id,
            workspace_owner: command.workspace_owner,
            initiating_user_id: command.initiating_user_id.clone(),
        };
        self.commit_workspace_event(
            &command.workspace_name,
            event.into(),
            &command.initiating_user_id,
            ExpectedVersion::Any,
        )
        .await
    }
}

#[async_trait]
impl CommandHandler<PublishWorkspace> for WorkspaceCommandHandler {
    type Output = CommandResult;
    type Error = WorkspaceError;

    #[instrument(skip(self, command), fields(workspace = %command.workspace_name))]
    async fn handle(&self, command: PublishWorkspace) -> WorkspaceResult<CommandResult> {
        self.repository.reset();
        let workspace = self.require_workspace(&command.workspace_name).await?;
        let base = self.require_base_workspace(&workspace).await?;

        self.publish_content_stream(
            &workspace.current_content_stream_id,
            &base.current_content_stream_id,
        )
        .await?
        .block_until_projections_up_to_date()
        .await?;

        self.fork_and_block(
            &command.new_content_stream_id,
            &base.current_content_stream_id,
            &command.initiating_user_id,
        )
        .await?;

        let event = WorkspaceWasPublished {
            source_workspace_name: workspace.workspace_name.clone(),
            target_workspace_name: base.workspace_name,
            new_source_content_stream_id: command.new_content_stream_id,
            previous_source_content_stream_id: workspace.current_content_stream_id,
            initiating_user_id: command.initiating_user_id.clone(),
        };
        self.commit_workspace_event(
            &workspace.workspace_name,
            event.into(),
            &command.initiating_user_id,
            ExpectedVersion::Any,
        )
        .await
    }
}

#[async_trait]
impl CommandHandler<RebaseWorkspace> for WorkspaceCommandHandler {
    type Output = RebaseOutcome;
    type Error = WorkspaceError;

    #[instrument(skip(self, command), fields(workspace = %command.workspace_name))]
    async fn handle(&self, command: RebaseWorkspace) -> WorkspaceResult<RebaseOutcome> {
        self.repository.reset();
        let workspace = self.require_workspace(&command.workspace_name).await?;
        let base = self.require_base_workspace(&workspace).await?;

        let original_commands = extract_commands(
            self.event_store.as_ref(),
            &self.command_registry,
            &self
                .repository
                .stream_name(&workspace.current_content_stream_id),
        )
        .await?;
        let envelopes = original_commands
            .iter()
            .map(|command| CommandEnvelope::from_command(command.as_ref()))
            .collect::<CapabilityResult<Vec<_>>>()?;
        let rebased_commands =
            Self::retarget_all(&original_commands, &command.rebased_content_stream_id)?;

        self.fork_and_block(
            &command.rebased_content_stream_id,
            &base.current_content_stream_id,
            &command.initiating_user_id,
        )
        .await?;

        let mut statistics = WorkspaceRebaseStatistics::new();
        for (index, (rebased, envelope)) in rebased_commands.into_iter().zip(envelopes).enumerate() {
            debug!(index, kind = %envelope.kind, "Re-applying command");
            match self.mutation_handler.handle(rebased).await {
                Ok(result) => {
                    result.block_until_projections_up_to_date().await?;
                    statistics.command_applied();
                }
                Err(error) => {
                    warn!(index, kind = %envelope.kind, error = %error, "Command could not be re-applied");
                    statistics.command_failed(index, envelope, error.message());
                }
            }
        }

        if statistics.has_errors() {
            warn!(
                failed = statistics.failed_count(),
                applied = statistics.applied_count(),
                "Rebase failed; workspace left unchanged"
            );
            let event = WorkspaceRebaseFailed {
                workspace_name: workspace.workspace_name.clone(),
                candidate_content_stream_id: command.rebased_content_stream_id,
                previous_content_stream_id: workspace.current_content_stream_id,
                errors: statistics.failures().to_vec(),
                initiating_user_id: command.initiating_user_id.clone(),
            };
            let result = self
                .commit_workspace_event(
                    &workspace.workspace_name,
                    event.into(),
                    &command.initiating_user_id,
                    ExpectedVersion::Any,
                )
                .await?;
            return Ok(RebaseOutcome::Failed { result, statistics });
        }

        let event = WorkspaceWasRebased {
            workspace_name: workspace.workspace_name.clone(),
            new_content_stream_id: command.rebased_content_stream_id,
            previous_content_stream_id: workspace.current_content_stream_id,
            initiating_user_id: command.initiating_user_id.clone(),
        };
        let result = self
            .commit_workspace_event(
                &workspace.workspace_name,
                event.into(),
                &command.initiating_user_id,
                ExpectedVersion::Any,
            )
            .await?;
        Ok(RebaseOutcome::Rebased { result, statistics })
    }
}

#[async_trait]
impl CommandHandler<PublishIndividualNodesFromWorkspace> for WorkspaceCommandHandler {
    type Output = CommandResult;
    type Error = WorkspaceError;

    #[instrument(
        skip(self, command),
        fields(workspace = %command.workspace_name, nodes = command.node_addresses.len())
    )]
    async fn handle(
        &self,
        command: PublishIndividualNodesFromWorkspace,
    ) -> WorkspaceResult<CommandResult> {
        self.repository.reset();
        let workspace = self.require_workspace(&command.workspace_name).await?;
        let base = self.require_base_workspace(&workspace).await?;

        let original_commands = extract_commands(
            self.event_store.as_ref(),
            &self.command_registry,
            &self
                .repository
                .stream_name(&workspace.current_content_stream_id),
        )
        .await?;
        let partitioned = partition_by_addresses(original_commands, &command.node_addresses)?;
        let matching_id = &command.content_stream_id_for_matching_part;
        let remaining_id = &command.content_stream_id_for_remaining_part;
        let matching = Self::retarget_all(&partitioned.matching, matching_id)?;
        let remaining = Self::retarget_all(&partitioned.remaining, remaining_id)?;
        info!(
            matching = matching.len(),
            remaining = remaining.len(),
            "Partitioned recorded commands"
        );

        self.fork_and_block(
            matching_id,
            &base.current_content_stream_id,
            &command.initiating_user_id,
        )
        .await?;
        self.replay_all(matching, matching_id).await?;

        // the matching stream advanced; fork from its tip
        self.repository.invalidate(matching_id);
        self.fork_and_block(remaining_id, matching_id, &command.initiating_user_id)
            .await?;
        self.replay_all(remaining, remaining_id).await?;

        self.publish_content_stream(matching_id, &base.current_content_stream_id)
            .await?
            .block_until_projections_up_to_date()
            .await?;

        let event = WorkspaceWasPartiallyPublished {
            source_workspace_name: workspace.workspace_name.clone(),
            target_workspace_name: base.workspace_name,
            new_source_content_stream_id: remaining_id.clone(),
            previous_source_content_stream_id: workspace.current_content_stream_id,
            published_nodes: command.node_addresses,
            initiating_user_id: command.initiating_user_id.clone(),
        };
        self.commit_workspace_event(
            &workspace.workspace_name,
            event.into(),
            &command.initiating_user_id,
            ExpectedVersion::Any,
        )
        .await
    }
}

#[async_trait]
impl CommandHandler<DiscardWorkspace> for WorkspaceCommandHandler {
    type Output = CommandResult;
    type Error = WorkspaceError;

    #[instrument(skip(self, command), fields(workspace = %command.workspace_name))]
    async fn handle(&self, command: DiscardWorkspace) -> WorkspaceResult<CommandResult> {
        self.repository.reset();
        let workspace = self.require_workspace(&command.workspace_name).await?;
        let base = self.require_base_workspace(&workspace).await?;

        self.fork_and_block(
            &command.new_content_stream_id,
            &base.current_content_stream_id,
            &command.initiating_user_id,
        )
        .await?;

        let event = WorkspaceWasDiscarded {
            workspace_name: workspace.workspace_name.clone(),
            new_content_stream_id: command.new_content_stream_id,
            previous_content_stream_id: workspace.current_content_stream_id,
            initiating_user_id: command.initiating_user_id.clone(),
        };
        self.commit_workspace_event(
            &workspace.workspace_name,
            event.into(),
            &command.initiating_user_id,
            ExpectedVersion::Any,
        )
        .await
    }
}

#[async_trait]
impl CommandHandler<DiscardIndividualNodesFromWorkspace> for WorkspaceCommandHandler {
    type Output = CommandResult;
    type Error = WorkspaceError;

    #[instrument(
        skip(self, command),
        fields(workspace = %command.workspace_name, nodes = command.node_addresses.len())
    )]
    async fn handle(
        &self,
        command: DiscardIndividualNodesFromWorkspace,
    ) -> WorkspaceResult<CommandResult> {
        self.repository.reset();
        let workspace = self.require_workspace(&command.workspace_name).await?;
        let base = self.require_base_workspace(&workspace).await?;

        let original_commands = extract_commands(
            self.event_store.as_ref(),
            &self.command_registry,
            &self
                .repository
                .stream_name(&workspace.current_content_stream_id),
        )
        .await?;
        let partitioned = partition_by_addresses(original_commands, &command.node_addresses)?;
        let kept = Self::retarget_all(&partitioned.remaining, &command.new_content_stream_id)?;
        info!(
            discarded = partitioned.matching.len(),
            kept = kept.len(),
            "Partitioned recorded commands"
        );

        self.fork_and_block(
            &command.new_content_stream_id,
            &base.current_content_stream_id,
            &command.initiating_user_id,
        )
        .await?;
        self.replay_all(kept, &command.new_content_stream_id).await?;

        let event = WorkspaceWasPartiallyDiscarded {
            workspace_name: workspace.workspace_name.clone(),
            new_content_stream_id: command.new_content_stream_id,
            previous_content_stream_id: workspace.current_content_stream_id,
            discarded_nodes: command.node_addresses,
            initiating_user_id: command.initiating_user_id.clone(),
        };
        self.commit_workspace_event(
            &workspace.workspace_name,
            event.into(),
            &command.initiating_user_id,
            ExpectedVersion::Any,
        )
        .await
    }
}

#[async_trait]
impl CommandHandler<DeleteWorkspace> for WorkspaceCommandHandler {
    type Output = CommandResult;
    type Error = WorkspaceError;

    #[instrument(skip(self, command), fields(workspace = %command.workspace_name))]
    async fn handle(&self, command: DeleteWorkspace) -> WorkspaceResult<CommandResult> {
        self.repository.reset();
        let workspace = self.require_workspace(&command.workspace_name).await?;

        self.content_streams
            .handle(RemoveContentStream::new(
                workspace.current_content_stream_id.clone(),
                command.initiating_user_id.clone(),
            ))
            .await?
            .block_until_projections_up_to_date()
            .await?;

        let event = WorkspaceWasRemoved {
            workspace_name: workspace.workspace_name.clone(),
            initiating_user_id: command.initiating_user_id.clone(),
        };
        self.commit_workspace_event(
            &workspace.workspace_name,
            event.into(),
            &command.initiating_user_id,
            ExpectedVersion::Any,
        )
        .await
    }
}

#[async_trait]
impl CommandHandler<ChangeBaseWorkspace> for WorkspaceCommandHandler {
    type Output = CommandResult;
    type Error = WorkspaceError;

    #[instrument(
        skip(self, command),
        fields(workspace = %command.workspace_name, base = %command.base_workspace_name)
    )]
    async fn handle(&self, command: ChangeBaseWorkspace) -> WorkspaceResult<CommandResult> {
        self.repository.reset();
        let workspace = self.require_workspace(&command.workspace_name).await?;
        if command.base_workspace_name == workspace.workspace_name {
            return Err(WorkspaceError::BaseWorkspaceEqualsWorkspace(
                workspace.workspace_name,
            ));
        }
        if self
            .has_events_except_forking(&workspace.current_content_stream_id)
            .await?
        {
            return Err(WorkspaceError::WorkspaceIsNotEmpty(workspace.workspace_name));
        }
        let new_base = self
            .workspace_finder
            .find_one_by_name(&command.base_workspace_name)
            .await?
            .ok_or_else(|| WorkspaceError::BaseWorkspaceDoesNotExist {
                workspace: workspace.workspace_name.clone(),
                base: command.base_workspace_name.clone(),
            })?;
        self.require_non_circular_relation(&workspace, &new_base)
            .await?;

        self.fork_and_block(
            &command.new_content_stream_id,
            &new_base.current_content_stream_id,
            &command.initiating_user_id,
        )
        .await?;

        let event = WorkspaceBaseWorkspaceWasChanged {
            workspace_name: workspace.workspace_name.clone(),
            base_workspace_name: command.base_workspace_name,
            new_content_stream_id: command.new_content_stream_id,
            initiating_user_id: command.initiating_user_id.clone(),
        };
        self.commit_workspace_event(
            &workspace.workspace_name,
            event.into(),
            &command.initiating_user_id,
            ExpectedVersion::Any,
        )
        .await
    }
}

#[async_trait]
impl CommandHandler<RenameWorkspace> for WorkspaceCommandHandler {
    type Output = CommandResult;
    type Error = WorkspaceError;

    #[instrument(skip(self, command), fields(workspace = %command.workspace_name))]
    async fn handle(&self, command: RenameWorkspace) -> WorkspaceResult<CommandResult> {
        self.require_workspace(&command.workspace_name).await?;
        let event = WorkspaceWasRenamed {
            workspace_name: command.workspace_name.clone(),
            workspace_title: command.workspace_title,
            workspace_description: command.workspace_description,
            initiating_user_id: command.initiating_user_id.clone(),
        };
        self.commit_workspace_event(
            &command.workspace_name,
            event.into(),
            &command.initiating_user_id,
            ExpectedVersion::StreamExists,
        )
        .await
    }
}

#[async_trait]
impl CommandHandler<ChangeWorkspaceOwner> for WorkspaceCommandHandler {
    type Output = CommandResult;
    type Error = WorkspaceError;

    #[instrument(skip(self, command), fields(workspace = %command.workspace_name))]
    async fn handle(&self, command: ChangeWorkspaceOwner) -> WorkspaceResult<CommandResult> {
        self.require_workspace(&command.workspace_name).await?;
        let event = WorkspaceOwnerWasChanged {
            workspace_name: command.workspace_name.clone(),
            new_workspace_owner: command.new_workspace_owner,
            initiating_user_id: command.initiating_user_id.clone(),
        };
        self.commit_workspace_event(
            &command.workspace_name,
            event.into(),
            &command.initiating_user_id,
            ExpectedVersion::StreamExists,
        )
        .await
    }
}
