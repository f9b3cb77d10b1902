//! Workspace read model folded from the global event log.

use async_trait::async_trait;
use contentcore::command_result::ReadSideCatchUp;
use contentcore::config::{CatchUpBatchSize, ContentRepositoryConfig};
use contentcore::errors::ReadSideError;
use contentcore::event::StoredEvent;
use contentcore::event_store::EventStore;
use contentcore::types::{ContentStreamId, SequenceNumber, WorkspaceName};
use contentcore::workspace::{Workspace, WorkspaceEvent, WorkspaceFinder, WorkspaceStatus};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

#[derive(Debug, Default)]
struct ProjectionState {
    checkpoint: SequenceNumber,
    workspaces: BTreeMap<WorkspaceName, Workspace>,
}

impl ProjectionState {
    fn apply(&mut self, event: WorkspaceEvent) {
        match event {
            WorkspaceEvent::RootWorkspaceWasCreated(e) => {
                self.workspaces.insert(
                    e.workspace_name.clone(),
                    Workspace {
                        workspace_name: e.workspace_name,
                        base_workspace_name: None,
                        workspace_title: e.workspace_title,
                        workspace_description: e.workspace_description,
                        workspace_owner: None,
                        current_content_stream_id: e.new_content_stream_id,
                        status: WorkspaceStatus::UpToDate,
                    },
                );
            }
            WorkspaceEvent::WorkspaceWasCreated(e) => {
                self.workspaces.insert(
                    e.workspace_name.clone(),
                    Workspace {
                        workspace_name: e.workspace_name,
                        base_workspace_name: Some(e.base_workspace_name),
                        workspace_title: e.workspace_title,
                        workspace_description: e.workspace_description,
                        workspace_owner: e.workspace_owner,
                        current_content_stream_id: e.new_content_stream_id,
                        status: WorkspaceStatus::UpToDate,
                    },
                );
            }
            WorkspaceEvent::WorkspaceWasPublished(e) => {
                self.published(
                    &e.source_workspace_name,
                    &e.target_workspace_name,
                    e.new_source_content_stream_id,
                );
            }
            WorkspaceEvent::WorkspaceWasPartiallyPublished(e) => {
                self.published(
                    &e.source_workspace_name,
                    &e.target_workspace_name,
                    e.new_source_content_stream_id,
                );
            }
            WorkspaceEvent::WorkspaceWasRebased(e) => {
                self.update(&e.workspace_name, |ws| {
                    ws.current_content_stream_id = e.new_content_stream_id;
                    ws.status = WorkspaceStatus::UpToDate;
                });
                self.mark_dependents_outdated(&e.workspace_name);
            }
            WorkspaceEvent::WorkspaceRebaseFailed(e) => {
                self.update(&e.workspace_name, |ws| {
                    ws.status = WorkspaceStatus::OutdatedConflict;
                });
            }
            WorkspaceEvent::WorkspaceWasDiscarded(e) => {
                self.discarded(&e.workspace_name, e.new_content_stream_id);
            }
            WorkspaceEvent::WorkspaceWasPartiallyDiscarded(e) => {
                self.discarded(&e.workspace_name, e.new_content_stream_id);
            }
            WorkspaceEvent::WorkspaceWasRemoved(e) => {
                self.workspaces.remove(&e.workspace_name);
            }
            WorkspaceEvent::WorkspaceBaseWorkspaceWasChanged(e) => {
                self.update(&e.workspace_name, |ws| {
                    ws.base_workspace_name = Some(e.base_workspace_name);
                    ws.current_content_stream_id = e.new_content_stream_id;
                    ws.status = WorkspaceStatus::UpToDate;
                });
            }
            WorkspaceEvent::WorkspaceWasRenamed(e) => {
                self.update(&e.workspace_name, |ws| {
                    ws.workspace_title = e.workspace_title;
                    ws.workspace_description = e.workspace_description;
                });
            }
            WorkspaceEvent::WorkspaceOwnerWasChanged(e) => {
                self.update(&e.workspace_name, |ws| {
                    ws.workspace_owner = e.new_workspace_owner;
                });
            }
        }
    }

    fn update(&mut self, name: &WorkspaceName, change: impl FnOnce(&mut Workspace)) {
        if let Some(workspace) = self.workspaces.get_mut(name) {
            change(workspace);
        }
    }

    fn published(
        &mut self,
        source: &WorkspaceName,
        target: &WorkspaceName,
        new_source_content_stream_id: ContentStreamId,
    ) {
        self.update(source, |ws| {
            ws.current_content_stream_id = new_source_content_stream_id;
        });
        self.mark_dependents_outdated(target);
        self.update(source, |ws| ws.status = WorkspaceStatus::UpToDate);
        self.mark_dependents_outdated(source);
    }

    fn discarded(
        &mut self,
        name: &WorkspaceName,
        new_content_stream_id: ContentStreamId,
    ) {
        self.update(name, |ws| {
            ws.current_content_stream_id = new_content_stream_id;
            ws.status = WorkspaceStatus::UpToDate;
        });
        self.mark_dependents_outdated(name);
    }

    fn mark_dependents_outdated(&mut self, base: &WorkspaceName) {
        self.workspaces
            .values_mut()
            .filter(|ws| ws.base_workspace_name.as_ref() == Some(base))
            .for_each(|ws| ws.status = WorkspaceStatus::Outdated);
    }
}

/// Workspace projection kept in memory.
///
/// Implements [`WorkspaceFinder`] for lookups and [`ReadSideCatchUp`] as the
/// barrier command results wait on. The projection only moves forward when
/// asked to catch up.
pub struct InMemoryWorkspaceProjection {
    event_store: Arc<dyn EventStore>,
    batch_size: CatchUpBatchSize,
    state: RwLock<ProjectionState>,
    // one catch-up at a time; readers are not blocked by it
    catch_up_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for InMemoryWorkspaceProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("InMemoryWorkspaceProjection")
            .field("checkpoint", &state.checkpoint)
            .field("workspaces", &state.workspaces.len())
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl InMemoryWorkspaceProjection {
    /// Creates an empty projection reading from `event_store`.
    pub fn new(event_store: Arc<dyn EventStore>, config: &ContentRepositoryConfig) -> Self {
        Self {
            event_store,
            batch_size: config.catch_up_batch_size,
            state: RwLock::new(ProjectionState::default()),
            catch_up_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Position of the last applied event.
    pub fn checkpoint(&self) -> SequenceNumber {
        self.state.read().checkpoint
    }

    /// All workspaces, ordered by name.
    pub fn find_all(&self) -> Vec<Workspace> {
        self.state.read().workspaces.values().cloned().collect()
    }

    /// Applies everything currently in the log. Returns the new checkpoint.
    pub async fn catch_up(&self) -> Result<SequenceNumber, ReadSideError> {
        let _guard = self.catch_up_lock.lock().await;
        loop {
            let checkpoint = self.checkpoint();
            if !self.apply_next_batch(checkpoint, checkpoint).await? {
                return Ok(self.checkpoint());
            }
        }
    }

    /// Reads and applies one batch after `checkpoint`. `false` if there was nothing to read.
    async fn apply_next_batch(
        &self,
        checkpoint: SequenceNumber,
        target: SequenceNumber,
    ) -> Result<bool, ReadSideError> {
        let batch = self
            .event_store
            .read_all(checkpoint, Some(self.batch_size.into_inner()))
            .await
            .map_err(|e| ReadSideError {
                target,
                reason: e.to_string(),
            })?;
        if batch.is_empty() {
            return Ok(false);
        }
        self.apply_batch(&batch, target)?;
        Ok(true)
    }

    fn apply_batch(&self, batch: &[StoredEvent], target: SequenceNumber) -> Result<(), ReadSideError> {
        let mut state = self.state.write();
        for event in batch {
            if event.sequence_number <= state.checkpoint {
                continue;
            }
            let decoded = WorkspaceEvent::decode(&event.event_type, &event.payload).map_err(|e| {
                ReadSideError {
                    target,
                    reason: format!("event {} could not be decoded: {e}", event.sequence_number),
                }
            })?;
            if let Some(workspace_event) = decoded {
                trace!(event_type = %event.event_type, "Applying workspace event");
                state.apply(workspace_event);
            }
            state.checkpoint = event.sequence_number;
        }
        debug!(checkpoint = %state.checkpoint, "Workspace projection advanced");
        Ok(())
    }
}

#[async_trait]
impl ReadSideCatchUp for InMemoryWorkspaceProjection {
    #[instrument(skip(self))]
    async fn catch_up_to(&self, target: SequenceNumber) -> Result<(), ReadSideError> {
        let _guard = self.catch_up_lock.lock().await;
        loop {
            let checkpoint = self.checkpoint();
            if checkpoint >= target {
                return Ok(());
            }
            if !self.apply_next_batch(checkpoint, target).await? {
                return Err(ReadSideError {
                    target,
                    reason: format!("the event log ends at sequence number {checkpoint}"),
                });
            }
        }
    }
}

#[async_trait]
impl WorkspaceFinder for InMemoryWorkspaceProjection {
    async fn find_one_by_name(&self, name: &WorkspaceName) -> Result<Option<Workspace>, ReadSideError> {
        Ok(self.state.read().workspaces.get(name).cloned())
    }

    async fn find_by_base_workspace(
        &self,
        base: &WorkspaceName,
    ) -> Result<Vec<Workspace>, ReadSideError> {
        Ok(self
            .state
            .read()
            .workspaces
            .values()
            .filter(|ws| ws.base_workspace_name.as_ref() == Some(base))
            .cloned()
            .collect())
    }
}
