//! A fully wired in-memory content repository for tests.

use crate::fixture::{self, ContentGraph, CreateNode, NodeMutationHandler, RemoveNode, SetNodeProperty};
use contentcore::command::{CommandHandler, ContentCommand};
use contentcore::command_result::CommandResult;
use contentcore::config::ContentRepositoryConfig;
use contentcore::errors::{MutationError, WorkspaceError, WorkspaceResult};
use contentcore::mutation::MutationCommandHandler;
use contentcore::types::{
    ContentStreamId, DimensionSpacePoint, NodeAddress, NodeAggregateId, WorkspaceName,
    WorkspaceTitle,
};
use contentcore::workspace::{
    CreateRootWorkspace, CreateWorkspace, RebaseOutcome, RebaseWorkspace, Workspace,
    WorkspaceCommandHandler, WorkspaceCommandHandlerDependencies, WorkspaceFinder,
};
use contentcore_memory::{InMemoryEventStore, InMemoryWorkspaceProjection};
use std::sync::Arc;

/// Parses a workspace name; panics on invalid input.
pub fn workspace_name(name: &str) -> WorkspaceName {
    WorkspaceName::try_new(name).expect("valid workspace name")
}

/// Parses a content stream id; panics on invalid input.
pub fn content_stream_id(id: &str) -> ContentStreamId {
    ContentStreamId::try_new(id).expect("valid content stream id")
}

/// Parses a node aggregate id; panics on invalid input.
pub fn node(id: &str) -> NodeAggregateId {
    NodeAggregateId::try_new(id).expect("valid node aggregate id")
}

/// The address of `id` in the default dimension space point.
pub fn address(id: &str) -> NodeAddress {
    NodeAddress::new(node(id), DimensionSpacePoint::default())
}

/// In-memory event store, workspace projection, node domain and workspace
/// command handler, wired together.
///
/// Every helper blocks until the projection has caught up, so lookups made
/// right after a helper returns see its effect.
#[derive(Debug)]
pub struct TestContentRepository {
    config: ContentRepositoryConfig,
    event_store: InMemoryEventStore,
    projection: Arc<InMemoryWorkspaceProjection>,
    mutations: Arc<NodeMutationHandler>,
    workspaces: WorkspaceCommandHandler,
}

impl Default for TestContentRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContentRepository {
    /// Wires a repository with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ContentRepositoryConfig::default())
    }

    /// Wires a repository with `config`.
    pub fn with_config(config: ContentRepositoryConfig) -> Self {
        let event_store = InMemoryEventStore::new();
        let shared_store: Arc<dyn contentcore::event_store::EventStore> =
            Arc::new(event_store.clone());
        let projection = Arc::new(InMemoryWorkspaceProjection::new(
            Arc::clone(&shared_store),
            &config,
        ));
        let mutations = Arc::new(NodeMutationHandler::new(
            Arc::clone(&shared_store),
            config.namespace.clone(),
            projection.clone(),
        ));
        let workspaces = WorkspaceCommandHandler::new(WorkspaceCommandHandlerDependencies {
            config: config.clone(),
            event_store: shared_store,
            workspace_finder: projection.clone(),
            mutation_handler: mutations.clone(),
            command_registry: Arc::new(
                fixture::command_registry().expect("fixture commands register once"),
            ),
            event_normalizer: Arc::new(
                fixture::event_normalizer().expect("fixture events register once"),
            ),
            catch_up: projection.clone(),
        });
        Self {
            config,
            event_store,
            projection,
            mutations,
            workspaces,
        }
    }

    /// The configuration the repository was wired with.
    pub const fn config(&self) -> &ContentRepositoryConfig {
        &self.config
    }

    /// The event log.
    pub const fn event_store(&self) -> &InMemoryEventStore {
        &self.event_store
    }

    /// The workspace projection.
    pub fn projection(&self) -> &InMemoryWorkspaceProjection {
        &self.projection
    }

    /// The node mutation handler.
    pub fn mutations(&self) -> &NodeMutationHandler {
        &self.mutations
    }

    /// The workspace command handler.
    pub const fn workspaces(&self) -> &WorkspaceCommandHandler {
        &self.workspaces
    }

    /// Runs a workspace command and waits for the projection.
    pub async fn execute<C>(&self, command: C) -> WorkspaceResult<CommandResult>
    where
        C: Send + 'static,
        WorkspaceCommandHandler:
            CommandHandler<C, Output = CommandResult, Error = WorkspaceError>,
    {
        let result = self.workspaces.handle(command).await?;
        result.block_until_projections_up_to_date().await?;
        Ok(result)
    }

    /// Rebases a workspace and waits for the projection.
    pub async fn rebase(&self, name: &str) -> WorkspaceResult<RebaseOutcome> {
        let outcome = self
            .workspaces
            .handle(RebaseWorkspace::new(workspace_name(name)))
            .await?;
        outcome.result().block_until_projections_up_to_date().await?;
        Ok(outcome)
    }

    /// Creates the root workspace `live` on content stream `live-cs`.
    pub async fn create_live(&self) -> WorkspaceResult<CommandResult> {
        self.execute(
            CreateRootWorkspace::new(WorkspaceName::live(), title("Live"))
                .with_content_stream_id(content_stream_id("live-cs")),
        )
        .await
    }

    /// Creates `name` on `base`, on content stream `<name>-cs`.
    pub async fn create_workspace(&self, name: &str, base: &str) -> WorkspaceResult<CommandResult> {
        self.execute(
            CreateWorkspace::new(workspace_name(name), workspace_name(base), title(name))
                .with_content_stream_id(content_stream_id(&format!("{name}-cs"))),
        )
        .await
    }

    /// The projected workspace.
    pub async fn workspace(&self, name: &str) -> Option<Workspace> {
        self.projection
            .find_one_by_name(&workspace_name(name))
            .await
            .expect("in-memory projection lookups do not fail")
    }

    /// The current content stream of a workspace; panics if it does not exist.
    pub async fn current_stream(&self, name: &str) -> ContentStreamId {
        self.workspace(name)
            .await
            .unwrap_or_else(|| panic!("workspace '{name}' does not exist"))
            .current_content_stream_id
    }

    /// Node state of a content stream.
    pub async fn graph_of(&self, id: &ContentStreamId) -> ContentGraph {
        ContentGraph::read(&self.event_store, &self.config.namespace, id)
            .await
            .expect("content graph is readable")
    }

    /// Node state of a workspace.
    pub async fn graph(&self, name: &str) -> ContentGraph {
        let id = self.current_stream(name).await;
        self.graph_of(&id).await
    }

    /// Applies a content command and waits for the projection.
    pub async fn apply(
        &self,
        command: impl ContentCommand + 'static,
    ) -> Result<CommandResult, MutationError> {
        let result = self.mutations.handle(Box::new(command)).await?;
        result
            .block_until_projections_up_to_date()
            .await
            .map_err(MutationError::from_source)?;
        Ok(result)
    }

    /// Creates node `id` in workspace `name`.
    pub async fn create_node(&self, name: &str, id: &str) -> Result<CommandResult, MutationError> {
        let stream = self.current_stream(name).await;
        self.apply(CreateNode::new(stream, node(id))).await
    }

    /// Sets a property of node `id` in workspace `name`.
    pub async fn set_property(
        &self,
        name: &str,
        id: &str,
        property: &str,
        value: &str,
    ) -> Result<CommandResult, MutationError> {
        let stream = self.current_stream(name).await;
        self.apply(SetNodeProperty::new(stream, node(id), property, value))
            .await
    }

    /// Removes node `id` in workspace `name`.
    pub async fn remove_node(&self, name: &str, id: &str) -> Result<CommandResult, MutationError> {
        let stream = self.current_stream(name).await;
        self.apply(RemoveNode::new(stream, node(id))).await
    }
}

fn title(title: &str) -> WorkspaceTitle {
    WorkspaceTitle::try_new(title).expect("valid workspace title")
}
