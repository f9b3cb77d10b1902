//! The workspace read model and the finder port.

use crate::errors::ReadSideError;
use crate::types::{
    ContentStreamId, UserId, WorkspaceDescription, WorkspaceName, WorkspaceTitle,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How a workspace relates to its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceStatus {
    /// Based on the current tip of its base workspace
    UpToDate,
    /// The base workspace moved; a rebase is needed before publishing
    Outdated,
    /// The last rebase attempt failed
    OutdatedConflict,
}

/// A named pointer to one current content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// The workspace name
    pub workspace_name: WorkspaceName,
    /// The base workspace; `None` for root workspaces
    pub base_workspace_name: Option<WorkspaceName>,
    /// Human readable title
    pub workspace_title: WorkspaceTitle,
    /// Free-form description
    pub workspace_description: WorkspaceDescription,
    /// Owner of a personal workspace
    pub workspace_owner: Option<UserId>,
    /// The content stream holding the workspace's state
    pub current_content_stream_id: ContentStreamId,
    /// Relation to the base workspace
    pub status: WorkspaceStatus,
}

impl Workspace {
    /// Whether this is a root workspace.
    pub const fn is_root(&self) -> bool {
        self.base_workspace_name.is_none()
    }
}

/// Read access to the workspace projection.
#[async_trait]
pub trait WorkspaceFinder: Send + Sync {
    /// The workspace called `name`, if it exists.
    async fn find_one_by_name(&self, name: &WorkspaceName)
        -> Result<Option<Workspace>, ReadSideError>;

    /// All workspaces directly based on `base`.
    async fn find_by_base_workspace(
        &self,
        base: &WorkspaceName,
    ) -> Result<Vec<Workspace>, ReadSideError>;
}
