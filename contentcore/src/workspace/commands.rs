//! Commands of the workspace command handler.
//!
//! Content stream ids a command will create may be supplied explicitly, which
//! makes the outcome predictable for callers and tests; when left out, fresh
//! ids are generated.

use crate::types::{
    ContentStreamId, NodeAddress, UserId, WorkspaceDescription, WorkspaceName, WorkspaceTitle,
};
use serde::{Deserialize, Serialize};

/// Create a root workspace on a brand-new content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRootWorkspace {
    /// The workspace to create
    pub workspace_name: WorkspaceName,
    /// Its title
    pub workspace_title: WorkspaceTitle,
    /// Its description
    pub workspace_description: WorkspaceDescription,
    /// The content stream to create for it
    pub new_content_stream_id: ContentStreamId,
    /// Who creates it
    pub initiating_user_id: UserId,
}

impl CreateRootWorkspace {
    /// Creates the command with an empty description and a fresh content stream id.
    pub fn new(workspace_name: WorkspaceName, workspace_title: WorkspaceTitle) -> Self {
        Self {
            workspace_name,
            workspace_title,
            workspace_description: WorkspaceDescription::empty(),
            new_content_stream_id: ContentStreamId::create(),
            initiating_user_id: UserId::system(),
        }
    }

    /// Uses a specific content stream id.
    #[must_use]
    pub fn with_content_stream_id(mut self, id: ContentStreamId) -> Self {
        self.new_content_stream_id = id;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: WorkspaceDescription) -> Self {
        self.workspace_description = description;
        self
    }

    /// Sets the initiating user.
    #[must_use]
    pub fn initiated_by(mut self, user: UserId) -> Self {
        self.initiating_user_id = user;
        self
    }
}

/// Create a workspace on a fork of its base workspace's content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspace {
    /// The workspace to create
    pub workspace_name: WorkspaceName,
    /// The workspace to base it on
    pub base_workspace_name: WorkspaceName,
    /// Its title
    pub workspace_title: WorkspaceTitle,
    /// Its description
    pub workspace_description: WorkspaceDescription,
    /// The content stream to fork for it
    pub new_content_stream_id: ContentStreamId,
    /// Owner of a personal workspace
    pub workspace_owner: Option<UserId>,
    /// Who creates it
    pub initiating_user_id: UserId,
}

impl CreateWorkspace {
    /// Creates the command with an empty description and a fresh content stream id.
    pub fn new(
        workspace_name: WorkspaceName,
        base_workspace_name: WorkspaceName,
        workspace_title: WorkspaceTitle,
    ) -> Self {
        Self {
            workspace_name,
            base_workspace_name,
            workspace_title,
            workspace_description: WorkspaceDescription::empty(),
            new_content_stream_id: ContentStreamId::create(),
            workspace_owner: None,
            initiating_user_id: UserId::system(),
        }
    }

    /// Uses a specific content stream id.
    #[must_use]
    pub fn with_content_stream_id(mut self, id: ContentStreamId) -> Self {
        self.new_content_stream_id = id;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: WorkspaceDescription) -> Self {
        self.workspace_description = description;
        self
    }

    /// Makes it a personal workspace of `owner`.
    #[must_use]
    pub fn owned_by(mut self, owner: UserId) -> Self {
        self.workspace_owner = Some(owner);
        self
    }

    /// Sets the initiating user.
    #[must_use]
    pub fn initiated_by(mut self, user: UserId) -> Self {
        self.initiating_user_id = user;
        self
    }
}

/// Publish all changes of a workspace into its base workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishWorkspace {
    /// The workspace to publish
    pub workspace_name: WorkspaceName,
    /// The stream to fork for the workspace afterwards
    pub new_content_stream_id: ContentStreamId,
    /// Who publishes
    pub initiating_user_id: UserId,
}

impl PublishWorkspace {
    /// Creates the command with a fresh content stream id.
    pub fn new(workspace_name: WorkspaceName) -> Self {
        Self {
            workspace_name,
            new_content_stream_id: ContentStreamId::create(),
            initiating_user_id: UserId::system(),
        }
    }

    /// Uses a specific content stream id for the workspace's next stream.
    #[must_use]
    pub fn with_new_content_stream_id(mut self, id: ContentStreamId) -> Self {
        self.new_content_stream_id = id;
        self
    }

    /// Sets the initiating user.
    #[must_use]
    pub fn initiated_by(mut self, user: UserId) -> Self {
        self.initiating_user_id = user;
        self
    }
}

/// Publish only the changes touching some node addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishIndividualNodesFromWorkspace {
    /// The workspace to publish from
    pub workspace_name: WorkspaceName,
    /// The addresses whose changes are published
    pub node_addresses: Vec<NodeAddress>,
    /// The stream receiving the matching changes before they are published
    pub content_stream_id_for_matching_part: ContentStreamId,
    /// The stream receiving the remaining changes; the workspace's stream afterwards
    pub content_stream_id_for_remaining_part: ContentStreamId,
    /// Who publishes
    pub initiating_user_id: UserId,
}

impl PublishIndividualNodesFromWorkspace {
    /// Creates the command with fresh content stream ids.
    pub fn new(workspace_name: WorkspaceName, node_addresses: Vec<NodeAddress>) -> Self {
        Self {
            workspace_name,
            node_addresses,
            content_stream_id_for_matching_part: ContentStreamId::create(),
            content_stream_id_for_remaining_part: ContentStreamId::create(),
            initiating_user_id: UserId::system(),
        }
    }

    /// Uses specific content stream ids for the matching and remaining parts.
    #[must_use]
    pub fn with_content_stream_ids(
        mut self,
        matching_part: ContentStreamId,
        remaining_part: ContentStreamId,
    ) -> Self {
        self.content_stream_id_for_matching_part = matching_part;
        self.content_stream_id_for_remaining_part = remaining_part;
        self
    }

    /// Sets the initiating user.
    #[must_use]
    pub fn initiated_by(mut self, user: UserId) -> Self {
        self.initiating_user_id = user;
        self
    }
}

/// Replay a workspace's recorded commands onto the current tip of its base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebaseWorkspace {
    /// The workspace to rebase
    pub workspace_name: WorkspaceName,
    /// The stream to replay onto
    pub rebased_content_stream_id: ContentStreamId,
    /// Who rebases
    pub initiating_user_id: UserId,
}

impl RebaseWorkspace {
    /// Creates the command with a fresh content stream id.
    pub fn new(workspace_name: WorkspaceName) -> Self {
        Self {
            workspace_name,
            rebased_content_stream_id: ContentStreamId::create(),
            initiating_user_id: UserId::system(),
        }
    }

    /// Uses a specific content stream id for the rebased stream.
    #[must_use]
    pub fn with_rebased_content_stream_id(mut self, id: ContentStreamId) -> Self {
        self.rebased_content_stream_id = id;
        self
    }

    /// Sets the initiating user.
    #[must_use]
    pub fn initiated_by(mut self, user: UserId) -> Self {
        self.initiating_user_id = user;
        self
    }
}

/// Drop all changes of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardWorkspace {
    /// The workspace to discard
    pub workspace_name: WorkspaceName,
    /// The stream to fork for the workspace
    pub new_content_stream_id: ContentStreamId,
    /// Who discards
    pub initiating_user_id: UserId,
}

impl DiscardWorkspace {
    /// Creates the command with a fresh content stream id.
    pub fn new(workspace_name: WorkspaceName) -> Self {
        Self {
            workspace_name,
            new_content_stream_id: ContentStreamId::create(),
            initiating_user_id: UserId::system(),
        }
    }

    /// Uses a specific content stream id for the workspace's next stream.
    #[must_use]
    pub fn with_new_content_stream_id(mut self, id: ContentStreamId) -> Self {
        self.new_content_stream_id = id;
        self
    }

    /// Sets the initiating user.
    #[must_use]
    pub fn initiated_by(mut self, user: UserId) -> Self {
        self.initiating_user_id = user;
        self
    }
}

/// Drop only the changes touching some node addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardIndividualNodesFromWorkspace {
    /// The workspace to discard from
    pub workspace_name: WorkspaceName,
    /// The addresses whose changes are dropped
    pub node_addresses: Vec<NodeAddress>,
    /// The stream the kept changes are replayed onto
    pub new_content_stream_id: ContentStreamId,
    /// Who discards
    pub initiating_user_id: UserId,
}

impl DiscardIndividualNodesFromWorkspace {
    /// Creates the command with a fresh content stream id.
    pub fn new(workspace_name: WorkspaceName, node_addresses: Vec<NodeAddress>) -> Self {
        Self {
            workspace_name,
            node_addresses,
            new_content_stream_id: ContentStreamId::create(),
            initiating_user_id: UserId::system(),
        }
    }

    /// Uses a specific content stream id for the workspace's next stream.
    #[must_use]
    pub fn with_new_content_stream_id(mut self, id: ContentStreamId) -> Self {
        self.new_content_stream_id = id;
        self
    }

    /// Sets the initiating user.
    #[must_use]
    pub fn initiated_by(mut self, user: UserId) -> Self {
        self.initiating_user_id = user;
        self
    }
}

/// Delete a workspace and remove its content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteWorkspace {
    /// The workspace to delete
    pub workspace_name: WorkspaceName,
    /// Who deletes it
    pub initiating_user_id: UserId,
}

impl DeleteWorkspace {
    /// Creates the command.
    pub fn new(workspace_name: WorkspaceName) -> Self {
        Self {
            workspace_name,
            initiating_user_id: UserId::system(),
        }
    }
}

/// Move an empty workspace onto another base workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBaseWorkspace {
    /// The workspace to move
    pub workspace_name: WorkspaceName,
    /// Its new base
    pub base_workspace_name: WorkspaceName,
    /// The fork of the new base the workspace will point to
    pub new_content_stream_id: ContentStreamId,
    /// Who moves it
    pub initiating_user_id: UserId,
}

impl ChangeBaseWorkspace {
    /// Creates the command with a fresh content stream id.
    pub fn new(workspace_name: WorkspaceName, base_workspace_name: WorkspaceName) -> Self {
        Self {
            workspace_name,
            base_workspace_name,
            new_content_stream_id: ContentStreamId::create(),
            initiating_user_id: UserId::system(),
        }
    }

    /// Uses a specific content stream id for the workspace's next stream.
    #[must_use]
    pub fn with_new_content_stream_id(mut self, id: ContentStreamId) -> Self {
        self.new_content_stream_id = id;
        self
    }
}

/// Change title and description of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameWorkspace {
    /// The workspace
    pub workspace_name: WorkspaceName,
    /// The new title
    pub workspace_title: WorkspaceTitle,
    /// The new description
    pub workspace_description: WorkspaceDescription,
    /// Who renames it
    pub initiating_user_id: UserId,
}

impl RenameWorkspace {
    /// Creates the command.
    pub fn new(
        workspace_name: WorkspaceName,
        workspace_title: WorkspaceTitle,
        workspace_description: WorkspaceDescription,
    ) -> Self {
        Self {
            workspace_name,
            workspace_title,
            workspace_description,
            initiating_user_id: UserId::system(),
        }
    }
}

/// Change (or clear) the owner of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeWorkspaceOwner {
    /// The workspace
    pub workspace_name: WorkspaceName,
    /// The new owner
    pub new_workspace_owner: Option<UserId>,
    /// Who changes it
    pub initiating_user_id: UserId,
}

impl ChangeWorkspaceOwner {
    /// Creates the command.
    pub fn new(workspace_name: WorkspaceName, new_workspace_owner: Option<UserId>) -> Self {
        Self {
            workspace_name,
            new_workspace_owner,
            initiating_user_id: UserId::system(),
        }
    }
}
