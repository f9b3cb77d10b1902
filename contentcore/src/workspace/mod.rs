//! Workspaces: named, mutable pointers to content streams.
//!
//! Workspaces form a tree through their base workspace. A root workspace has
//! no base. Every other workspace starts on a fork of its base's content
//! stream and can publish its changes into the base, be rebased onto the
//! base's current tip, or have its changes discarded.

pub mod command_handler;
pub mod commands;
pub mod events;
pub mod model;
pub mod rebase_statistics;

pub use command_handler::{RebaseOutcome, WorkspaceCommandHandler, WorkspaceCommandHandlerDependencies};
pub use commands::{
    ChangeBaseWorkspace, ChangeWorkspaceOwner, CreateRootWorkspace, CreateWorkspace,
    DeleteWorkspace, DiscardIndividualNodesFromWorkspace, DiscardWorkspace,
    PublishIndividualNodesFromWorkspace, PublishWorkspace, RebaseWorkspace, RenameWorkspace,
};
pub use events::WorkspaceEvent;
pub use model::{Workspace, WorkspaceFinder, WorkspaceStatus};
pub use rebase_statistics::{CommandRebaseFailure, WorkspaceRebaseStatistics};
