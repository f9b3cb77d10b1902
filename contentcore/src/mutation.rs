//! Port to the handler that applies individual content mutations.

use crate::command::ContentCommand;
use crate::command_result::CommandResult;
use crate::errors::MutationError;
use async_trait::async_trait;

/// Applies one content mutation command against the content stream it targets.
///
/// The workspace command handler replays recorded commands through this port
/// during rebase and partial publish/discard. Implementations are expected to
/// record a [`CommandEnvelope`](crate::command::CommandEnvelope) of the command
/// in the metadata of every event they commit, otherwise the resulting changes
/// cannot be rebased again later.
#[async_trait]
pub trait MutationCommandHandler: Send + Sync {
    /// Applies `command`.
    ///
    /// # Errors
    ///
    /// Returns a `MutationError` if the command is rejected against the
    /// current state of its content stream.
    async fn handle(&self, command: Box<dyn ContentCommand>) -> Result<CommandResult, MutationError>;
}
