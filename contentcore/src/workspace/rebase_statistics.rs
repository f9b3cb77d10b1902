//! Outcome bookkeeping for rebase.

use crate::command::CommandEnvelope;
use serde::{Deserialize, Serialize};

/// One recorded command that could not be re-applied during a rebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRebaseFailure {
    /// Position of the command among the workspace's recorded commands
    pub index: usize,
    /// The command as it was recorded
    pub command: CommandEnvelope,
    /// Why the mutation command handler rejected it
    pub message: String,
}

/// Per-command results collected while replaying a workspace onto a new base.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceRebaseStatistics {
    applied: usize,
    failures: Vec<CommandRebaseFailure>,
}

impl WorkspaceRebaseStatistics {
    /// Creates empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successfully re-applied command.
    pub fn command_applied(&mut self) {
        self.applied += 1;
    }

    /// Records a command that failed to re-apply.
    pub fn command_failed(&mut self, index: usize, command: CommandEnvelope, message: impl Into<String>) {
        self.failures.push(CommandRebaseFailure {
            index,
            command,
            message: message.into(),
        });
    }

    /// Whether any command failed.
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Number of successfully re-applied commands.
    pub const fn applied_count(&self) -> usize {
        self.applied
    }

    /// Number of failed commands.
    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// The failures, in replay order.
    pub fn failures(&self) -> &[CommandRebaseFailure] {
        &self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;
    use serde_json::json;

    #[test]
    fn counts_successes_and_failures() {
        let mut stats = WorkspaceRebaseStatistics::new();
        assert!(!stats.has_errors());

        stats.command_applied();
        stats.command_failed(
            1,
            CommandEnvelope::new(CommandKind::from_static("SetNodeProperty"), json!({})),
            "node does not exist",
        );
        stats.command_applied();

        assert!(stats.has_errors());
        assert_eq!(stats.applied_count(), 2);
        assert_eq!(stats.failed_count(), 1);
        assert_eq!(stats.failures()[0].index, 1);
        assert_eq!(stats.failures()[0].message, "node does not exist");
    }
}
