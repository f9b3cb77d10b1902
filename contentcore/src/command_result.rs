//! Synchronization with the read side.
//!
//! Every commit hands back a [`CommandResult`]. Steps that depend on read-side
//! state written by an earlier step must call
//! [`CommandResult::block_until_projections_up_to_date`] first; skipping the
//! barrier lets the later step observe stale projections.

use crate::errors::ReadSideError;
use crate::event_store::CommittedEvents;
use crate::types::SequenceNumber;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Something that can wait until the read side has applied a position of the log.
#[async_trait]
pub trait ReadSideCatchUp: Send + Sync {
    /// Returns once every event up to and including `target` has been applied.
    async fn catch_up_to(&self, target: SequenceNumber) -> Result<(), ReadSideError>;
}

/// Outcome of a committed command, usable as a read-side barrier.
#[derive(Clone, Default)]
pub struct CommandResult {
    last_sequence_number: Option<SequenceNumber>,
    catch_up: Option<Arc<dyn ReadSideCatchUp>>,
}

impl fmt::Debug for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandResult")
            .field("last_sequence_number", &self.last_sequence_number)
            .finish_non_exhaustive()
    }
}

impl CommandResult {
    /// A result for a command that committed nothing. Blocking on it returns immediately.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A result for a commit ending at `last_sequence_number`.
    pub fn new(last_sequence_number: SequenceNumber, catch_up: Arc<dyn ReadSideCatchUp>) -> Self {
        Self {
            last_sequence_number: Some(last_sequence_number),
            catch_up: Some(catch_up),
        }
    }

    /// A result for an append.
    pub fn from_committed(committed: &CommittedEvents, catch_up: Arc<dyn ReadSideCatchUp>) -> Self {
        committed
            .last_sequence_number
            .map_or_else(Self::empty, |last| Self::new(last, catch_up))
    }

    /// Position of the last event committed by the command, if any.
    pub const fn last_sequence_number(&self) -> Option<SequenceNumber> {
        self.last_sequence_number
    }

    /// Whether the command committed anything.
    pub const fn is_empty(&self) -> bool {
        self.last_sequence_number.is_none()
    }

    /// Waits until the read side has applied every event of this command.
    ///
    /// # Errors
    ///
    /// Returns the read side's error if it cannot catch up.
    pub async fn block_until_projections_up_to_date(&self) -> Result<(), ReadSideError> {
        match (self.last_sequence_number, &self.catch_up) {
            (Some(target), Some(catch_up)) => catch_up.catch_up_to(target).await,
            _ => Ok(()),
        }
    }

    /// Combines two results; the merged barrier waits for the later position.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self.last_sequence_number, other.last_sequence_number) {
            (Some(mine), Some(theirs)) if theirs > mine => other,
            (None, _) => other,
            _ => self,
        }
    }
}
