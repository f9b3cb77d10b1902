//! Content commands and their persisted envelope.
//!
//! Commands that mutate the content of a content stream are recorded in the
//! metadata of the events they produce, wrapped in a [`CommandEnvelope`].
//! Rebase and partial publish/discard read these envelopes back and re-apply
//! the commands onto a different content stream.
//!
//! Whether a command can take part in those algorithms is expressed through
//! optional capabilities:
//!
//! - [`RebasableToOtherContentStreams`]: the command can be re-targeted to
//!   another content stream. Required by rebase and partial publish/discard.
//! - [`MatchableWithNodeAddress`]: the command can tell whether it concerns a
//!   node address. Required by partial publish/discard.
//!
//! A command lacking a capability where it is needed is a
//! [`CapabilityError`], never a silently skipped command.
//!
//! # Example
//!
//! ```rust,ignore
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct SetNodeProperty { content_stream_id: ContentStreamId, node: NodeAddress, value: String }
//!
//! impl ContentCommand for SetNodeProperty {
//!     fn kind(&self) -> CommandKind { CommandKind::from_static("SetNodeProperty") }
//!     fn to_payload(&self) -> CapabilityResult<Value> { encode_payload("SetNodeProperty", self) }
//!     fn content_stream_id(&self) -> &ContentStreamId { &self.content_stream_id }
//!     fn as_rebasable(&self) -> Option<&dyn RebasableToOtherContentStreams> { Some(self) }
//! }
//! ```

use crate::errors::{CapabilityError, CapabilityResult};
use crate::types::{ContentStreamId, NodeAddress};
use async_trait::async_trait;
use nutype::nutype;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The persisted tag identifying a command type, e.g. `SetNodeProperty`.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct CommandKind(String);

impl CommandKind {
    /// Builds a command kind from a static name known to be valid.
    ///
    /// # Panics
    ///
    /// Panics if `name` is blank or longer than 255 characters.
    pub fn from_static(name: &'static str) -> Self {
        Self::try_new(name).expect("static command kind names are valid")
    }
}

/// A command that mutates the content of one content stream.
pub trait ContentCommand: std::fmt::Debug + Send + Sync {
    /// The tag this command is recorded under.
    fn kind(&self) -> CommandKind;

    /// The JSON payload this command is recorded as.
    fn to_payload(&self) -> CapabilityResult<Value>;

    /// The content stream this command targets.
    fn content_stream_id(&self) -> &ContentStreamId;

    /// The command viewed as rebasable, if it supports re-targeting.
    fn as_rebasable(&self) -> Option<&dyn RebasableToOtherContentStreams> {
        None
    }

    /// The command viewed as address-matchable, if it supports node matching.
    fn as_address_matchable(&self) -> Option<&dyn MatchableWithNodeAddress> {
        None
    }
}

/// Capability of a command to be re-targeted to another content stream.
pub trait RebasableToOtherContentStreams {
    /// Returns a copy of this command that targets `target`.
    fn create_copy_for_content_stream(&self, target: &ContentStreamId)
        -> Box<dyn ContentCommand>;
}

/// Capability of a command to report whether it concerns a node address.
pub trait MatchableWithNodeAddress {
    /// Whether this command touches the node at `address`.
    fn matches_node_address(&self, address: &NodeAddress) -> bool;
}

/// Re-targets `command` to `target`.
///
/// # Errors
///
/// Returns `CapabilityError::NotRebasable` if the command lacks the capability.
pub fn rebase_command(
    command: &dyn ContentCommand,
    target: &ContentStreamId,
) -> CapabilityResult<Box<dyn ContentCommand>> {
    command
        .as_rebasable()
        .map(|rebasable| rebasable.create_copy_for_content_stream(target))
        .ok_or_else(|| CapabilityError::NotRebasable(command.kind()))
}

/// Whether `command` touches at least one of `addresses`.
///
/// # Errors
///
/// Returns `CapabilityError::NotAddressMatchable` if the command lacks the capability.
pub fn matches_any(
    command: &dyn ContentCommand,
    addresses: &[NodeAddress],
) -> CapabilityResult<bool> {
    let matchable = command
        .as_address_matchable()
        .ok_or_else(|| CapabilityError::NotAddressMatchable(command.kind()))?;
    Ok(addresses
        .iter()
        .any(|address| matchable.matches_node_address(address)))
}

/// Serialized form of a command, stored in event metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    /// Version of the envelope layout
    pub format_version: u16,
    /// The recorded command kind
    pub kind: CommandKind,
    /// The recorded command payload
    pub payload: Value,
}

impl CommandEnvelope {
    /// The envelope layout written by this version of the library.
    pub const FORMAT_VERSION: u16 = 1;

    /// Creates an envelope in the current format.
    pub const fn new(kind: CommandKind, payload: Value) -> Self {
        Self {
            format_version: Self::FORMAT_VERSION,
            kind,
            payload,
        }
    }

    /// Wraps a command.
    pub fn from_command(command: &dyn ContentCommand) -> CapabilityResult<Self> {
        Ok(Self::new(command.kind(), command.to_payload()?))
    }
}

/// Explicit dispatch interface: one implementation per command type.
#[async_trait]
pub trait CommandHandler<C: Send + 'static>: Send + Sync {
    /// What a successful command produces.
    type Output;
    /// What a failed command reports.
    type Error;

    /// Handles one command.
    async fn handle(&self, command: C) -> Result<Self::Output, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::encode_payload;
    use crate::types::{DimensionSpacePoint, NodeAggregateId};
    use serde_json::json;

    #[derive(Debug, Clone, Serialize)]
    struct Touch {
        content_stream_id: ContentStreamId,
        node: NodeAggregateId,
    }

    impl ContentCommand for Touch {
        fn kind(&self) -> CommandKind {
            CommandKind::from_static("Touch")
        }

        fn to_payload(&self) -> CapabilityResult<Value> {
            encode_payload("Touch", self)
        }

        fn content_stream_id(&self) -> &ContentStreamId {
            &self.content_stream_id
        }

        fn as_rebasable(&self) -> Option<&dyn RebasableToOtherContentStreams> {
            Some(self)
        }

        fn as_address_matchable(&self) -> Option<&dyn MatchableWithNodeAddress> {
            Some(self)
        }
    }

    impl RebasableToOtherContentStreams for Touch {
        fn create_copy_for_content_stream(
            &self,
            target: &ContentStreamId,
        ) -> Box<dyn ContentCommand> {
            Box::new(Self {
                content_stream_id: target.clone(),
                node: self.node.clone(),
            })
        }
    }

    impl MatchableWithNodeAddress for Touch {
        fn matches_node_address(&self, address: &NodeAddress) -> bool {
            address.node_aggregate_id == self.node
        }
    }

    #[derive(Debug)]
    struct Opaque(ContentStreamId);

    impl ContentCommand for Opaque {
        fn kind(&self) -> CommandKind {
            CommandKind::from_static("Opaque")
        }

        fn to_payload(&self) -> CapabilityResult<Value> {
            Ok(json!({}))
        }

        fn content_stream_id(&self) -> &ContentStreamId {
            &self.0
        }
    }

    fn cs(id: &str) -> ContentStreamId {
        ContentStreamId::try_new(id).unwrap()
    }

    fn address(node: &str) -> NodeAddress {
        NodeAddress::new(
            NodeAggregateId::try_new(node).unwrap(),
            DimensionSpacePoint::default(),
        )
    }

    #[test]
    fn rebasing_retargets_the_command() {
        let command = Touch {
            content_stream_id: cs("old"),
            node: NodeAggregateId::try_new("n1").unwrap(),
        };
        let rebased = rebase_command(&command, &cs("new")).unwrap();
        assert_eq!(rebased.content_stream_id(), &cs("new"));
        assert_eq!(rebased.kind(), command.kind());
    }

    #[test]
    fn missing_capabilities_are_errors() {
        let command = Opaque(cs("old"));
        assert!(matches!(
            rebase_command(&command, &cs("new")),
            Err(CapabilityError::NotRebasable(_))
        ));
        assert!(matches!(
            matches_any(&command, &[address("n1")]),
            Err(CapabilityError::NotAddressMatchable(_))
        ));
    }

    #[test]
    fn matching_checks_every_address() {
        let command = Touch {
            content_stream_id: cs("old"),
            node: NodeAggregateId::try_new("n2").unwrap(),
        };
        assert!(matches_any(&command, &[address("n1"), address("n2")]).unwrap());
        assert!(!matches_any(&command, &[address("n1")]).unwrap());
        assert!(!matches_any(&command, &[]).unwrap());
    }

    #[test]
    fn envelope_wire_format() {
        let command = Touch {
            content_stream_id: cs("cs-1"),
            node: NodeAggregateId::try_new("n1").unwrap(),
        };
        let envelope = CommandEnvelope::from_command(&command).unwrap();
        insta::assert_snapshot!(
            serde_json::to_string(&envelope).unwrap(),
            @r#"{"formatVersion":1,"kind":"Touch","payload":{"content_stream_id":"cs-1","node":"n1"}}"#
        );
    }
}
