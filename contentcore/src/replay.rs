//! Command replay: decoding recorded commands and selecting them by node address.

use crate::command::{matches_any, CommandEnvelope, CommandKind, ContentCommand};
use crate::errors::{CapabilityError, CapabilityResult, WorkspaceResult};
use crate::event::decode_payload;
use crate::event_store::{EventStore, ReadOptions};
use crate::stream_name::StreamName;
use crate::types::NodeAddress;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Type-erased decoder for one command kind.
pub type CommandDecoder =
    Arc<dyn Fn(&Value) -> CapabilityResult<Box<dyn ContentCommand>> + Send + Sync>;

/// Maps command kinds to their decoders.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    decoders: HashMap<CommandKind, CommandDecoder>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.decoders.keys().map(AsRef::as_ref).collect();
        kinds.sort_unstable();
        f.debug_struct("CommandRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a serde-decodable command type under `kind`.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityError::AlreadyRegistered` if the kind is taken.
    pub fn register<C>(&mut self, kind: CommandKind) -> CapabilityResult<()>
    where
        C: ContentCommand + DeserializeOwned + 'static,
    {
        let name = kind.to_string();
        self.register_decoder(
            kind,
            Arc::new(move |payload| {
                let command: C = decode_payload(&name, payload)?;
                Ok(Box::new(command) as Box<dyn ContentCommand>)
            }),
        )
    }

    /// Registers a custom decoder under `kind`.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityError::AlreadyRegistered` if the kind is taken.
    pub fn register_decoder(
        &mut self,
        kind: CommandKind,
        decoder: CommandDecoder,
    ) -> CapabilityResult<()> {
        if self.decoders.contains_key(&kind) {
            return Err(CapabilityError::AlreadyRegistered(kind.to_string()));
        }
        self.decoders.insert(kind, decoder);
        Ok(())
    }

    /// Whether a decoder exists for `kind`.
    pub fn is_registered(&self, kind: &CommandKind) -> bool {
        self.decoders.contains_key(kind)
    }

    /// Turns an envelope back into a command.
    ///
    /// # Errors
    ///
    /// Fails for envelopes in another format version, for unknown kinds and
    /// for payloads the decoder rejects.
    pub fn decode(&self, envelope: &CommandEnvelope) -> CapabilityResult<Box<dyn ContentCommand>> {
        if envelope.format_version != CommandEnvelope::FORMAT_VERSION {
            return Err(CapabilityError::UnsupportedEnvelopeVersion {
                kind: envelope.kind.clone(),
                format_version: envelope.format_version,
            });
        }
        let decoder = self
            .decoders
            .get(&envelope.kind)
            .ok_or_else(|| CapabilityError::UnknownCommandKind(envelope.kind.clone()))?;
        decoder(&envelope.payload)
    }
}

/// Reads every command recorded in the metadata of `stream_name`, in commit order.
///
/// Events without a command envelope are skipped; not every event originates
/// from a client command.
///
/// # Errors
///
/// Fails if the stream cannot be read or an envelope cannot be decoded.
#[instrument(skip(event_store, registry))]
pub async fn extract_commands(
    event_store: &dyn EventStore,
    registry: &CommandRegistry,
    stream_name: &StreamName,
) -> WorkspaceResult<Vec<Box<dyn ContentCommand>>> {
    let events = event_store
        .read_stream(stream_name, &ReadOptions::new())
        .await?;
    let mut commands = Vec::new();
    for event in &events {
        if let Some(envelope) = &event.metadata.command {
            debug!(version = %event.version, kind = %envelope.kind, "Extracted recorded command");
            commands.push(registry.decode(envelope)?);
        }
    }
    Ok(commands)
}

/// Commands split by whether they touch a set of node addresses.
#[derive(Debug, Default)]
pub struct PartitionedCommands {
    /// Commands touching at least one of the addresses, in original order
    pub matching: Vec<Box<dyn ContentCommand>>,
    /// All other commands, in original order
    pub remaining: Vec<Box<dyn ContentCommand>>,
}

/// Splits `commands` into those matching `addresses` and the rest, preserving relative order.
///
/// # Errors
///
/// Returns `CapabilityError::NotAddressMatchable` for the first command that
/// cannot be matched against node addresses.
pub fn partition_by_addresses(
    commands: Vec<Box<dyn ContentCommand>>,
    addresses: &[NodeAddress],
) -> CapabilityResult<PartitionedCommands> {
    let mut partitioned = PartitionedCommands::default();
    for command in commands {
        if matches_any(command.as_ref(), addresses)? {
            partitioned.matching.push(command);
        } else {
            partitioned.remaining.push(command);
        }
    }
    Ok(partitioned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{MatchableWithNodeAddress, RebasableToOtherContentStreams};
    use crate::event::encode_payload;
    use crate::types::{ContentStreamId, DimensionSpacePoint, NodeAggregateId};
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Mark {
        content_stream_id: ContentStreamId,
        node_aggregate_id: NodeAggregateId,
        seq: usize,
    }

    impl ContentCommand for Mark {
        fn kind(&self) -> CommandKind {
            CommandKind::from_static("Mark")
        }

        fn to_payload(&self) -> CapabilityResult<Value> {
            encode_payload("Mark", self)
        }

        fn content_stream_id(&self) -> &ContentStreamId {
            &self.content_stream_id
        }

        fn as_rebasable(&self) -> Option<&dyn RebasableToOtherContentStreams> {
            None
        }

        fn as_address_matchable(&self) -> Option<&dyn MatchableWithNodeAddress> {
            Some(self)
        }
    }

    impl MatchableWithNodeAddress for Mark {
        fn matches_node_address(&self, address: &NodeAddress) -> bool {
            address.node_aggregate_id == self.node_aggregate_id
        }
    }

    fn mark(node: &str, seq: usize) -> Box<dyn ContentCommand> {
        Box::new(Mark {
            content_stream_id: ContentStreamId::try_new("cs").unwrap(),
            node_aggregate_id: NodeAggregateId::try_new(node).unwrap(),
            seq,
        })
    }

    fn address(node: &str) -> NodeAddress {
        NodeAddress::new(
            NodeAggregateId::try_new(node).unwrap(),
            DimensionSpacePoint::default(),
        )
    }

    fn seqs(commands: &[Box<dyn ContentCommand>]) -> Vec<u64> {
        commands
            .iter()
            .map(|c| c.to_payload().unwrap()["seq"].as_u64().unwrap())
            .collect()
    }

    #[test]
    fn decode_uses_the_registered_decoder() {
        let mut registry = CommandRegistry::new();
        registry
            .register::<Mark>(CommandKind::from_static("Mark"))
            .unwrap();

        let envelope = CommandEnvelope::new(
            CommandKind::from_static("Mark"),
            json!({"contentStreamId": "cs", "nodeAggregateId": "n1", "seq": 0}),
        );
        let command = registry.decode(&envelope).unwrap();
        assert_eq!(command.kind().as_ref(), "Mark");
        assert!(command.as_rebasable().is_none());
    }

    #[test]
    fn decode_rejects_unknown_kinds_and_future_formats() {
        let registry = CommandRegistry::new();
        let envelope = CommandEnvelope::new(CommandKind::from_static("Mark"), json!({}));
        assert!(matches!(
            registry.decode(&envelope),
            Err(CapabilityError::UnknownCommandKind(_))
        ));

        let future = CommandEnvelope {
            format_version: 2,
            ..envelope
        };
        assert!(matches!(
            registry.decode(&future),
            Err(CapabilityError::UnsupportedEnvelopeVersion {
                format_version: 2,
                ..
            })
        ));
    }

    #[test]
    fn partition_keeps_relative_order() {
        let commands = vec![mark("a", 1), mark("b", 2), mark("a", 3)];
        let partitioned = partition_by_addresses(commands, &[address("a")]).unwrap();
        assert_eq!(seqs(&partitioned.matching), vec![1, 3]);
        assert_eq!(seqs(&partitioned.remaining), vec![2]);
    }

    proptest! {
        #[test]
        fn partition_preserves_order_within_each_side(nodes in prop::collection::vec(0u8..4, 0..30)) {
            let commands: Vec<_> = nodes
                .iter()
                .enumerate()
                .map(|(i, n)| mark(&format!("node-{n}"), i))
                .collect();
            let partitioned = partition_by_addresses(commands, &[address("node-0"), address("node-2")]).unwrap();

            let matching = seqs(&partitioned.matching);
            let remaining = seqs(&partitioned.remaining);
            prop_assert!(matching.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(remaining.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(matching.len() + remaining.len(), nodes.len());
            for seq in matching {
                let n = nodes[usize::try_from(seq).unwrap()];
                prop_assert!(n == 0 || n == 2);
            }
        }
    }
}
