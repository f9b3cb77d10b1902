//! A minimal node-editing domain to drive the workspace algorithms.
//!
//! Nodes can be created, get string properties and be removed. Node commands
//! are rebasable and address-matchable, node events are publishable.
//! [`TagContentStream`] and [`ContentStreamWasTagged`] deliberately lack those
//! capabilities.

use async_trait::async_trait;
use contentcore::command::{
    CommandEnvelope, CommandKind, ContentCommand, MatchableWithNodeAddress,
    RebasableToOtherContentStreams,
};
use contentcore::command_result::{CommandResult, ReadSideCatchUp};
use contentcore::content_stream::ContentStreamWasForked;
use contentcore::errors::{CapabilityError, CapabilityResult, EventStoreError, MutationError};
use contentcore::event::{
    decode_payload, encode_payload, DomainEvent, EventToWrite, EventType,
    PublishableToOtherContentStreams, StoredEvent,
};
use contentcore::event_normalizer::EventNormalizer;
use contentcore::event_store::{EventStore, ExpectedVersion, ReadOptions};
use contentcore::metadata::EventMetadata;
use contentcore::mutation::MutationCommandHandler;
use contentcore::replay::CommandRegistry;
use contentcore::stream_name::StreamNamespace;
use contentcore::types::{ContentStreamId, DimensionSpacePoint, NodeAddress, NodeAggregateId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Creates a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNode {
    /// Target content stream
    pub content_stream_id: ContentStreamId,
    /// The new node
    pub node_aggregate_id: NodeAggregateId,
    /// Where it is created
    pub dimension_space_point: DimensionSpacePoint,
}

/// Sets one property of an existing node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetNodeProperty {
    /// Target content stream
    pub content_stream_id: ContentStreamId,
    /// The node
    pub node_aggregate_id: NodeAggregateId,
    /// Where the node lives
    pub dimension_space_point: DimensionSpacePoint,
    /// Property name
    pub property: String,
    /// Property value
    pub value: String,
}

/// Removes an existing node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveNode {
    /// Target content stream
    pub content_stream_id: ContentStreamId,
    /// The node
    pub node_aggregate_id: NodeAggregateId,
    /// Where the node lives
    pub dimension_space_point: DimensionSpacePoint,
}

/// Tags a content stream. Neither rebasable nor address-matchable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagContentStream {
    /// Target content stream
    pub content_stream_id: ContentStreamId,
    /// The tag
    pub tag: String,
}

impl CreateNode {
    /// Creates `node` in the default dimension space point.
    pub fn new(content_stream_id: ContentStreamId, node_aggregate_id: NodeAggregateId) -> Self {
        Self {
            content_stream_id,
            node_aggregate_id,
            dimension_space_point: DimensionSpacePoint::default(),
        }
    }
}

impl SetNodeProperty {
    /// Sets `property` of `node` in the default dimension space point.
    pub fn new(
        content_stream_id: ContentStreamId,
        node_aggregate_id: NodeAggregateId,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            content_stream_id,
            node_aggregate_id,
            dimension_space_point: DimensionSpacePoint::default(),
            property: property.into(),
            value: value.into(),
        }
    }
}

impl RemoveNode {
    /// Removes `node` in the default dimension space point.
    pub fn new(content_stream_id: ContentStreamId, node_aggregate_id: NodeAggregateId) -> Self {
        Self {
            content_stream_id,
            node_aggregate_id,
            dimension_space_point: DimensionSpacePoint::default(),
        }
    }
}

macro_rules! node_command {
    ($command:ident) => {
        impl $command {
            /// The kind this command is recorded under.
            pub const KIND: &'static str = stringify!($command);

            /// The node this command touches.
            pub fn address(&self) -> NodeAddress {
                NodeAddress::new(
                    self.node_aggregate_id.clone(),
                    self.dimension_space_point.clone(),
                )
            }
        }

        impl ContentCommand for $command {
            fn kind(&self) -> CommandKind {
                CommandKind::from_static(Self::KIND)
            }

            fn to_payload(&self) -> CapabilityResult<Value> {
                encode_payload(Self::KIND, self)
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

        impl RebasableToOtherContentStreams for $command {
            fn create_copy_for_content_stream(
                &self,
                target: &ContentStreamId,
            ) -> Box<dyn ContentCommand> {
                Box::new(Self {
                    content_stream_id: target.clone(),
                    ..self.clone()
                })
            }
        }

        impl MatchableWithNodeAddress for $command {
            fn matches_node_address(&self, address: &NodeAddress) -> bool {
                address.node_aggregate_id == self.node_aggregate_id
                    && address.dimension_space_point == self.dimension_space_point
            }
        }
    };
}

node_command!(CreateNode);
node_command!(SetNodeProperty);
node_command!(RemoveNode);

impl TagContentStream {
    /// The kind this command is recorded under.
    pub const KIND: &'static str = "TagContentStream";
}

impl ContentCommand for TagContentStream {
    fn kind(&self) -> CommandKind {
        CommandKind::from_static(Self::KIND)
    }

    fn to_payload(&self) -> CapabilityResult<Value> {
        encode_payload(Self::KIND, self)
    }

    fn content_stream_id(&self) -> &ContentStreamId {
        &self.content_stream_id
    }
}

/// A node was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeWasCreated {
    /// The content stream
    pub content_stream_id: ContentStreamId,
    /// The node
    pub node_aggregate_id: NodeAggregateId,
    /// Where it lives
    pub dimension_space_point: DimensionSpacePoint,
}

/// A node property was set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePropertyWasSet {
    /// The content stream
    pub content_stream_id: ContentStreamId,
    /// The node
    pub node_aggregate_id: NodeAggregateId,
    /// Where it lives
    pub dimension_space_point: DimensionSpacePoint,
    /// Property name
    pub property: String,
    /// Property value
    pub value: String,
}

/// A node was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeWasRemoved {
    /// The content stream
    pub content_stream_id: ContentStreamId,
    /// The node
    pub node_aggregate_id: NodeAggregateId,
    /// Where it lived
    pub dimension_space_point: DimensionSpacePoint,
}

/// A content stream was tagged. Not publishable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStreamWasTagged {
    /// The content stream
    pub content_stream_id: ContentStreamId,
    /// The tag
    pub tag: String,
}

macro_rules! publishable_node_event {
    ($event:ident) => {
        impl $event {
            /// The tag this event is stored under.
            pub fn event_type_name() -> EventType {
                EventType::from_static(stringify!($event))
            }
        }

        impl DomainEvent for $event {
            fn event_type(&self) -> EventType {
                Self::event_type_name()
            }

            fn to_payload(&self) -> CapabilityResult<Value> {
                encode_payload(stringify!($event), self)
            }

            fn as_publishable(&self) -> Option<&dyn PublishableToOtherContentStreams> {
                Some(self)
            }
        }

        impl PublishableToOtherContentStreams for $event {
            fn create_copy_for_content_stream(
                &self,
                target: &ContentStreamId,
            ) -> Box<dyn DomainEvent> {
                Box::new(Self {
                    content_stream_id: target.clone(),
                    ..self.clone()
                })
            }
        }
    };
}

publishable_node_event!(NodeWasCreated);
publishable_node_event!(NodePropertyWasSet);
publishable_node_event!(NodeWasRemoved);

impl ContentStreamWasTagged {
    /// The tag this event is stored under.
    pub fn event_type_name() -> EventType {
        EventType::from_static("ContentStreamWasTagged")
    }
}

impl DomainEvent for ContentStreamWasTagged {
    fn event_type(&self) -> EventType {
        Self::event_type_name()
    }

    fn to_payload(&self) -> CapabilityResult<Value> {
        encode_payload("ContentStreamWasTagged", self)
    }
}

/// A registry that decodes every fixture command.
pub fn command_registry() -> CapabilityResult<CommandRegistry> {
    let mut registry = CommandRegistry::new();
    registry.register::<CreateNode>(CommandKind::from_static(CreateNode::KIND))?;
    registry.register::<SetNodeProperty>(CommandKind::from_static(SetNodeProperty::KIND))?;
    registry.register::<RemoveNode>(CommandKind::from_static(RemoveNode::KIND))?;
    registry.register::<TagContentStream>(CommandKind::from_static(TagContentStream::KIND))?;
    Ok(registry)
}

/// A normalizer that knows the lifecycle events and every fixture event.
pub fn event_normalizer() -> CapabilityResult<EventNormalizer> {
    let mut normalizer = EventNormalizer::new();
    normalizer.register::<NodeWasCreated>(NodeWasCreated::event_type_name())?;
    normalizer.register::<NodePropertyWasSet>(NodePropertyWasSet::event_type_name())?;
    normalizer.register::<NodeWasRemoved>(NodeWasRemoved::event_type_name())?;
    normalizer.register::<ContentStreamWasTagged>(ContentStreamWasTagged::event_type_name())?;
    Ok(normalizer)
}

/// Failure reading the fixture content graph.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The event log failed.
    #[error(transparent)]
    EventStore(#[from] EventStoreError),
    /// A stored event could not be decoded.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

/// Node state of one content stream, including what it inherited through forks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentGraph {
    nodes: HashMap<NodeAddress, BTreeMap<String, String>>,
    tags: Vec<String>,
}

impl ContentGraph {
    /// Reads the state of `content_stream_id`, following its fork chain.
    pub async fn read(
        event_store: &dyn EventStore,
        namespace: &StreamNamespace,
        content_stream_id: &ContentStreamId,
    ) -> Result<Self, FixtureError> {
        let mut segments = Vec::new();
        let mut next = Some((content_stream_id.clone(), ReadOptions::new()));
        while let Some((id, options)) = next.take() {
            let events = event_store
                .read_stream(&namespace.content_stream(&id), &options)
                .await?;
            if let Some(first) = events.first() {
                if first.event_type == ContentStreamWasForked::event_type_name() {
                    let forked: ContentStreamWasForked = first.decode()?;
                    let inherited = usize::try_from(forked.version_of_source_content_stream.value())
                        .unwrap_or(usize::MAX)
                        .saturating_add(1);
                    next = Some((
                        forked.source_content_stream_id,
                        ReadOptions::new().with_max_events(inherited),
                    ));
                }
            }
            segments.push(events);
        }

        let mut graph = Self::default();
        for event in segments.iter().rev().flatten() {
            graph.apply(event)?;
        }
        Ok(graph)
    }

    fn apply(&mut self, event: &StoredEvent) -> CapabilityResult<()> {
        let name: &str = event.event_type.as_ref();
        match name {
            "NodeWasCreated" => {
                let e: NodeWasCreated = event.decode()?;
                self.nodes.insert(
                    NodeAddress::new(e.node_aggregate_id, e.dimension_space_point),
                    BTreeMap::new(),
                );
            }
            "NodePropertyWasSet" => {
                let e: NodePropertyWasSet = event.decode()?;
                if let Some(properties) = self
                    .nodes
                    .get_mut(&NodeAddress::new(e.node_aggregate_id, e.dimension_space_point))
                {
                    properties.insert(e.property, e.value);
                }
            }
            "NodeWasRemoved" => {
                let e: NodeWasRemoved = event.decode()?;
                self.nodes
                    .remove(&NodeAddress::new(e.node_aggregate_id, e.dimension_space_point));
            }
            "ContentStreamWasTagged" => {
                let e: ContentStreamWasTagged = event.decode()?;
                self.tags.push(e.tag);
            }
            _ => {}
        }
        Ok(())
    }

    /// Whether the node exists.
    pub fn contains(&self, address: &NodeAddress) -> bool {
        self.nodes.contains_key(address)
    }

    /// A property of a node.
    pub fn property(&self, address: &NodeAddress, property: &str) -> Option<&str> {
        self.nodes
            .get(address)
            .and_then(|properties| properties.get(property))
            .map(String::as_str)
    }

    /// Ids of all nodes, sorted.
    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self
            .nodes
            .keys()
            .map(|address| address.node_aggregate_id.to_string())
            .collect();
        ids.sort();
        ids
    }

    /// Tags applied to the stream, in order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Applies fixture commands and records their envelopes in event metadata.
pub struct NodeMutationHandler {
    event_store: Arc<dyn EventStore>,
    namespace: StreamNamespace,
    catch_up: Arc<dyn ReadSideCatchUp>,
    applied: Mutex<Vec<CommandEnvelope>>,
}

impl std::fmt::Debug for NodeMutationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeMutationHandler")
            .field("namespace", &self.namespace)
            .field("applied", &self.applied.lock().len())
            .finish_non_exhaustive()
    }
}

impl NodeMutationHandler {
    /// Creates the handler.
    pub fn new(
        event_store: Arc<dyn EventStore>,
        namespace: StreamNamespace,
        catch_up: Arc<dyn ReadSideCatchUp>,
    ) -> Self {
        Self {
            event_store,
            namespace,
            catch_up,
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Every command applied so far, in order.
    pub fn applied_commands(&self) -> Vec<CommandEnvelope> {
        self.applied.lock().clone()
    }

    /// Forgets the applied commands.
    pub fn clear_applied_commands(&self) {
        self.applied.lock().clear();
    }

    fn to_event(
        envelope: &CommandEnvelope,
        graph: &ContentGraph,
    ) -> Result<Box<dyn DomainEvent>, MutationError> {
        let missing = |address: &NodeAddress| {
            MutationError::new(format!(
                "node '{}' does not exist",
                address.node_aggregate_id
            ))
        };
        let kind: &str = envelope.kind.as_ref();
        let event: Box<dyn DomainEvent> = match kind {
            CreateNode::KIND => {
                let c: CreateNode = decode(envelope)?;
                if graph.contains(&c.address()) {
                    return Err(MutationError::new(format!(
                        "node '{}' already exists",
                        c.node_aggregate_id
                    )));
                }
                Box::new(NodeWasCreated {
                    content_stream_id: c.content_stream_id,
                    node_aggregate_id: c.node_aggregate_id,
                    dimension_space_point: c.dimension_space_point,
                })
            }
            SetNodeProperty::KIND => {
                let c: SetNodeProperty = decode(envelope)?;
                if !graph.contains(&c.address()) {
                    return Err(missing(&c.address()));
                }
                Box::new(NodePropertyWasSet {
                    content_stream_id: c.content_stream_id,
                    node_aggregate_id: c.node_aggregate_id,
                    dimension_space_point: c.dimension_space_point,
                    property: c.property,
                    value: c.value,
                })
            }
            RemoveNode::KIND => {
                let c: RemoveNode = decode(envelope)?;
                if !graph.contains(&c.address()) {
                    return Err(missing(&c.address()));
                }
                Box::new(NodeWasRemoved {
                    content_stream_id: c.content_stream_id,
                    node_aggregate_id: c.node_aggregate_id,
                    dimension_space_point: c.dimension_space_point,
                })
            }
            TagContentStream::KIND => {
                let c: TagContentStream = decode(envelope)?;
                Box::new(ContentStreamWasTagged {
                    content_stream_id: c.content_stream_id,
                    tag: c.tag,
                })
            }
            other => return Err(MutationError::new(format!("unsupported command '{other}'"))),
        };
        Ok(event)
    }
}

fn decode<T: serde::de::DeserializeOwned>(envelope: &CommandEnvelope) -> Result<T, MutationError> {
    decode_payload(&envelope.kind, &envelope.payload).map_err(MutationError::from_source)
}

#[async_trait]
impl MutationCommandHandler for NodeMutationHandler {
    async fn handle(&self, command: Box<dyn ContentCommand>) -> Result<CommandResult, MutationError> {
        let envelope =
            CommandEnvelope::from_command(command.as_ref()).map_err(MutationError::from_source)?;
        let target = command.content_stream_id();
        let stream_name = self.namespace.content_stream(target);

        let version = self
            .event_store
            .stream_version(&stream_name)
            .await
            .map_err(MutationError::from_source)?
            .ok_or_else(|| MutationError::new(format!("content stream '{target}' does not exist")))?;
        let graph = ContentGraph::read(self.event_store.as_ref(), &self.namespace, target)
            .await
            .map_err(MutationError::from_source)?;

        let event = Self::to_event(&envelope, &graph)?;
        let write = EventToWrite::from_domain_event(event.as_ref())
            .map_err(MutationError::from_source)?
            .with_metadata(EventMetadata::new().with_command(envelope.clone()));
        let committed = self
            .event_store
            .append(&stream_name, vec![write], ExpectedVersion::Exact(version))
            .await
            .map_err(MutationError::from_source)?;

        debug!(kind = %envelope.kind, content_stream_id = %target, "Applied node command");
        self.applied.lock().push(envelope);
        Ok(CommandResult::from_committed(
            &committed,
            Arc::clone(&self.catch_up),
        ))
    }
}
