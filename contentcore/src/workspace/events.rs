//! Workspace lifecycle events, committed to `<namespace>:Workspace:<name>`.

use super::rebase_statistics::CommandRebaseFailure;
use crate::errors::CapabilityResult;
use crate::event::{decode_payload, encode_payload, DomainEvent, EventType};
use crate::types::{
    ContentStreamId, NodeAddress, UserId, WorkspaceDescription, WorkspaceName, WorkspaceTitle,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A root workspace was created on a brand-new content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootWorkspaceWasCreated {
    /// The new workspace
    pub workspace_name: WorkspaceName,
    /// Its title
    pub workspace_title: WorkspaceTitle,
    /// Its description
    pub workspace_description: WorkspaceDescription,
    /// Its content stream
    pub new_content_stream_id: ContentStreamId,
    /// Who created it
    pub initiating_user_id: UserId,
}

/// A workspace was created on a fork of its base workspace's content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasCreated {
    /// The new workspace
    pub workspace_name: WorkspaceName,
    /// Its base workspace
    pub base_workspace_name: WorkspaceName,
    /// Its title
    pub workspace_title: WorkspaceTitle,
    /// Its description
    pub workspace_description: WorkspaceDescription,
    /// Its content stream
    pub new_content_stream_id: ContentStreamId,
    /// Owner of a personal workspace
    pub workspace_owner: Option<UserId>,
    /// Who created it
    pub initiating_user_id: UserId,
}

/// All changes of a workspace were published into its base workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasPublished {
    /// The published workspace
    pub source_workspace_name: WorkspaceName,
    /// The base workspace that received the changes
    pub target_workspace_name: WorkspaceName,
    /// The fresh stream the source workspace now points to
    pub new_source_content_stream_id: ContentStreamId,
    /// The stream whose changes were published
    pub previous_source_content_stream_id: ContentStreamId,
    /// Who published
    pub initiating_user_id: UserId,
}

/// The changes of a workspace touching some node addresses were published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasPartiallyPublished {
    /// The published workspace
    pub source_workspace_name: WorkspaceName,
    /// The base workspace that received the changes
    pub target_workspace_name: WorkspaceName,
    /// The stream holding the remaining changes, now the workspace's stream
    pub new_source_content_stream_id: ContentStreamId,
    /// The stream the changes were taken from
    pub previous_source_content_stream_id: ContentStreamId,
    /// The addresses that were published
    pub published_nodes: Vec<NodeAddress>,
    /// Who published
    pub initiating_user_id: UserId,
}

/// A workspace was rebased onto the current tip of its base workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasRebased {
    /// The rebased workspace
    pub workspace_name: WorkspaceName,
    /// The stream the workspace now points to
    pub new_content_stream_id: ContentStreamId,
    /// The stream the workspace pointed to before
    pub previous_content_stream_id: ContentStreamId,
    /// Who rebased
    pub initiating_user_id: UserId,
}

/// Some recorded commands could not be re-applied; the workspace was left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRebaseFailed {
    /// The workspace that failed to rebase
    pub workspace_name: WorkspaceName,
    /// The partially rebased stream, kept for inspection
    pub candidate_content_stream_id: ContentStreamId,
    /// The stream the workspace still points to
    pub previous_content_stream_id: ContentStreamId,
    /// What failed, in replay order
    pub errors: Vec<CommandRebaseFailure>,
    /// Who attempted the rebase
    pub initiating_user_id: UserId,
}

/// All changes of a workspace were dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasDiscarded {
    /// The discarded workspace
    pub workspace_name: WorkspaceName,
    /// The fresh stream the workspace now points to
    pub new_content_stream_id: ContentStreamId,
    /// The stream whose changes were dropped
    pub previous_content_stream_id: ContentStreamId,
    /// Who discarded
    pub initiating_user_id: UserId,
}

/// The changes of a workspace touching some node addresses were dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasPartiallyDiscarded {
    /// The workspace
    pub workspace_name: WorkspaceName,
    /// The stream holding the kept changes, now the workspace's stream
    pub new_content_stream_id: ContentStreamId,
    /// The stream the changes were taken from
    pub previous_content_stream_id: ContentStreamId,
    /// The addresses whose changes were dropped
    pub discarded_nodes: Vec<NodeAddress>,
    /// Who discarded
    pub initiating_user_id: UserId,
}

/// A workspace was deleted along with its content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasRemoved {
    /// The removed workspace
    pub workspace_name: WorkspaceName,
    /// Who removed it
    pub initiating_user_id: UserId,
}

/// An empty workspace was moved onto another base workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceBaseWorkspaceWasChanged {
    /// The workspace
    pub workspace_name: WorkspaceName,
    /// Its new base workspace
    pub base_workspace_name: WorkspaceName,
    /// The fork of the new base the workspace now points to
    pub new_content_stream_id: ContentStreamId,
    /// Who changed it
    pub initiating_user_id: UserId,
}

/// Title and description of a workspace changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasRenamed {
    /// The workspace
    pub workspace_name: WorkspaceName,
    /// The new title
    pub workspace_title: WorkspaceTitle,
    /// The new description
    pub workspace_description: WorkspaceDescription,
    /// Who renamed it
    pub initiating_user_id: UserId,
}

/// The owner of a workspace changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceOwnerWasChanged {
    /// The workspace
    pub workspace_name: WorkspaceName,
    /// The new owner; `None` makes it a shared workspace
    pub new_workspace_owner: Option<UserId>,
    /// Who changed it
    pub initiating_user_id: UserId,
}

macro_rules! workspace_events {
    ($($event:ident),+ $(,)?) => {
        /// Any workspace lifecycle event.
        #[derive(Debug, Clone, PartialEq, Eq)]
        #[allow(clippy::large_enum_variant)]
        pub enum WorkspaceEvent {
            $(
                #[allow(missing_docs)]
                $event($event),
            )+
        }

        impl WorkspaceEvent {
            /// Decodes a stored workspace event; `None` if `event_type` is not one.
            pub fn decode(event_type: &EventType, payload: &Value) -> CapabilityResult<Option<Self>> {
                let name: &str = event_type.as_ref();
                $(
                    if name == stringify!($event) {
                        return decode_payload(name, payload).map(|event| Some(Self::$event(event)));
                    }
                )+
                Ok(None)
            }
        }

        impl DomainEvent for WorkspaceEvent {
            fn event_type(&self) -> EventType {
                match self {
                    $(Self::$event(_) => EventType::from_static(stringify!($event)),)+
                }
            }

            fn to_payload(&self) -> CapabilityResult<Value> {
                match self {
                    $(Self::$event(event) => encode_payload(stringify!($event), event),)+
                }
            }
        }

        $(
            impl From<$event> for WorkspaceEvent {
                fn from(event: $event) -> Self {
                    Self::$event(event)
                }
            }
        )+
    };
}

workspace_events!(
    RootWorkspaceWasCreated,
    WorkspaceWasCreated,
    WorkspaceWasPublished,
    WorkspaceWasPartiallyPublished,
    WorkspaceWasRebased,
    WorkspaceRebaseFailed,
    WorkspaceWasDiscarded,
    WorkspaceWasPartiallyDiscarded,
    WorkspaceWasRemoved,
    WorkspaceBaseWorkspaceWasChanged,
    WorkspaceWasRenamed,
    WorkspaceOwnerWasChanged,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_roundtrips_through_type_tag() {
        let event = WorkspaceEvent::from(WorkspaceWasRebased {
            workspace_name: WorkspaceName::try_new("user").unwrap(),
            new_content_stream_id: ContentStreamId::try_new("new").unwrap(),
            previous_content_stream_id: ContentStreamId::try_new("old").unwrap(),
            initiating_user_id: UserId::system(),
        });

        let payload = event.to_payload().unwrap();
        let decoded = WorkspaceEvent::decode(&event.event_type(), &payload)
            .unwrap()
            .unwrap();

        assert_eq!(decoded, event);
        assert_eq!(event.event_type().as_ref(), "WorkspaceWasRebased");
    }

    #[test]
    fn foreign_event_types_are_ignored() {
        let decoded = WorkspaceEvent::decode(
            &EventType::from_static("ContentStreamWasForked"),
            &serde_json::json!({}),
        )
        .unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn published_event_wire_format() {
        let event = WorkspaceWasPublished {
            source_workspace_name: WorkspaceName::try_new("user").unwrap(),
            target_workspace_name: WorkspaceName::live(),
            new_source_content_stream_id: ContentStreamId::try_new("cs-2").unwrap(),
            previous_source_content_stream_id: ContentStreamId::try_new("cs-1").unwrap(),
            initiating_user_id: UserId::system(),
        };
        insta::assert_snapshot!(
            serde_json::to_string(&event).unwrap(),
            @r#"{"sourceWorkspaceName":"user","targetWorkspaceName":"live","newSourceContentStreamId":"cs-2","previousSourceContentStreamId":"cs-1","initiatingUserId":"system"}"#
        );
    }
}
