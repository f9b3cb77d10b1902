//! Event log stream naming.
//!
//! Content streams and workspaces each get their own stream in the event log.
//! The names must stay bit-exact for persisted state to remain readable:
//!
//! - content stream: `<namespace>:ContentStream:<contentStreamId>`
//! - workspace: `<namespace>:Workspace:<workspaceName>`

use crate::types::{ContentStreamId, WorkspaceName};
use nutype::nutype;

/// Name of one stream in the event log.
#[nutype(
    validate(not_empty, len_char_max = 1024),
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
pub struct StreamName(String);

/// Prefix shared by all streams of one content repository.
///
/// Namespaces are non-empty, at most 100 characters, and must not contain `:`.
#[nutype(
    sanitize(trim),
    validate(
        not_empty,
        len_char_max = 100,
        predicate = |namespace: &str| !namespace.contains(':')
    ),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct StreamNamespace(String);

impl StreamNamespace {
    /// The namespace used by default, compatible with existing persisted logs.
    pub const DEFAULT: &'static str = "Neos.ContentRepository";

    /// The event log stream holding the events of a content stream.
    pub fn content_stream(&self, content_stream_id: &ContentStreamId) -> StreamName {
        StreamName::try_new(format!("{self}:ContentStream:{content_stream_id}"))
            .expect("namespace and content stream id always form a valid stream name")
    }

    /// The event log stream holding the lifecycle events of a workspace.
    pub fn workspace(&self, workspace_name: &WorkspaceName) -> StreamName {
        StreamName::try_new(format!("{self}:Workspace:{workspace_name}"))
            .expect("namespace and workspace name always form a valid stream name")
    }
}

impl Default for StreamNamespace {
    fn default() -> Self {
        Self::try_new(Self::DEFAULT).expect("the default namespace is valid")
    }
}
