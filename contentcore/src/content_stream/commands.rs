//! Commands of the content-stream command handler.

use crate::types::{ContentStreamId, UserId};
use serde::{Deserialize, Serialize};

/// Create a new, empty content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContentStream {
    /// The stream to create
    pub content_stream_id: ContentStreamId,
    /// Who creates it
    pub initiating_user_id: UserId,
}

impl CreateContentStream {
    /// Creates the command.
    pub const fn new(content_stream_id: ContentStreamId, initiating_user_id: UserId) -> Self {
        Self {
            content_stream_id,
            initiating_user_id,
        }
    }
}

/// Fork a new content stream from the current tip of an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkContentStream {
    /// The stream to create
    pub content_stream_id: ContentStreamId,
    /// The stream to fork from
    pub source_content_stream_id: ContentStreamId,
    /// Who forks it
    pub initiating_user_id: UserId,
}

impl ForkContentStream {
    /// Creates the command.
    pub const fn new(
        content_stream_id: ContentStreamId,
        source_content_stream_id: ContentStreamId,
        initiating_user_id: UserId,
    ) -> Self {
        Self {
            content_stream_id,
            source_content_stream_id,
            initiating_user_id,
        }
    }
}

/// Remove a content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveContentStream {
    /// The stream to remove
    pub content_stream_id: ContentStreamId,
    /// Who removes it
    pub initiating_user_id: UserId,
}

impl RemoveContentStream {
    /// Creates the command.
    pub const fn new(content_stream_id: ContentStreamId, initiating_user_id: UserId) -> Self {
        Self {
            content_stream_id,
            initiating_user_id,
        }
    }
}
