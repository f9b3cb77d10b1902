//! Resolves content streams against the event log.
//!
//! A content stream exists iff its event log stream has events; its version is
//! the version of the last of them. Lookups are memoized in a request-scoped
//! cache which must be reset (or invalidated per id) before any step that has
//! to observe freshly committed events.

use crate::config::ContentRepositoryConfig;
use crate::content_stream::events::ContentStreamWasRemoved;
use crate::errors::{ContentStreamError, ContentStreamResult, EventStoreResult};
use crate::event_store::{EventStore, ReadOptions};
use crate::stream_name::{StreamName, StreamNamespace};
use crate::types::{ContentStreamId, EventVersion};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A content stream with at least one committed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentStream {
    /// The content stream id
    pub id: ContentStreamId,
    /// The event log stream holding its events
    pub stream_name: StreamName,
    /// Version of its last event
    pub version: EventVersion,
    /// Whether its last event is a removal
    pub is_removed: bool,
}

/// Looks up content streams in the event log.
pub struct ContentStreamRepository {
    event_store: Arc<dyn EventStore>,
    namespace: StreamNamespace,
    cache: Option<Mutex<HashMap<ContentStreamId, Option<ContentStream>>>>,
}

impl std::fmt::Debug for ContentStreamRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStreamRepository")
            .field("namespace", &self.namespace)
            .field("cache_enabled", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl ContentStreamRepository {
    /// Creates a repository; caching follows `config.content_stream_cache`.
    pub fn new(event_store: Arc<dyn EventStore>, config: &ContentRepositoryConfig) -> Self {
        Self {
            event_store,
            namespace: config.namespace.clone(),
            cache: config
                .content_stream_cache
                .then(|| Mutex::new(HashMap::new())),
        }
    }

    /// The event log stream of a content stream.
    pub fn stream_name(&self, id: &ContentStreamId) -> StreamName {
        self.namespace.content_stream(id)
    }

    /// Finds a content stream, including removed ones. `None` iff its log is empty.
    pub async fn find(&self, id: &ContentStreamId) -> EventStoreResult<Option<ContentStream>> {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.lock().get(id).cloned()) {
            trace!(content_stream_id = %id, "Content stream served from cache");
            return Ok(cached);
        }

        let stream_name = self.stream_name(id);
        let found = match self.event_store.stream_version(&stream_name).await? {
            None => None,
            Some(version) => {
                let last = self
                    .event_store
                    .read_stream(
                        &stream_name,
                        &ReadOptions::new().from_version(version).with_max_events(1),
                    )
                    .await?;
                let is_removed = last
                    .first()
                    .is_some_and(|e| e.event_type == ContentStreamWasRemoved::event_type_name());
                Some(ContentStream {
                    id: id.clone(),
                    stream_name,
                    version,
                    is_removed,
                })
            }
        };

        if let Some(cache) = &self.cache {
            cache.lock().insert(id.clone(), found.clone());
        }
        Ok(found)
    }

    /// Current version of a content stream; `None` if it has no events.
    ///
    /// A removed stream still reports its version. Use
    /// [`require_existing`](Self::require_existing) to reject tombstoned streams.
    pub async fn resolve(&self, id: &ContentStreamId) -> EventStoreResult<Option<EventVersion>> {
        Ok(self.find(id).await?.map(|stream| stream.version))
    }

    /// The live content stream, or `DoesNotExistYet`.
    pub async fn require_existing(&self, id: &ContentStreamId) -> ContentStreamResult<ContentStream> {
        self.find(id)
            .await?
            .filter(|stream| !stream.is_removed)
            .ok_or_else(|| ContentStreamError::DoesNotExistYet(id.clone()))
    }

    /// Fails with `AlreadyExists` if the content stream has any events.
    pub async fn require_absent(&self, id: &ContentStreamId) -> ContentStreamResult<()> {
        match self.find(id).await? {
            Some(_) => Err(ContentStreamError::AlreadyExists(id.clone())),
            None => Ok(()),
        }
    }

    /// Forgets everything cached.
    pub fn reset(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
    }

    /// Forgets what is cached about one content stream.
    pub fn invalidate(&self, id: &ContentStreamId) {
        if let Some(cache) = &self.cache {
            cache.lock().remove(id);
        }
    }
}
