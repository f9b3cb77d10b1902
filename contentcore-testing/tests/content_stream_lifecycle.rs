//! Content stream lifecycle against the in-memory event log.

use contentcore::command::CommandHandler;
use contentcore::config::ContentRepositoryConfig;
use contentcore::content_stream::{
    ContentStreamRepository, ContentStreamWasForked, CreateContentStream, ForkContentStream,
    RemoveContentStream,
};
use contentcore::errors::ContentStreamError;
use contentcore::event::{EventToWrite, EventType};
use contentcore::event_store::{EventStore, ExpectedVersion, ReadOptions};
use contentcore::types::{EventVersion, UserId};
use contentcore_memory::InMemoryEventStore;
use contentcore_testing::{content_stream_id, TestContentRepository};
use serde_json::json;
use std::sync::Arc;

async fn stream_version(repo: &TestContentRepository, id: &str) -> Option<EventVersion> {
    repo.event_store()
        .stream_version(&repo.config().namespace.content_stream(&content_stream_id(id)))
        .await
        .unwrap()
}

#[tokio::test]
async fn created_stream_starts_at_version_zero() {
    let repo = TestContentRepository::new();
    let handler = repo.workspaces().content_stream_handler();

    handler
        .handle(CreateContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap();

    assert_eq!(stream_version(&repo, "a").await, Some(EventVersion::first()));
}

#[tokio::test]
async fn creating_an_existing_stream_fails_and_writes_nothing() {
    let repo = TestContentRepository::new();
    let handler = repo.workspaces().content_stream_handler();
    handler
        .handle(CreateContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap();

    let err = handler
        .handle(CreateContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap_err();

    assert!(matches!(err, ContentStreamError::AlreadyExists(id) if id == content_stream_id("a")));
    assert_eq!(stream_version(&repo, "a").await, Some(EventVersion::first()));
}

#[tokio::test]
async fn fork_records_the_source_version() {
    let repo = TestContentRepository::new();
    let handler = repo.workspaces().content_stream_handler();
    handler
        .handle(CreateContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap();

    handler
        .handle(ForkContentStream::new(
            content_stream_id("b"),
            content_stream_id("a"),
            UserId::system(),
        ))
        .await
        .unwrap();

    let events = repo
        .event_store()
        .read_stream(
            &repo.config().namespace.content_stream(&content_stream_id("b")),
            &ReadOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    let forked: ContentStreamWasForked = events[0].decode().unwrap();
    assert_eq!(forked.source_content_stream_id, content_stream_id("a"));
    assert_eq!(forked.version_of_source_content_stream, EventVersion::first());
}

#[tokio::test]
async fn fork_requires_an_existing_source_and_an_absent_target() {
    let repo = TestContentRepository::new();
    let handler = repo.workspaces().content_stream_handler();

    let err = handler
        .handle(ForkContentStream::new(
            content_stream_id("b"),
            content_stream_id("missing"),
            UserId::system(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ContentStreamError::DoesNotExistYet(id) if id == content_stream_id("missing")));
    assert_eq!(stream_version(&repo, "b").await, None);

    handler
        .handle(CreateContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap();
    let err = handler
        .handle(ForkContentStream::new(
            content_stream_id("a"),
            content_stream_id("a"),
            UserId::system(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ContentStreamError::AlreadyExists(_)));
}

#[tokio::test]
async fn removing_twice_reports_the_stream_as_gone() {
    let repo = TestContentRepository::new();
    let handler = repo.workspaces().content_stream_handler();
    handler
        .handle(CreateContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap();

    handler
        .handle(RemoveContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap();
    let err = handler
        .handle(RemoveContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap_err();

    assert!(matches!(err, ContentStreamError::DoesNotExistYet(_)));
    assert_eq!(stream_version(&repo, "a").await, Some(EventVersion::new(1)));
    assert!(handler
        .repository()
        .find(&content_stream_id("a"))
        .await
        .unwrap()
        .unwrap()
        .is_removed);
}

#[tokio::test]
async fn removed_streams_cannot_be_forked_or_recreated() {
    let repo = TestContentRepository::new();
    let handler = repo.workspaces().content_stream_handler();
    handler
        .handle(CreateContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap();
    handler
        .handle(RemoveContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap();

    let fork = handler
        .handle(ForkContentStream::new(
            content_stream_id("b"),
            content_stream_id("a"),
            UserId::system(),
        ))
        .await
        .unwrap_err();
    let create = handler
        .handle(CreateContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap_err();

    assert!(matches!(fork, ContentStreamError::DoesNotExistYet(_)));
    assert!(matches!(create, ContentStreamError::AlreadyExists(_)));
}

#[tokio::test]
async fn removed_stream_still_resolves_to_its_version() {
    let repo = TestContentRepository::new();
    let handler = repo.workspaces().content_stream_handler();
    handler
        .handle(CreateContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap();
    handler
        .handle(RemoveContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap();

    let repository = handler.repository();
    repository.reset();
    assert_eq!(
        repository.resolve(&content_stream_id("a")).await.unwrap(),
        Some(EventVersion::new(1))
    );

    let err = handler
        .handle(RemoveContentStream::new(content_stream_id("a"), UserId::system()))
        .await
        .unwrap_err();
    assert!(matches!(err, ContentStreamError::DoesNotExistYet(_)));
}

async fn append_marker(store: &InMemoryEventStore, config: &ContentRepositoryConfig, id: &str) {
    store
        .append(
            &config.namespace.content_stream(&content_stream_id(id)),
            vec![EventToWrite::new(EventType::from_static("Marker"), json!({}))],
            ExpectedVersion::Any,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn cached_lookups_stay_stale_until_reset_or_invalidated() {
    let store = InMemoryEventStore::new();
    let config = ContentRepositoryConfig::default();
    let repository = ContentStreamRepository::new(Arc::new(store.clone()), &config);
    let a = content_stream_id("a");

    assert_eq!(repository.resolve(&a).await.unwrap(), None);
    append_marker(&store, &config, "a").await;
    assert_eq!(repository.resolve(&a).await.unwrap(), None);

    repository.invalidate(&a);
    assert_eq!(repository.resolve(&a).await.unwrap(), Some(EventVersion::first()));

    append_marker(&store, &config, "a").await;
    assert_eq!(repository.resolve(&a).await.unwrap(), Some(EventVersion::first()));

    repository.reset();
    assert_eq!(repository.resolve(&a).await.unwrap(), Some(EventVersion::new(1)));
}

#[tokio::test]
async fn disabled_cache_always_reads_through() {
    let store = InMemoryEventStore::new();
    let config = ContentRepositoryConfig::default().with_content_stream_cache(false);
    let repository = ContentStreamRepository::new(Arc::new(store.clone()), &config);
    let a = content_stream_id("a");

    assert_eq!(repository.resolve(&a).await.unwrap(), None);
    append_marker(&store, &config, "a").await;
    assert_eq!(repository.resolve(&a).await.unwrap(), Some(EventVersion::first()));
}
