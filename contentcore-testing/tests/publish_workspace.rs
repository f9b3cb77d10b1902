//! Publishing a workspace into its base.

use contentcore::errors::{CapabilityError, ErrorCategory, WorkspaceError};
use contentcore::event_store::EventStore;
use contentcore::types::EventVersion;
use contentcore::workspace::{PublishWorkspace, WorkspaceStatus};
use contentcore_testing::fixture::{ContentStreamWasTagged, TagContentStream};
use contentcore_testing::{address, content_stream_id, workspace_name, TestContentRepository};

async fn live_version(repo: &TestContentRepository) -> Option<EventVersion> {
    repo.event_store()
        .stream_version(&repo.config().namespace.content_stream(&content_stream_id("live-cs")))
        .await
        .unwrap()
}

async fn live_with(workspaces: &[&str]) -> TestContentRepository {
    let repo = TestContentRepository::new();
    repo.create_live().await.unwrap();
    for name in workspaces {
        repo.create_workspace(name, "live").await.unwrap();
    }
    repo
}

#[tokio::test]
async fn publishing_without_changes_only_renews_the_stream() {
    let repo = live_with(&["user"]).await;

    repo.execute(
        PublishWorkspace::new(workspace_name("user"))
            .with_new_content_stream_id(content_stream_id("user-cs-2")),
    )
    .await
    .unwrap();

    assert_eq!(live_version(&repo).await, Some(EventVersion::first()));
    let user = repo.workspace("user").await.unwrap();
    assert_eq!(user.current_content_stream_id, content_stream_id("user-cs-2"));
    assert_eq!(user.status, WorkspaceStatus::UpToDate);
}

#[tokio::test]
async fn published_changes_land_in_the_base() {
    let repo = live_with(&["user"]).await;
    repo.create_node("user", "n1").await.unwrap();
    repo.set_property("user", "n1", "title", "Hello").await.unwrap();

    repo.execute(PublishWorkspace::new(workspace_name("user")))
        .await
        .unwrap();

    let live = repo.graph("live").await;
    assert_eq!(live.node_ids(), vec!["n1"]);
    assert_eq!(live.property(&address("n1"), "title"), Some("Hello"));
    assert_eq!(live_version(&repo).await, Some(EventVersion::new(2)));

    // the fresh user stream starts from the published state
    assert_eq!(
        repo.graph("user").await.property(&address("n1"), "title"),
        Some("Hello")
    );
}

#[tokio::test]
async fn publishing_marks_sibling_workspaces_outdated() {
    let repo = live_with(&["user", "other"]).await;
    repo.create_node("other", "n2").await.unwrap();

    repo.execute(PublishWorkspace::new(workspace_name("other")))
        .await
        .unwrap();

    assert_eq!(
        repo.workspace("user").await.unwrap().status,
        WorkspaceStatus::Outdated
    );
    assert_eq!(
        repo.workspace("other").await.unwrap().status,
        WorkspaceStatus::UpToDate
    );
}

#[tokio::test]
async fn publishing_onto_a_moved_base_is_rejected() {
    let repo = live_with(&["user", "other"]).await;
    repo.create_node("other", "n2").await.unwrap();
    repo.execute(PublishWorkspace::new(workspace_name("other")))
        .await
        .unwrap();
    repo.create_node("user", "n1").await.unwrap();

    let err = repo
        .execute(PublishWorkspace::new(workspace_name("user")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkspaceError::BaseWorkspaceHasBeenModifiedInTheMeantime {
            ref base_content_stream_id,
            expected_version,
        } if base_content_stream_id == &content_stream_id("live-cs")
            && expected_version == EventVersion::first()
    ));
    assert_eq!(err.category(), ErrorCategory::Concurrency);
    assert_eq!(repo.graph("live").await.node_ids(), vec!["n2"]);
    assert_eq!(repo.current_stream("user").await, content_stream_id("user-cs"));
}

#[tokio::test]
async fn empty_workspace_on_a_moved_base_is_rejected_too() {
    let repo = live_with(&["user", "other"]).await;
    repo.create_node("other", "n2").await.unwrap();
    repo.execute(PublishWorkspace::new(workspace_name("other")))
        .await
        .unwrap();

    let err = repo
        .execute(PublishWorkspace::new(workspace_name("user")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkspaceError::BaseWorkspaceHasBeenModifiedInTheMeantime { .. }
    ));
}

#[tokio::test]
async fn non_publishable_events_abort_before_writing() {
    let repo = live_with(&["user"]).await;
    repo.create_node("user", "n1").await.unwrap();
    repo.apply(TagContentStream {
        content_stream_id: content_stream_id("user-cs"),
        tag: "reviewed".into(),
    })
    .await
    .unwrap();

    let err = repo
        .execute(PublishWorkspace::new(workspace_name("user")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkspaceError::Capability(CapabilityError::NotPublishable(ref event_type))
            if event_type == &ContentStreamWasTagged::event_type_name()
    ));
    assert_eq!(err.category(), ErrorCategory::Programming);
    assert_eq!(live_version(&repo).await, Some(EventVersion::first()));
}

#[tokio::test]
async fn root_workspaces_cannot_be_published() {
    let repo = live_with(&[]).await;

    let err = repo
        .execute(PublishWorkspace::new(workspace_name("live")))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkspaceError::HasNoBaseWorkspaceName(_)));
}

#[tokio::test]
async fn unknown_workspaces_cannot_be_published() {
    let repo = live_with(&[]).await;

    let err = repo
        .execute(PublishWorkspace::new(workspace_name("ghost")))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkspaceError::WorkspaceDoesNotExist(_)));
}

#[tokio::test]
async fn changes_travel_up_a_chain_of_workspaces() {
    let repo = live_with(&["review"]).await;
    repo.create_workspace("user", "review").await.unwrap();
    repo.create_node("user", "n1").await.unwrap();

    repo.execute(PublishWorkspace::new(workspace_name("user")))
        .await
        .unwrap();
    assert_eq!(repo.graph("review").await.node_ids(), vec!["n1"]);
    assert!(repo.graph("live").await.node_ids().is_empty());

    repo.execute(PublishWorkspace::new(workspace_name("review")))
        .await
        .unwrap();
    assert_eq!(repo.graph("live").await.node_ids(), vec!["n1"]);
    // review got a fresh stream, so its dependent has to catch up
    assert_eq!(
        repo.workspace("user").await.unwrap().status,
        WorkspaceStatus::Outdated
    );
}
