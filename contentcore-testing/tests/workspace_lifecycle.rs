//! Creating, renaming, re-basing and deleting workspaces.

use contentcore::errors::{ContentStreamError, ErrorCategory, WorkspaceError};
use contentcore::types::{UserId, WorkspaceDescription, WorkspaceName, WorkspaceTitle};
use contentcore::workspace::{
    ChangeBaseWorkspace, ChangeWorkspaceOwner, CreateRootWorkspace, DeleteWorkspace,
    RenameWorkspace, WorkspaceStatus,
};
use contentcore_testing::{content_stream_id, workspace_name, TestContentRepository};

async fn live_with_user() -> TestContentRepository {
    let repo = TestContentRepository::new();
    repo.create_live().await.unwrap();
    repo.create_workspace("user", "live").await.unwrap();
    repo
}

#[tokio::test]
async fn root_workspace_is_projected_without_base() {
    let repo = TestContentRepository::new();
    repo.create_live().await.unwrap();

    let live = repo.workspace("live").await.unwrap();
    assert!(live.is_root());
    assert_eq!(live.current_content_stream_id, content_stream_id("live-cs"));
    assert_eq!(live.status, WorkspaceStatus::UpToDate);
    assert_eq!(live.workspace_title.to_string(), "Live");
}

#[tokio::test]
async fn workspace_forks_from_its_base() {
    let repo = live_with_user().await;
    repo.create_node("live", "n1").await.unwrap();
    repo.create_workspace("review", "live").await.unwrap();

    let review = repo.workspace("review").await.unwrap();
    assert_eq!(review.base_workspace_name, Some(workspace_name("live")));
    assert_eq!(review.current_content_stream_id, content_stream_id("review-cs"));
    assert_eq!(repo.graph("review").await.node_ids(), vec!["n1"]);
    // forked before n1 existed
    assert!(repo.graph("user").await.node_ids().is_empty());
}

#[tokio::test]
async fn duplicate_names_are_rejected() {
    let repo = live_with_user().await;

    let err = repo.create_workspace("user", "live").await.unwrap_err();
    assert!(matches!(err, WorkspaceError::WorkspaceAlreadyExists(ref name) if name == &workspace_name("user")));
    assert_eq!(err.category(), ErrorCategory::Precondition);

    let err = repo.create_live().await.unwrap_err();
    assert!(matches!(err, WorkspaceError::WorkspaceAlreadyExists(_)));
}

#[tokio::test]
async fn root_workspace_needs_a_fresh_content_stream() {
    let repo = TestContentRepository::new();
    repo.create_live().await.unwrap();

    let err = repo
        .execute(
            CreateRootWorkspace::new(
                workspace_name("archive"),
                WorkspaceTitle::try_new("Archive").unwrap(),
            )
            .with_content_stream_id(content_stream_id("live-cs")),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkspaceError::ContentStream(ContentStreamError::AlreadyExists(_))
    ));
    assert!(repo.workspace("archive").await.is_none());
}

#[tokio::test]
async fn workspace_needs_an_existing_base() {
    let repo = TestContentRepository::new();
    repo.create_live().await.unwrap();

    let err = repo.create_workspace("user", "staging").await.unwrap_err();

    assert!(matches!(
        err,
        WorkspaceError::BaseWorkspaceDoesNotExist { ref workspace, ref base }
            if workspace == &workspace_name("user") && base == &workspace_name("staging")
    ));
    assert!(repo.workspace("user").await.is_none());
}

#[test]
fn workspace_names_are_lowercase_slugs() {
    assert!(WorkspaceName::try_new("user-kim-2").is_ok());
    assert!(WorkspaceName::try_new("User").is_err());
    assert!(WorkspaceName::try_new("-user").is_err());
    assert!(WorkspaceName::try_new("").is_err());
    assert!(WorkspaceName::try_new("a".repeat(37)).is_err());
}

#[tokio::test]
async fn rename_updates_title_and_description() {
    let repo = live_with_user().await;

    repo.execute(RenameWorkspace::new(
        workspace_name("user"),
        WorkspaceTitle::try_new("Drafts").unwrap(),
        WorkspaceDescription::try_new("Unreviewed changes").unwrap(),
    ))
    .await
    .unwrap();

    let user = repo.workspace("user").await.unwrap();
    assert_eq!(user.workspace_title.to_string(), "Drafts");
    assert_eq!(user.workspace_description.to_string(), "Unreviewed changes");
    assert_eq!(user.current_content_stream_id, content_stream_id("user-cs"));
}

#[tokio::test]
async fn rename_of_unknown_workspace_fails() {
    let repo = TestContentRepository::new();
    repo.create_live().await.unwrap();

    let err = repo
        .execute(RenameWorkspace::new(
            workspace_name("ghost"),
            WorkspaceTitle::try_new("Ghost").unwrap(),
            WorkspaceDescription::empty(),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkspaceError::WorkspaceDoesNotExist(_)));
}

#[tokio::test]
async fn owner_can_be_set_and_cleared() {
    let repo = live_with_user().await;
    let kim = UserId::try_new("kim").unwrap();

    repo.execute(ChangeWorkspaceOwner::new(
        workspace_name("user"),
        Some(kim.clone()),
    ))
    .await
    .unwrap();
    assert_eq!(repo.workspace("user").await.unwrap().workspace_owner, Some(kim));

    repo.execute(ChangeWorkspaceOwner::new(workspace_name("user"), None))
        .await
        .unwrap();
    assert_eq!(repo.workspace("user").await.unwrap().workspace_owner, None);
}

#[tokio::test]
async fn delete_removes_workspace_and_its_content_stream() {
    let repo = live_with_user().await;

    repo.execute(DeleteWorkspace::new(workspace_name("user")))
        .await
        .unwrap();

    assert!(repo.workspace("user").await.is_none());
    let stream = repo
        .workspaces()
        .content_stream_handler()
        .repository()
        .find(&content_stream_id("user-cs"))
        .await
        .unwrap()
        .unwrap();
    assert!(stream.is_removed);

    let err = repo
        .execute(DeleteWorkspace::new(workspace_name("user")))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::WorkspaceDoesNotExist(_)));
}

#[tokio::test]
async fn change_base_moves_an_empty_workspace() {
    let repo = live_with_user().await;
    repo.create_workspace("review", "live").await.unwrap();
    repo.create_node("review", "n1").await.unwrap();

    repo.execute(
        ChangeBaseWorkspace::new(workspace_name("user"), workspace_name("review"))
            .with_new_content_stream_id(content_stream_id("user-cs-2")),
    )
    .await
    .unwrap();

    let user = repo.workspace("user").await.unwrap();
    assert_eq!(user.base_workspace_name, Some(workspace_name("review")));
    assert_eq!(user.current_content_stream_id, content_stream_id("user-cs-2"));
    assert_eq!(user.status, WorkspaceStatus::UpToDate);
    assert_eq!(repo.graph("user").await.node_ids(), vec!["n1"]);
}

#[tokio::test]
async fn change_base_rejects_workspaces_with_changes() {
    let repo = live_with_user().await;
    repo.create_workspace("review", "live").await.unwrap();
    repo.create_node("user", "n1").await.unwrap();

    let err = repo
        .execute(ChangeBaseWorkspace::new(
            workspace_name("user"),
            workspace_name("review"),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkspaceError::WorkspaceIsNotEmpty(_)));
    let user = repo.workspace("user").await.unwrap();
    assert_eq!(user.base_workspace_name, Some(workspace_name("live")));
}

#[tokio::test]
async fn change_base_rejects_itself_as_base() {
    let repo = live_with_user().await;

    let err = repo
        .execute(ChangeBaseWorkspace::new(
            workspace_name("user"),
            workspace_name("user"),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkspaceError::BaseWorkspaceEqualsWorkspace(_)));
}

#[tokio::test]
async fn change_base_rejects_a_missing_base() {
    let repo = live_with_user().await;

    let err = repo
        .execute(ChangeBaseWorkspace::new(
            workspace_name("user"),
            workspace_name("staging"),
        ))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkspaceError::BaseWorkspaceDoesNotExist { ref base, .. } if base == &workspace_name("staging")
    ));
}

#[tokio::test]
async fn change_base_rejects_cycles() {
    let repo = TestContentRepository::new();
    repo.create_live().await.unwrap();
    repo.create_workspace("review", "live").await.unwrap();
    repo.create_workspace("user", "review").await.unwrap();

    let err = repo
        .execute(ChangeBaseWorkspace::new(
            workspace_name("review"),
            workspace_name("user"),
        ))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkspaceError::CircularRelationBetweenWorkspaces { ref workspace, ref base }
            if workspace == &workspace_name("review") && base == &workspace_name("user")
    ));
    assert_eq!(
        repo.workspace("review").await.unwrap().base_workspace_name,
        Some(workspace_name("live"))
    );
}
