//! Publishing and discarding the changes of individual nodes.

use contentcore::command::CommandHandler;
use contentcore::errors::{CapabilityError, WorkspaceError};
use contentcore::workspace::{
    DiscardIndividualNodesFromWorkspace, PublishIndividualNodesFromWorkspace, PublishWorkspace,
    WorkspaceStatus,
};
use contentcore_testing::fixture::TagContentStream;
use contentcore_testing::{address, content_stream_id, workspace_name, TestContentRepository};

/// `user` on `live` with commands [create n1, create n2, set n1.title].
async fn user_with_two_nodes() -> TestContentRepository {
    let repo = TestContentRepository::new();
    repo.create_live().await.unwrap();
    repo.create_workspace("user", "live").await.unwrap();
    repo.create_node("user", "n1").await.unwrap();
    repo.create_node("user", "n2").await.unwrap();
    repo.set_property("user", "n1", "title", "Hello").await.unwrap();
    repo.mutations().clear_applied_commands();
    repo
}

fn replayed(repo: &TestContentRepository) -> Vec<(String, String)> {
    repo.mutations()
        .applied_commands()
        .iter()
        .map(|envelope| {
            (
                envelope.kind.to_string(),
                envelope.payload["contentStreamId"]
                    .as_str()
                    .unwrap_or_default()
                    .to_owned(),
            )
        })
        .collect()
}

fn pair(kind: &str, stream: &str) -> (String, String) {
    (kind.to_owned(), stream.to_owned())
}

#[tokio::test]
async fn partial_publish_moves_only_the_selected_nodes() {
    let repo = user_with_two_nodes().await;

    repo.execute(
        PublishIndividualNodesFromWorkspace::new(workspace_name("user"), vec![address("n1")])
            .with_content_stream_ids(content_stream_id("matching"), content_stream_id("remaining")),
    )
    .await
    .unwrap();

    assert_eq!(
        replayed(&repo),
        vec![
            pair("CreateNode", "matching"),
            pair("SetNodeProperty", "matching"),
            pair("CreateNode", "remaining"),
        ]
    );

    let live = repo.graph("live").await;
    assert_eq!(live.node_ids(), vec!["n1"]);
    assert_eq!(live.property(&address("n1"), "title"), Some("Hello"));

    let user = repo.workspace("user").await.unwrap();
    assert_eq!(user.current_content_stream_id, content_stream_id("remaining"));
    assert_eq!(user.status, WorkspaceStatus::UpToDate);
    assert_eq!(repo.graph("user").await.node_ids(), vec!["n1", "n2"]);
}

#[tokio::test]
async fn remaining_changes_publish_right_after_a_partial_publish() {
    let repo = TestContentRepository::new();
    repo.create_live().await.unwrap();
    repo.create_workspace("other", "live").await.unwrap();
    repo.create_node("other", "n9").await.unwrap();
    repo.execute(PublishWorkspace::new(workspace_name("other")))
        .await
        .unwrap();
    repo.create_workspace("user", "live").await.unwrap();
    repo.create_node("user", "n1").await.unwrap();
    repo.create_node("user", "n2").await.unwrap();
    repo.set_property("user", "n1", "title", "Hello").await.unwrap();

    repo.execute(PublishIndividualNodesFromWorkspace::new(
        workspace_name("user"),
        vec![address("n1")],
    ))
    .await
    .unwrap();
    assert_eq!(
        repo.workspace("user").await.unwrap().status,
        WorkspaceStatus::UpToDate
    );

    repo.execute(PublishWorkspace::new(workspace_name("user")))
        .await
        .unwrap();

    let live = repo.graph("live").await;
    assert_eq!(live.node_ids(), vec!["n1", "n2", "n9"]);
    assert_eq!(live.property(&address("n1"), "title"), Some("Hello"));
}

#[tokio::test]
async fn remaining_changes_need_a_rebase_once_the_base_moves_again() {
    let repo = user_with_two_nodes().await;
    repo.execute(PublishIndividualNodesFromWorkspace::new(
        workspace_name("user"),
        vec![address("n1")],
    ))
    .await
    .unwrap();
    repo.create_workspace("other", "live").await.unwrap();
    repo.create_node("other", "n9").await.unwrap();
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

    let outcome = repo.rebase("user").await.unwrap();
    assert!(outcome.is_rebased());
    repo.execute(PublishWorkspace::new(workspace_name("user")))
        .await
        .unwrap();
    assert_eq!(repo.graph("live").await.node_ids(), vec!["n1", "n2", "n9"]);
}

#[tokio::test]
async fn partial_publish_onto_a_moved_base_is_replayed_on_its_tip() {
    let repo = user_with_two_nodes().await;
    repo.create_workspace("other", "live").await.unwrap();
    repo.create_node("other", "n9").await.unwrap();
    repo.execute(PublishWorkspace::new(workspace_name("other")))
        .await
        .unwrap();

    repo.execute(PublishIndividualNodesFromWorkspace::new(
        workspace_name("user"),
        vec![address("n2")],
    ))
    .await
    .unwrap();

    assert_eq!(repo.graph("live").await.node_ids(), vec!["n2", "n9"]);
    assert_eq!(repo.graph("user").await.node_ids(), vec!["n1", "n2", "n9"]);
}

#[tokio::test]
async fn partial_publish_needs_address_matchable_commands() {
    let repo = user_with_two_nodes().await;
    repo.apply(TagContentStream {
        content_stream_id: content_stream_id("user-cs"),
        tag: "reviewed".into(),
    })
    .await
    .unwrap();

    let err = repo
        .execute(PublishIndividualNodesFromWorkspace::new(
            workspace_name("user"),
            vec![address("n1")],
        ))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkspaceError::Capability(CapabilityError::NotAddressMatchable(_))
    ));
    assert!(repo.graph("live").await.node_ids().is_empty());
    assert_eq!(repo.current_stream("user").await, content_stream_id("user-cs"));
}

#[tokio::test]
async fn partial_discard_keeps_only_the_other_nodes() {
    let repo = user_with_two_nodes().await;

    repo.execute(
        DiscardIndividualNodesFromWorkspace::new(workspace_name("user"), vec![address("n1")])
            .with_new_content_stream_id(content_stream_id("kept")),
    )
    .await
    .unwrap();

    assert_eq!(replayed(&repo), vec![pair("CreateNode", "kept")]);
    let user = repo.workspace("user").await.unwrap();
    assert_eq!(user.current_content_stream_id, content_stream_id("kept"));
    assert_eq!(repo.graph("user").await.node_ids(), vec!["n2"]);
    assert!(repo.graph("live").await.node_ids().is_empty());
}

#[tokio::test]
async fn partial_discard_aborts_when_a_kept_command_fails() {
    let repo = user_with_two_nodes().await;
    repo.create_workspace("other", "live").await.unwrap();
    repo.create_node("other", "n2").await.unwrap();
    repo.execute(PublishWorkspace::new(workspace_name("other")))
        .await
        .unwrap();

    let err = repo
        .execute(DiscardIndividualNodesFromWorkspace::new(
            workspace_name("user"),
            vec![address("n1")],
        ))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkspaceError::CommandReplayFailed { index: 0, ref kind, .. } if kind.to_string() == "CreateNode"
    ));
    assert_eq!(repo.current_stream("user").await, content_stream_id("user-cs"));
    assert_eq!(repo.graph("user").await.node_ids(), vec!["n1", "n2"]);
}

#[tokio::test]
async fn discarding_nothing_matching_keeps_every_change() {
    let repo = user_with_two_nodes().await;

    let result = repo
        .workspaces()
        .handle(DiscardIndividualNodesFromWorkspace::new(
            workspace_name("user"),
            vec![address("n7")],
        ))
        .await
        .unwrap();
    result.block_until_projections_up_to_date().await.unwrap();

    assert_eq!(repo.graph("user").await.node_ids(), vec!["n1", "n2"]);
    assert_eq!(
        repo.graph("user").await.property(&address("n1"), "title"),
        Some("Hello")
    );
}
