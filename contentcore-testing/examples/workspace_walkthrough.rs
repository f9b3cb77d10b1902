//! Walks two editors through the workspace lifecycle on the in-memory backend.
//!
//! Run with `RUST_LOG=contentcore=debug` to see every step the handlers take.

use contentcore::config::ContentRepositoryConfig;
use contentcore::workspace::{
    DiscardWorkspace, PublishIndividualNodesFromWorkspace, PublishWorkspace,
};
use contentcore_testing::{address, workspace_name, TestContentRepository};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let repo = TestContentRepository::with_config(ContentRepositoryConfig::from_env()?);
    repo.create_live().await?;
    repo.create_workspace("alice", "live").await?;
    repo.create_workspace("bob", "live").await?;

    info!("Alice drafts a page and publishes it");
    repo.create_node("alice", "home").await?;
    repo.set_property("alice", "home", "title", "Welcome").await?;
    repo.execute(PublishWorkspace::new(workspace_name("alice"))).await?;

    let bob = repo.workspace("bob").await.ok_or("bob vanished")?;
    info!(status = ?bob.status, "Bob's workspace after Alice published");

    info!("Bob edits in parallel, rebases and publishes");
    repo.create_node("bob", "about").await?;
    let outcome = repo.rebase("bob").await?;
    info!(
        rebased = outcome.is_rebased(),
        applied = outcome.statistics().applied_count(),
        "Rebase finished"
    );
    repo.execute(PublishWorkspace::new(workspace_name("bob"))).await?;

    info!("Alice publishes one of two drafts and throws the other away");
    repo.rebase("alice").await?;
    repo.create_node("alice", "news").await?;
    repo.create_node("alice", "scratch").await?;
    repo.execute(PublishIndividualNodesFromWorkspace::new(
        workspace_name("alice"),
        vec![address("news")],
    ))
    .await?;
    repo.execute(DiscardWorkspace::new(workspace_name("alice"))).await?;

    let live = repo.graph("live").await;
    info!(nodes = ?live.node_ids(), "Live workspace");
    Ok(())
}
