//! In-memory adapters for `ContentCore`
//!
//! This crate provides an in-memory implementation of the `EventStore` trait
//! and a workspace projection over it, useful for testing and development
//! scenarios where persistence is not required.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

mod event_store;
mod workspace_projection;

pub use event_store::InMemoryEventStore;
pub use workspace_projection::InMemoryWorkspaceProjection;
