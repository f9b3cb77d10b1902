//! Testing support for `ContentCore`
//!
//! - [`fixture`]: a small node-editing domain with commands, events and a
//!   mutation command handler that records command envelopes.
//! - [`harness`]: [`TestContentRepository`], everything wired together in memory.
//! - [`contract`]: the behavioural contract for `EventStore` backends.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod contract;
pub mod fixture;
pub mod harness;

pub use harness::{address, content_stream_id, node, workspace_name, TestContentRepository};
