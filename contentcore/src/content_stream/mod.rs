//! Content streams: independent, append-only event sequences.
//!
//! A content stream is created empty or forked from the tip of another one,
//! and is removed by appending a tombstone. Its version is the number of its
//! committed events minus one; a stream without events does not exist.

pub mod command_handler;
pub mod commands;
pub mod events;
pub mod repository;

pub use command_handler::ContentStreamCommandHandler;
pub use commands::{CreateContentStream, ForkContentStream, RemoveContentStream};
pub use events::{ContentStreamWasCreated, ContentStreamWasForked, ContentStreamWasRemoved};
pub use repository::{ContentStream, ContentStreamRepository};
