//! # parley-store
//!
//! Durable storage for Parley conversations, prompts and settings.
//!
//! Everything lives in a single JSON document that is read fully into memory
//! when the store is opened and rewritten in full on every mutation. The
//! crate exposes a synchronous [`DocumentStore`] handle with typed helpers
//! for each collection; callers that share it across tasks wrap it in a lock.

pub mod chats;
pub mod document;
pub mod prompts;
pub mod settings;

mod error;

pub use document::{Document, DocumentStore};
pub use error::{Result, StoreError};
pub use parley_shared::types::*;
