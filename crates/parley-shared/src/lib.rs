//! # parley-shared
//!
//! Types shared by the Parley server and client: the persisted domain model,
//! the JSON bodies exchanged over the REST API, and common constants.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ValidationError;
pub use types::*;
