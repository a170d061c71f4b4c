//! # parley-client
//!
//! Client-side data layer for Parley.
//!
//! [`ApiClient`] talks to the REST API. [`ChatQueries`] sits on top of it and
//! caches each server collection under a [`QueryKey`]. Mutations invalidate
//! or patch the affected keys and announce it on a broadcast channel, so
//! views can subscribe and refetch.

pub mod api;
pub mod cache;
pub mod events;
pub mod queries;

mod error;

pub use api::ApiClient;
pub use cache::{CachedData, QueryCache, QueryKey};
pub use error::{ClientError, Result};
pub use events::QueryEvent;
pub use queries::ChatQueries;
