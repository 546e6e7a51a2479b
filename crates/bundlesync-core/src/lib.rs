//! The bundlesync synchronization pipeline.
//!
//! A [`Synchronizer`](pipeline::Synchronizer) runs one pass of
//! fetch → validate → download-if-stale → load → select for a single
//! [`CacheStore`](cache::CacheStore) slot.

pub mod cache;
pub mod downloader;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod validator;

pub use error::{FailureKind, SyncError};

pub type SyncResult<T> = std::result::Result<T, SyncError>;
