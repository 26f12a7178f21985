//! Sequence allocation
//!
//! Responsibilities:
//! - Keep one durable counter row per series in the relational datastore.
//! - Hand out unique, monotonically increasing values under concurrent callers
//!   by serializing on a row-level exclusive lock.
//! - Retry lost lock races and transient outages with bounded backoff.
//! - Render values as `PREFIX-NNN` identifiers.
//!
//! Gaps are allowed: a committed value the caller never uses is skipped.
pub mod allocator;
pub mod config;
pub mod entities;
pub mod error;
pub mod factory;
pub mod identifier;
pub mod retry;

pub use allocator::SequenceAllocator;
pub use error::SeqError;
pub use identifier::{AllocatedIdentifier, IdentifierFormat};
pub use retry::RetryPolicy;

/// Series used for team registration identifiers.
pub const TEAM_SERIES: &str = "team_registration";

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
