//! Username data sources.
//!
//! [`DataSource`] is the uniform existence/insert contract shared by the live
//! directory and its local snapshot cache, so the suggestor can treat whichever
//! one is currently authoritative the same way.
//!
//! - [`reservations`]: in-memory, time-bounded claims on offered candidates
//! - [`snapshot`]: one immutable-once-published copy of the directory's usernames
//! - [`cache`]: the periodically rebuilt, atomically swapped snapshot cache

use async_trait::async_trait;

use crate::errors::Result;

pub mod cache;
pub mod reservations;
pub mod snapshot;

pub use cache::{CacheStatus, UsernameCache};
pub use reservations::ReservationStore;
pub use snapshot::SnapshotGeneration;

/// Existence and insert contract for username stores.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Whether `name` is already taken.
    ///
    /// # Errors
    /// - `Directory` on transport failure of the live directory
    /// - `CacheNotReady` if a snapshot is read before it was ever populated
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Add a single name.
    ///
    /// # Errors
    /// - `AlreadyExists` if the name is already present
    async fn insert(&self, name: &str) -> Result<()>;

    /// Add a batch of names, failing if any individual insert would fail.
    ///
    /// Implementations document their own partial-failure policy.
    async fn insert_multiple(&self, names: &[String]) -> Result<()>;
}
