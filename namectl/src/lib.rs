//! # namectl: Username Suggestion Engine
//!
//! `namectl` assigns unique, human-readable account names built from a person's
//! name fields. A suggestion never collides with a name that already exists in
//! the user directory, with a name currently offered to another caller, or with
//! a name produced earlier in the same request.
//!
//! ## Overview
//!
//! Directory lookups are network bound, so the service can keep a local snapshot
//! of every username in the directory, rebuilt in the background and swapped in
//! atomically. Until the first snapshot is ready, lookups go to the directory
//! itself.
//!
//! ### Core Components
//!
//! - [`patterns::PatternExpander`]: turns configured templates such as
//!   `[firstname].[lastname]` or `[C1_firstname][lastname][#]` into a lazy,
//!   unbounded sequence of sanitized candidates
//! - [`data::ReservationStore`]: time-bounded claims on offered candidates, so
//!   two concurrent callers are never offered the same name
//! - [`data::UsernameCache`]: the double-buffered directory snapshot and its
//!   refresh scheduler
//! - [`suggestor::Suggestor`]: the check-then-reserve walk over the candidate
//!   sequence, serialized process-wide
//! - [`manager::UsernameManager`]: the facade a transport layer calls
//!
//! The external directory is abstracted behind [`directory::Directory`];
//! [`directory::InMemoryDirectory`] is an in-process implementation.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use namectl::{Config, Context, UsernameManager};
//! use namectl::directory::InMemoryDirectory;
//! use namectl::types::user_data;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), namectl::errors::Error> {
//! let directory = Arc::new(InMemoryDirectory::with_usernames(["carlos.alvarez"]));
//! let mut config = Config::default();
//! config.suggestions.patterns = vec!["[firstname].[lastname]".into(), "[C1_firstname][lastname]".into()];
//!
//! let context = Arc::new(Context::new(config, directory)?);
//! let manager = UsernameManager::new(context);
//!
//! let person = user_data([("firstname", "Carlos"), ("lastname", "Álvarez")]);
//! let suggestions = manager.suggest(&person).await?;
//! assert_eq!(suggestions, vec!["calvarez", "carlosalvarez1", "carlosalvarez2"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See [`config`] for the YAML layout and `NAMECTL_` environment overrides.
//! Logging goes through `tracing`; [`telemetry::init_telemetry`] installs a
//! console subscriber filtered by `RUST_LOG`.

pub mod config;
pub mod context;
pub mod data;
pub mod directory;
pub mod errors;
pub mod manager;
pub mod patterns;
pub mod suggestor;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Config;
pub use context::Context;
pub use errors::{Error, Outcome, Result};
pub use manager::{SelectRequest, UsernameManager};
pub use suggestor::Suggestor;

#[cfg(test)]
mod test;
