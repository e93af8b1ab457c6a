//! Local snapshot of the directory's usernames.
//!
//! The cache holds at most one published [`SnapshotGeneration`]. A refresh
//! builds a brand-new generation off to the side by enumerating the whole
//! directory into it, then swaps the pointer in one atomic store. Readers load
//! the pointer without locking and keep whatever generation they loaded alive
//! until they're done with it, so they see either the old or the new set, never
//! a half-copied one.
//!
//! ## Status lifecycle
//!
//! ```text
//! Empty -> Caching -> Ready <-> Refreshing
//!                                         (any) -> Disposed
//! ```
//!
//! A failed refresh goes back to `Ready` if a generation is published, else to
//! `Empty`, and the scheduler keeps running.
//!
//! ## Writes during a refresh
//!
//! Accounts created while no generation exists are buffered and replayed into
//! the first generation. Accounts created while a refresh is in flight go into
//! the current generation *and* the buffer, so the in-flight generation (whose
//! enumeration may already have passed that name) picks them up before it is
//! published. The buffer lock is held across "check generation and buffer" on
//! the write side and "replay and publish" on the refresh side.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::{DataSource, SnapshotGeneration};
use crate::config::CacheConfig;
use crate::directory::Directory;
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Nothing cached yet
    Empty,
    /// First generation being built
    Caching,
    Ready,
    /// Replacement generation being built, the current one is still served
    Refreshing,
    /// Terminal
    Disposed,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CacheStatus::Empty => "empty",
            CacheStatus::Caching => "caching",
            CacheStatus::Ready => "ready",
            CacheStatus::Refreshing => "refreshing",
            CacheStatus::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Double-buffered snapshot of the directory's username set.
pub struct UsernameCache {
    directory: Arc<dyn Directory>,
    config: CacheConfig,
    current: ArcSwapOption<SnapshotGeneration>,
    status: Mutex<CacheStatus>,
    pending: Mutex<Vec<String>>,
    /// Serializes refreshes, whether scheduled or triggered by hand
    refresh_lock: tokio::sync::Mutex<()>,
}

impl UsernameCache {
    pub fn new(directory: Arc<dyn Directory>, config: CacheConfig) -> Self {
        Self {
            directory,
            config,
            current: ArcSwapOption::empty(),
            status: Mutex::new(CacheStatus::Empty),
            pending: Mutex::new(Vec::new()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn status(&self) -> CacheStatus {
        *self.status.lock()
    }

    /// Whether lookups can be answered from the cache (`Ready` or `Refreshing`).
    pub fn is_ready(&self) -> bool {
        matches!(self.status(), CacheStatus::Ready | CacheStatus::Refreshing)
    }

    /// Number of names in the published generation, if there is one.
    pub fn generation_size(&self) -> Option<usize> {
        self.current.load().as_ref().map(|generation| generation.len())
    }

    /// Label of the published generation, if there is one.
    pub fn generation_label(&self) -> Option<String> {
        self.current.load().as_ref().map(|generation| generation.label())
    }

    /// Number of writes waiting to be replayed into the next generation.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    fn not_ready(&self) -> Error {
        Error::CacheNotReady {
            status: self.status().to_string(),
        }
    }

    /// Rebuild the cache from the directory and publish the result.
    ///
    /// Returns the number of names in the new generation. On failure or
    /// deadline expiry the published generation (if any) is left untouched.
    #[instrument(skip(self), err)]
    pub async fn refresh(&self) -> Result<usize> {
        let _refreshing = self.refresh_lock.lock().await;

        {
            let mut status = self.status.lock();
            if *status == CacheStatus::Disposed {
                return Err(Error::CacheNotReady {
                    status: (*status).to_string(),
                });
            }
            *status = if self.current.load().is_some() {
                CacheStatus::Refreshing
            } else {
                CacheStatus::Caching
            };
        }

        let generation = Arc::new(SnapshotGeneration::new());
        let started = Instant::now();
        info!(generation = %generation.label(), "Starting username cache refresh");

        let copied = match self.copy_directory(generation.as_ref()).await {
            Ok(copied) => copied,
            Err(e) => {
                error!(error = %e, "Username cache refresh failed, keeping the previous generation");
                let mut status = self.status.lock();
                if *status != CacheStatus::Disposed {
                    *status = if self.current.load().is_some() {
                        CacheStatus::Ready
                    } else {
                        CacheStatus::Empty
                    };
                }
                return Err(e);
            }
        };

        let replayed = {
            let mut pending = self.pending.lock();
            let mut status = self.status.lock();
            if *status == CacheStatus::Disposed {
                return Err(Error::CacheNotReady {
                    status: (*status).to_string(),
                });
            }

            let mut replayed = 0;
            for name in pending.drain(..) {
                if generation.add(&name) {
                    replayed += 1;
                }
            }

            self.current.store(Some(Arc::clone(&generation)));
            *status = CacheStatus::Ready;
            replayed
        };

        let size = generation.len();
        info!(
            generation = %generation.label(),
            copied,
            replayed,
            size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Username cache refresh finished"
        );
        Ok(size)
    }

    async fn copy_directory(&self, generation: &SnapshotGeneration) -> Result<usize> {
        let copy = self.directory.copy_to_data_source(generation);
        match self.config.refresh_timeout {
            Some(limit) => tokio::time::timeout(limit, copy).await.map_err(|_| Error::Timeout {
                operation: "copy the directory into the username cache".to_string(),
                seconds: limit.as_secs(),
            })?,
            None => copy.await,
        }
    }

    /// Spawn the refresh scheduler: wait `initial_delay`, then refresh every
    /// `refresh_interval` until `shutdown` is cancelled.
    pub fn start(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move { cache.run_scheduler(shutdown).await })
    }

    async fn run_scheduler(&self, shutdown: CancellationToken) {
        info!(
            initial_delay = ?self.config.initial_delay,
            refresh_interval = ?self.config.refresh_interval,
            "Starting username cache scheduler"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.config.initial_delay) => {}
            _ = shutdown.cancelled() => {
                info!("Username cache scheduler shutting down");
                return;
            }
        }

        // interval() panics on a zero period
        let mut ticker = tokio::time::interval(self.config.refresh_interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.cancelled() => {
                    info!("Username cache scheduler shutting down");
                    return;
                }
            }

            tokio::select! {
                result = self.refresh() => {
                    if result.is_err() {
                        warn!(next_attempt_in = ?self.config.refresh_interval, "Scheduled username cache refresh did not complete");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Username cache scheduler shutting down during a refresh");
                    return;
                }
            }
        }
    }

    /// Release the published generation. Terminal.
    ///
    /// Readers that already loaded the generation keep it alive until they
    /// finish; new reads fail with `CacheNotReady`.
    pub fn dispose(&self) {
        let mut pending = self.pending.lock();
        let mut status = self.status.lock();
        pending.clear();
        self.current.store(None);
        *status = CacheStatus::Disposed;
        info!("Username cache disposed");
    }

    /// Drop the published generation and the pending buffer, back to `Empty`.
    pub fn reset(&self) {
        let mut pending = self.pending.lock();
        let mut status = self.status.lock();
        pending.clear();
        self.current.store(None);
        *status = CacheStatus::Empty;
        debug!("Username cache reset");
    }
}

#[async_trait]
impl DataSource for UsernameCache {
    async fn exists(&self, name: &str) -> Result<bool> {
        let status = self.status();
        let Some(generation) = self.current.load_full() else {
            return Err(Error::CacheNotReady {
                status: status.to_string(),
            });
        };

        if status == CacheStatus::Refreshing {
            warn!(
                username = %name,
                generation = %generation.label(),
                "Username cache is refreshing, answering from a possibly stale generation"
            );
        }

        Ok(generation.contains(name))
    }

    /// Record a newly created account.
    ///
    /// # Errors
    /// - `AlreadyExists` if the published generation (or the pending buffer,
    ///   when nothing is published) already has the name
    /// - `CacheNotReady` once disposed
    async fn insert(&self, name: &str) -> Result<()> {
        let mut pending = self.pending.lock();
        let status = self.status();
        if status == CacheStatus::Disposed {
            return Err(self.not_ready());
        }

        match self.current.load_full() {
            Some(generation) => {
                if !generation.add(name) {
                    return Err(Error::AlreadyExists { name: name.to_string() });
                }
                if status == CacheStatus::Refreshing {
                    pending.push(name.to_string());
                }
            }
            None => {
                if pending.iter().any(|p| p == name) {
                    return Err(Error::AlreadyExists { name: name.to_string() });
                }
                debug!(username = %name, %status, "No cache generation yet, buffering insert");
                pending.push(name.to_string());
            }
        }
        Ok(())
    }

    async fn insert_multiple(&self, _names: &[String]) -> Result<()> {
        Err(Error::Unsupported {
            operation: "insert_multiple".to_string(),
            source_name: "the username cache".to_string(),
        })
    }
}
