//! Shared service context.
//!
//! One [`Context`] is built at startup and handed (behind an `Arc`) to the
//! suggestor and manager. It owns the configuration, the live directory, and
//! the snapshot cache with its refresh task.
//!
//! # Shutdown
//!
//! [`shutdown`](Context::shutdown) cancels the refresh task, waits for it, and
//! disposes the cache. Dropping the context without calling it still cancels
//! the task through the drop guard.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::info;

use crate::config::Config;
use crate::data::{DataSource, UsernameCache};
use crate::directory::Directory;
use crate::errors::Result;

pub struct Context {
    config: Config,
    directory: Arc<dyn Directory>,
    cache: Option<Arc<UsernameCache>>,
    shutdown_token: CancellationToken,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    _drop_guard: DropGuard,
}

impl Context {
    /// Validate `config` and build the context.
    ///
    /// When `cache.enabled` is set the refresh scheduler is spawned right
    /// away, so this must run inside a Tokio runtime.
    pub fn new(config: Config, directory: Arc<dyn Directory>) -> Result<Self> {
        config.validate()?;

        let shutdown_token = CancellationToken::new();
        let drop_guard = shutdown_token.clone().drop_guard();

        let (cache, refresh_task) = if config.cache.enabled {
            let cache = Arc::new(UsernameCache::new(directory.clone(), config.cache.clone()));
            let handle = cache.start(shutdown_token.clone());
            (Some(cache), Some(handle))
        } else {
            (None, None)
        };

        info!(
            patterns = config.suggestions.patterns.len(),
            count = config.suggestions.count,
            cache_enabled = config.cache.enabled,
            "Username service context created"
        );

        Ok(Self {
            config,
            directory,
            cache,
            shutdown_token,
            refresh_task: Mutex::new(refresh_task),
            _drop_guard: drop_guard,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    /// The snapshot cache, present only when caching is enabled.
    pub fn cache(&self) -> Option<&Arc<UsernameCache>> {
        self.cache.as_ref()
    }

    /// The source lookups should currently go to: the cache once it can answer,
    /// otherwise the live directory.
    pub fn data_source(&self) -> &dyn DataSource {
        match &self.cache {
            Some(cache) if cache.is_ready() => &**cache,
            _ => self.directory.as_data_source(),
        }
    }

    /// Stop the refresh task and dispose the cache.
    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();

        let handle = self.refresh_task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        if let Some(cache) = &self.cache {
            cache.dispose();
        }
        info!("Username service context shut down");
    }
}
