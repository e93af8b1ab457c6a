//! Test utilities for integration testing (available with `test-utils` feature).

use std::sync::Arc;

use crate::config::Config;
use crate::context::Context;
use crate::directory::InMemoryDirectory;
use crate::manager::UsernameManager;
use crate::suggestor::Suggestor;
use crate::types::{UserData, user_data};

/// Patterns used by most tests: three distinct shapes, then the default.
pub const TEST_PATTERNS: [&str; 3] = ["[firstname].[lastname]", "[firstname][lastname]", "[C1_firstname].[lastname]"];

/// Three suggestions per request, cache disabled.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.suggestions.patterns = TEST_PATTERNS.iter().map(|p| p.to_string()).collect();
    config.suggestions.count = 3;
    config
}

/// [`test_config`] with the snapshot cache enabled and no initial delay.
pub fn cached_config() -> Config {
    let mut config = test_config();
    config.cache.enabled = true;
    config
}

pub fn carlos() -> UserData {
    user_data([("firstname", "Carlos"), ("lastname", "Álvarez")])
}

pub fn test_context(config: Config, directory: Arc<InMemoryDirectory>) -> Arc<Context> {
    Arc::new(Context::new(config, directory).expect("Failed to create test context"))
}

pub fn test_suggestor(config: Config, directory: Arc<InMemoryDirectory>) -> Suggestor {
    Suggestor::new(test_context(config, directory))
}

pub fn test_manager(config: Config, directory: Arc<InMemoryDirectory>) -> UsernameManager {
    UsernameManager::new(test_context(config, directory))
}
