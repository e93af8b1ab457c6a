//! One generation of the directory snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;

use super::DataSource;
use crate::errors::{Error, Result};

/// A set of usernames copied from the directory during one refresh cycle.
///
/// A generation is filled by the refresh task before it is published; after
/// that it only receives single inserts for accounts created through the
/// service.
#[derive(Debug)]
pub struct SnapshotGeneration {
    names: DashSet<String>,
    created_at: DateTime<Utc>,
}

impl SnapshotGeneration {
    pub fn new() -> Self {
        Self {
            names: DashSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Name used in logs to tell generations apart, e.g. `usernames_20240131_021500`.
    pub fn label(&self) -> String {
        format!("usernames_{}", self.created_at.format("%Y%m%d_%H%M%S"))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Insert unless present; returns whether the name was added.
    pub(crate) fn add(&self, name: &str) -> bool {
        self.names.insert(name.to_string())
    }
}

impl Default for SnapshotGeneration {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for SnapshotGeneration {
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.contains(name))
    }

    async fn insert(&self, name: &str) -> Result<()> {
        if self.add(name) {
            Ok(())
        } else {
            Err(Error::AlreadyExists { name: name.to_string() })
        }
    }

    /// All-or-nothing: the batch is checked for duplicates (within itself and
    /// against the generation) before anything is inserted.
    async fn insert_multiple(&self, names: &[String]) -> Result<()> {
        let mut seen = std::collections::HashSet::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(Error::InconsistentState {
                    message: format!("username {name} appears more than once in one batch"),
                });
            }
            if self.contains(name) {
                return Err(Error::AlreadyExists { name: name.clone() });
            }
        }

        for name in names {
            self.names.insert(name.clone());
        }
        Ok(())
    }
}
