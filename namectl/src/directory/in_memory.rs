//! In-process [`Directory`] backed by a sorted map.
//!
//! Enumeration is paged like a real directory client would page, and can be
//! made to fail, slow down, or pause half way so callers can observe what the
//! cache serves while a refresh is in flight.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tracing::{debug, instrument};

use super::{Directory, NewUser};
use crate::data::DataSource;
use crate::errors::{Error, Result};

const DEFAULT_PAGE_SIZE: usize = 500;

/// Handle on a one-shot pause in the next enumeration.
///
/// The enumeration stops after its first page has been copied, signals
/// [`paused`](EnumerationGate::paused), and waits for
/// [`release`](EnumerationGate::release).
#[derive(Clone, Default)]
pub struct EnumerationGate {
    reached: Arc<Notify>,
    resume: Arc<Notify>,
}

impl EnumerationGate {
    /// Wait until an enumeration has hit the gate.
    pub async fn paused(&self) {
        self.reached.notified().await;
    }

    /// Let the paused enumeration continue.
    pub fn release(&self) {
        self.resume.notify_one();
    }
}

pub struct InMemoryDirectory {
    users: RwLock<BTreeMap<String, NewUser>>,
    page_size: usize,
    page_delay: Option<Duration>,
    fail_enumeration: Mutex<Option<String>>,
    unavailable: AtomicBool,
    gate: Mutex<Option<EnumerationGate>>,
    enumerations: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: None,
            fail_enumeration: Mutex::new(None),
            unavailable: AtomicBool::new(false),
            gate: Mutex::new(None),
            enumerations: AtomicUsize::new(0),
        }
    }

    /// Directory pre-populated with `usernames` (names are synthesized).
    pub fn with_usernames<I, S>(usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let directory = Self::new();
        {
            let mut users = directory.users.write();
            for username in usernames {
                let username = username.into();
                let user = NewUser::new(username.clone(), "Seeded", "User", "seeded-password");
                users.insert(username, user);
            }
        }
        directory
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sleep this long before each page is copied.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    /// Make the next enumeration fail with `message` before copying anything.
    pub fn fail_next_enumeration(&self, message: impl Into<String>) {
        *self.fail_enumeration.lock() = Some(message.into());
    }

    /// While set, every lookup and mutation fails like a lost connection.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Pause the next enumeration after its first page.
    pub fn pause_next_enumeration(&self) -> EnumerationGate {
        let gate = EnumerationGate::default();
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    /// Number of enumerations started so far.
    pub fn enumeration_count(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Directory(anyhow!("directory connection refused")));
        }
        Ok(())
    }

    fn page_after(&self, last: Option<&str>) -> Vec<String> {
        let users = self.users.read();
        let lower = match last {
            Some(last) => Bound::Excluded(last),
            None => Bound::Unbounded,
        };
        users
            .range::<str, _>((lower, Bound::Unbounded))
            .take(self.page_size)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn unsupported(operation: &str) -> Error {
        Error::Unsupported {
            operation: operation.to_string(),
            source_name: "the live directory".to_string(),
        }
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for InMemoryDirectory {
    async fn exists(&self, name: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.users.read().contains_key(name))
    }

    async fn insert(&self, _name: &str) -> Result<()> {
        Err(Self::unsupported("insert"))
    }

    async fn insert_multiple(&self, _names: &[String]) -> Result<()> {
        Err(Self::unsupported("insert_multiple"))
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    async fn create_user(&self, user: &NewUser) -> Result<()> {
        self.check_available()?;
        user.validate()?;

        let mut users = self.users.write();
        if users.contains_key(&user.username) {
            return Err(Error::AlreadyExists {
                name: user.username.clone(),
            });
        }
        users.insert(user.username.clone(), user.clone());
        debug!("Created directory user");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.users.write().remove(name).is_some())
    }

    #[instrument(skip(self, sink), err)]
    async fn copy_to_data_source(&self, sink: &dyn DataSource) -> Result<usize> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        if let Some(message) = self.fail_enumeration.lock().take() {
            return Err(Error::Directory(anyhow!(message)));
        }
        let gate = self.gate.lock().take();

        let mut copied = 0;
        let mut last: Option<String> = None;
        let mut page_number = 0;

        loop {
            if let Some(delay) = self.page_delay {
                tokio::time::sleep(delay).await;
            }

            let page = self.page_after(last.as_deref());
            if page.is_empty() {
                break;
            }

            sink.insert_multiple(&page).await?;
            copied += page.len();
            page_number += 1;
            debug!(page = page_number, size = page.len(), "Copied directory page");
            last = page.last().cloned();

            if page_number == 1
                && let Some(gate) = &gate
            {
                gate.reached.notify_one();
                gate.resume.notified().await;
            }
        }

        Ok(copied)
    }

    fn as_data_source(&self) -> &dyn DataSource {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SnapshotGeneration;

    #[tokio::test]
    async fn test_create_and_remove() {
        let directory = InMemoryDirectory::new();
        let user = NewUser::new("ada", "Ada", "Lovelace", "analytical");

        directory.create_user(&user).await.unwrap();
        assert!(directory.exists("ada").await.unwrap());

        let err = directory.create_user(&user).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));

        assert!(directory.remove("ada").await.unwrap());
        assert!(!directory.remove("ada").await.unwrap());
        assert!(!directory.exists("ada").await.unwrap());
    }

    #[tokio::test]
    async fn test_bulk_inserts_are_unsupported() {
        let directory = InMemoryDirectory::new();
        assert!(matches!(directory.insert("ada").await, Err(Error::Unsupported { .. })));
        assert!(matches!(
            directory.insert_multiple(&["ada".to_string()]).await,
            Err(Error::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_copy_is_paged_and_complete() {
        let names: Vec<String> = (0..23).map(|i| format!("user{i:02}")).collect();
        let directory = InMemoryDirectory::with_usernames(names.clone()).with_page_size(5);
        let sink = SnapshotGeneration::new();

        let copied = directory.copy_to_data_source(&sink).await.unwrap();

        assert_eq!(copied, 23);
        assert_eq!(sink.len(), 23);
        for name in &names {
            assert!(sink.exists(name).await.unwrap());
        }
        assert_eq!(directory.enumeration_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let directory = InMemoryDirectory::with_usernames(["ada"]);
        directory.fail_next_enumeration("LDAP server went away");

        let err = directory.copy_to_data_source(&SnapshotGeneration::new()).await.unwrap_err();
        assert!(err.to_string().contains("LDAP server went away"));

        let sink = SnapshotGeneration::new();
        assert_eq!(directory.copy_to_data_source(&sink).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_directory_fails_lookups() {
        let directory = InMemoryDirectory::with_usernames(["ada"]);
        directory.set_unavailable(true);
        assert!(matches!(directory.exists("ada").await, Err(Error::Directory(_))));

        directory.set_unavailable(false);
        assert!(directory.exists("ada").await.unwrap());
    }

    #[tokio::test]
    async fn test_gate_pauses_after_first_page() {
        let directory = Arc::new(InMemoryDirectory::with_usernames(["a", "b", "c", "d"]).with_page_size(2));
        let sink = Arc::new(SnapshotGeneration::new());
        let gate = directory.pause_next_enumeration();

        let task = {
            let directory = directory.clone();
            let sink = sink.clone();
            tokio::spawn(async move { directory.copy_to_data_source(&*sink).await })
        };

        gate.paused().await;
        assert_eq!(sink.len(), 2);

        gate.release();
        assert_eq!(task.await.unwrap().unwrap(), 4);
        assert_eq!(sink.len(), 4);
    }
}
