//! Time-bounded reservations on offered usernames.
//!
//! While a caller is choosing between suggestions, every offered name is held
//! here so no other caller is offered it too. A reservation ends when the caller
//! selects a different name (explicit release) or when it outlives the TTL.
//!
//! Entries are kept in creation order, so expiry only ever looks at the oldest
//! entries and stops at the first one still alive. An index from name to entry
//! key makes explicit removal O(log n).

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::{Error, Result};

/// Ordering key: creation time, then a sequence number for equal instants.
type EntryKey = (Instant, u64);

#[derive(Default)]
struct Entries {
    by_age: BTreeMap<EntryKey, String>,
    by_name: HashMap<String, EntryKey>,
    next_seq: u64,
}

impl Entries {
    fn purge_expired(&mut self, now: Instant, ttl: Duration) {
        while let Some(entry) = self.by_age.first_entry() {
            let (created_at, _) = *entry.key();
            if now.saturating_duration_since(created_at) <= ttl {
                break;
            }
            let name = entry.remove();
            self.by_name.remove(&name);
            debug!(username = %name, "Reservation expired");
        }
    }

    fn remove(&mut self, name: &str) -> bool {
        match self.by_name.remove(name) {
            Some(key) => {
                self.by_age.remove(&key);
                true
            }
            None => false,
        }
    }
}

/// In-memory set of reserved usernames with a time-to-live.
///
/// All operations are mutually exclusive with each other through one
/// fine-grained lock that is never held across an await point.
pub struct ReservationStore {
    entries: Mutex<Entries>,
    ttl: Duration,
}

impl ReservationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether `name` is currently reserved. Expired entries are purged first.
    pub fn exists(&self, name: &str) -> bool {
        let mut entries = self.entries.lock();
        entries.purge_expired(Instant::now(), self.ttl);
        entries.by_name.contains_key(name)
    }

    /// Reserve `name`, stamped with the current time.
    ///
    /// # Errors
    /// - `AlreadyReserved` if a live reservation for `name` exists
    pub fn insert(&self, name: &str) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.purge_expired(now, self.ttl);

        if entries.by_name.contains_key(name) {
            return Err(Error::AlreadyReserved { name: name.to_string() });
        }

        let key = (now, entries.next_seq);
        entries.next_seq += 1;
        entries.by_age.insert(key, name.to_string());
        entries.by_name.insert(name.to_string(), key);
        Ok(())
    }

    /// Reserve several names at once; names already reserved are left untouched.
    pub fn insert_multiple(&self, names: &[String]) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.purge_expired(now, self.ttl);

        for name in names {
            if entries.by_name.contains_key(name) {
                continue;
            }
            let key = (now, entries.next_seq);
            entries.next_seq += 1;
            entries.by_age.insert(key, name.clone());
            entries.by_name.insert(name.clone(), key);
        }
    }

    /// Release `name`. Returns whether a reservation was removed.
    pub fn remove(&self, name: &str) -> bool {
        self.entries.lock().remove(name)
    }

    /// Release every name in `names`; absent names are ignored.
    pub fn remove_multiple<S: AsRef<str>>(&self, names: &[S]) {
        let mut entries = self.entries.lock();
        for name in names {
            entries.remove(name.as_ref());
        }
    }

    /// Number of live reservations.
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        entries.purge_expired(Instant::now(), self.ttl);
        entries.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all reservations.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.by_age.clear();
        entries.by_name.clear();
    }
}
