//! Suggestion orchestration.
//!
//! The [`Suggestor`] walks a [`PatternExpander`] and keeps every candidate that
//! is neither reserved nor taken in the current data source, reserving each
//! one as it is accepted.
//!
//! Checking "not reserved and not taken" and then reserving has to be atomic
//! with respect to every other request, otherwise two callers could both pass
//! the check for the same name before either reserves it. `generate` therefore
//! runs inside one process-wide critical section. Throughput is bounded by that
//! section; sharding it per candidate would lift the bound.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::context::Context;
use crate::data::ReservationStore;
use crate::errors::{Error, Result};
use crate::patterns::PatternExpander;
use crate::types::UserData;

pub struct Suggestor {
    context: Arc<Context>,
    reservations: ReservationStore,
    /// Held for the whole check-then-reserve walk of one request
    critical_section: tokio::sync::Mutex<()>,
}

impl Suggestor {
    pub fn new(context: Arc<Context>) -> Self {
        let ttl = context.config().suggestions.reservation_ttl;
        Self {
            context,
            reservations: ReservationStore::new(ttl),
            critical_section: tokio::sync::Mutex::new(()),
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn reservations(&self) -> &ReservationStore {
        &self.reservations
    }

    /// Suggest the configured number of available usernames.
    pub async fn generate(&self, user_data: &UserData) -> Result<Vec<String>> {
        self.generate_n(user_data, self.context.config().suggestions.count).await
    }

    /// Suggest up to `count` available usernames, reserving each of them.
    ///
    /// Fewer than `count` are returned only if the candidate sequence runs out.
    #[instrument(skip(self, user_data), err)]
    pub async fn generate_n(&self, user_data: &UserData, count: usize) -> Result<Vec<String>> {
        let mut candidates = PatternExpander::new(&self.context.config().suggestions.patterns, user_data)?;

        let _section = self.critical_section.lock().await;
        let source = self.context.data_source();
        let mut accepted = Vec::with_capacity(count);

        while accepted.len() < count {
            let Some(candidate) = candidates.next() else {
                warn!(accepted = accepted.len(), count, "Ran out of username candidates");
                break;
            };

            if self.reservations.exists(&candidate) {
                debug!(username = %candidate, "Candidate is reserved, skipping");
                continue;
            }
            if source.exists(&candidate).await? {
                debug!(username = %candidate, "Candidate already exists, skipping");
                continue;
            }

            self.reservations.insert(&candidate)?;
            accepted.push(candidate);
        }

        debug!(suggestions = ?accepted, "Generated username suggestions");
        Ok(accepted)
    }

    /// Release every suggestion except `chosen`.
    ///
    /// `chosen` stays reserved until its account is created or the
    /// reservation expires.
    #[instrument(skip(self, suggestions), fields(suggestion_count = suggestions.len()), err)]
    pub fn select(&self, suggestions: &[String], chosen: &str) -> Result<()> {
        if chosen.trim().is_empty() {
            return Err(Error::Validation {
                message: "The selected username must not be empty".to_string(),
            });
        }

        let released: Vec<&str> = suggestions
            .iter()
            .map(String::as_str)
            .filter(|suggestion| *suggestion != chosen)
            .collect();
        self.reservations.remove_multiple(&released);
        debug!(released = released.len(), "Released unselected suggestions");
        Ok(())
    }

    /// Release the reservation of a name whose account now exists.
    pub fn release(&self, name: &str) -> bool {
        self.reservations.remove(name)
    }
}
