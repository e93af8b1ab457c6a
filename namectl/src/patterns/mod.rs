//! Pattern-driven candidate generation.
//!
//! A [`PatternExpander`] turns an ordered list of templates plus a person's
//! fields into a lazy, unbounded, forward-only sequence of candidates.
//!
//! ## Token grammar
//!
//! - `[field]` - the sanitized value of `field`
//! - `[C<N>_field]` - the first `N` characters of the sanitized value
//! - `[#]` - a counter starting at 1, advanced each time it is substituted
//!
//! ## Evaluation order
//!
//! Patterns are evaluated in configured order. A pattern containing `[#]` is
//! re-evaluated (with the next counter value) instead of advancing, so it is
//! the last configured pattern ever reached. Once the list is exhausted the
//! [`DEFAULT_PATTERN`] takes over forever.
//!
//! A pattern that references a field the person doesn't have, or that
//! substitutes to an empty string, is skipped and the next pattern is tried.
//!
//! ```
//! use namectl::patterns::PatternExpander;
//! use namectl::types::user_data;
//!
//! let patterns = vec!["[firstname].[lastname]".to_string()];
//! let data = user_data([("firstname", "Carlos"), ("lastname", "Álvarez")]);
//!
//! let candidates: Vec<String> = PatternExpander::new(&patterns, &data).unwrap().take(3).collect();
//! assert_eq!(candidates, vec!["carlos.alvarez", "carlosalvarez1", "carlosalvarez2"]);
//! ```

mod template;

use std::collections::HashMap;

use tracing::{debug, error, warn};

use crate::config::DEFAULT_PATTERN;
use crate::errors::Result;
use crate::types::{FIRST_NAME, LAST_NAME, MAX_USERNAME_LENGTH, UserData, sanitize, validate_user_data};
use template::{RenderError, Template};

/// First character in the literal text of `pattern` that can't appear in a username.
pub(crate) fn invalid_literal_char(pattern: &str) -> Option<char> {
    Template::parse(pattern).invalid_literal_char()
}

/// Which template the cursor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Configured(usize),
    Default,
}

/// Infinite, non-restartable candidate sequence for one person.
#[derive(Debug)]
pub struct PatternExpander {
    templates: Vec<Template>,
    default: Template,
    fields: HashMap<String, String>,
    display_name: String,
    next_index: usize,
    /// Set after a successful counter pattern so it is evaluated again
    repeat: Option<Cursor>,
    counter: u64,
    exhausted: bool,
}

impl PatternExpander {
    /// Fails validation if `firstname`/`lastname` are missing or longer than 60 characters.
    pub fn new(patterns: &[String], user_data: &UserData) -> Result<Self> {
        validate_user_data(user_data)?;

        let fields = user_data.iter().map(|(k, v)| (k.clone(), sanitize(v))).collect();
        let display_name = format!(
            "{} {}",
            user_data.get(FIRST_NAME).map(String::as_str).unwrap_or_default(),
            user_data.get(LAST_NAME).map(String::as_str).unwrap_or_default()
        );

        Ok(Self {
            templates: patterns.iter().map(|p| Template::parse(p)).collect(),
            default: Template::parse(DEFAULT_PATTERN),
            fields,
            display_name,
            next_index: 0,
            repeat: None,
            counter: 1,
            exhausted: false,
        })
    }

    fn advance(&mut self) -> Cursor {
        if self.next_index < self.templates.len() {
            self.next_index += 1;
            Cursor::Configured(self.next_index - 1)
        } else {
            Cursor::Default
        }
    }

    fn template(&self, cursor: Cursor) -> &Template {
        match cursor {
            Cursor::Configured(i) => &self.templates[i],
            Cursor::Default => &self.default,
        }
    }
}

impl Iterator for PatternExpander {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.exhausted {
            return None;
        }

        // Every failed attempt moves past one configured pattern, and the default
        // pattern always renders (both names are required and [#] is never empty),
        // so this bound is never hit with valid input.
        let max_attempts = self.templates.len() + 1;

        for _ in 0..max_attempts {
            let cursor = match self.repeat.take() {
                Some(cursor) => cursor,
                None => self.advance(),
            };

            let template = self.template(cursor);
            let mut counter = self.counter;
            let rendered = template.render(|name| self.fields.get(name).map(String::as_str), &mut counter);

            match rendered {
                Ok(candidate) if !candidate.is_empty() => {
                    let has_counter = template.has_counter;
                    // A configured pattern identical to the default is treated like it
                    let is_default = cursor == Cursor::Default || template.source == DEFAULT_PATTERN;

                    if is_default && candidate.len() > MAX_USERNAME_LENGTH {
                        warn!(
                            candidate_length = candidate.len(),
                            "Username suggestion exceeded the maximum length, no more suggestions"
                        );
                        self.exhausted = true;
                        return None;
                    }

                    self.counter = counter;
                    if has_counter {
                        self.repeat = Some(cursor);
                    }
                    return Some(candidate);
                }
                Ok(_) => {
                    debug!(pattern = %template.source, "Pattern produced an empty username, skipping");
                }
                Err(RenderError::MissingField(field)) => {
                    warn!(
                        pattern = %template.source,
                        "Field {} was not provided for user {}, skipping pattern", field, self.display_name
                    );
                }
            }
        }

        error!(attempts = max_attempts, "No pattern produced a username");
        self.exhausted = true;
        None
    }
}
