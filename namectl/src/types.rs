//! Common type definitions, field keys and length limits.
//!
//! This module defines:
//! - [`UserData`]: the field map a suggestion request is built from
//! - Field key constants shared by patterns, validation and the manager facade
//! - Length limits for usernames, names and passwords
//! - [`sanitize`]: the transliteration applied to every substituted field value
//!
//! # Sanitisation
//!
//! A candidate may only contain lowercase ASCII letters, digits, `_`, `.` and `-`.
//! Field values are lowercased, accents are stripped (Unicode NFD with combining
//! marks dropped), anything outside the allowed set is removed, and the result is
//! truncated to [`MAX_NAME_LENGTH`] characters.
//!
//! ```
//! use namectl::types::sanitize;
//!
//! assert_eq!(sanitize("Álvarez"), "alvarez");
//! assert_eq!(sanitize("O'Brien-Smith"), "obrien-smith");
//! ```

use std::collections::HashMap;

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::errors::{Error, Result};

pub const USERNAME: &str = "username";
pub const FIRST_NAME: &str = "firstname";
pub const LAST_NAME: &str = "lastname";
pub const PASSWORD: &str = "password";
/// JSON array of the suggestions a selection was made from
pub const SUGGESTIONS: &str = "suggestions";

/// Longest username the directory accepts.
pub const MAX_USERNAME_LENGTH: usize = 64;
/// Longest first/last name, and the cap on any sanitized field value.
pub const MAX_NAME_LENGTH: usize = 60;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 100;

/// Field name to value mapping for one person.
///
/// Must contain `firstname` and `lastname`; any other field can be referenced
/// by a pattern token.
pub type UserData = HashMap<String, String>;

/// Build a [`UserData`] map from `(field, value)` pairs.
pub fn user_data<I, K, V>(fields: I) -> UserData
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Check the fields every suggestion request needs.
pub fn validate_user_data(user_data: &UserData) -> Result<()> {
    let (Some(firstname), Some(lastname)) = (user_data.get(FIRST_NAME), user_data.get(LAST_NAME)) else {
        return Err(Error::Validation {
            message: format!("User data must contain at least the {FIRST_NAME} and {LAST_NAME} fields"),
        });
    };

    if firstname.chars().count() > MAX_NAME_LENGTH || lastname.chars().count() > MAX_NAME_LENGTH {
        return Err(Error::Validation {
            message: format!("{FIRST_NAME} and {LAST_NAME} must be at most {MAX_NAME_LENGTH} characters"),
        });
    }

    Ok(())
}

fn is_allowed(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '-')
}

/// Transliterate a field value into candidate-safe characters.
pub fn sanitize(value: &str) -> String {
    value
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| is_allowed(*c))
        .take(MAX_NAME_LENGTH)
        .collect()
}

/// Whether `candidate` only uses the characters a username may contain.
pub fn is_valid_candidate(candidate: &str) -> bool {
    candidate.chars().all(is_allowed)
}
