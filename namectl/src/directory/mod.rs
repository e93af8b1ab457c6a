//! The external user directory the service assigns usernames in.
//!
//! The directory is the source of truth for which usernames are taken. Lookups
//! against it are network bound, which is why the snapshot cache exists; the
//! cache is rebuilt from [`Directory::copy_to_data_source`].
//!
//! Concrete clients (LDAP, SCIM, ...) live outside this crate and implement
//! [`Directory`]. [`InMemoryDirectory`] is the reference implementation used by
//! tests and embedders.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::data::DataSource;
use crate::errors::{Error, Result};
use crate::types::{
    FIRST_NAME, LAST_NAME, MAX_NAME_LENGTH, MAX_PASSWORD_LENGTH, MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH, PASSWORD,
    USERNAME, UserData,
};

pub mod in_memory;

pub use in_memory::{EnumerationGate, InMemoryDirectory};

/// Account creation request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub password: String,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("firstname", &self.firstname)
            .field("lastname", &self.lastname)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        firstname: impl Into<String>,
        lastname: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            firstname: firstname.into(),
            lastname: lastname.into(),
            password: password.into(),
        }
    }

    /// Build from a field map carrying `username`, `firstname`, `lastname` and `password`.
    pub fn from_user_data(user_data: &UserData) -> Result<Self> {
        let field = |key: &str| {
            user_data.get(key).cloned().ok_or_else(|| Error::Validation {
                message: format!("User data must contain the {key} field"),
            })
        };
        Ok(Self {
            username: field(USERNAME)?,
            firstname: field(FIRST_NAME)?,
            lastname: field(LAST_NAME)?,
            password: field(PASSWORD)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            (USERNAME, &self.username),
            (FIRST_NAME, &self.firstname),
            (LAST_NAME, &self.lastname),
            (PASSWORD, &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Validation {
                    message: format!("{field} must not be empty"),
                });
            }
        }

        if self.username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(Error::Validation {
                message: format!("{USERNAME} must be at most {MAX_USERNAME_LENGTH} characters"),
            });
        }

        if self.firstname.chars().count() > MAX_NAME_LENGTH || self.lastname.chars().count() > MAX_NAME_LENGTH {
            return Err(Error::Validation {
                message: format!("{FIRST_NAME} and {LAST_NAME} must be at most {MAX_NAME_LENGTH} characters"),
            });
        }

        let password_length = self.password.chars().count();
        if password_length < MIN_PASSWORD_LENGTH {
            return Err(Error::Validation {
                message: format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
            });
        }
        if password_length > MAX_PASSWORD_LENGTH {
            return Err(Error::Validation {
                message: format!("Password must be no more than {MAX_PASSWORD_LENGTH} characters"),
            });
        }

        Ok(())
    }
}

/// Live user directory.
///
/// `exists` answers from the directory itself. Bulk population through the
/// [`DataSource`] insert methods is not how accounts are made, so
/// implementations reject those with `Unsupported` and offer
/// [`create_user`](Directory::create_user) instead.
#[async_trait]
pub trait Directory: DataSource {
    /// Create an account. Fails with `AlreadyExists` if the username is taken.
    async fn create_user(&self, user: &NewUser) -> Result<()>;

    /// Delete an account. Returns whether it existed.
    async fn remove(&self, name: &str) -> Result<bool>;

    /// Enumerate every username, page by page, into `sink`.
    ///
    /// Returns the number of names copied. Used only by the cache refresh.
    async fn copy_to_data_source(&self, sink: &dyn DataSource) -> Result<usize>;

    /// View of this directory as a plain [`DataSource`].
    fn as_data_source(&self) -> &dyn DataSource;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::user_data;

    fn valid() -> NewUser {
        NewUser::new("carlos.alvarez", "Carlos", "Álvarez", "correct horse")
    }

    #[test]
    fn test_valid_user() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_empty_fields_are_rejected() {
        let mut user = valid();
        user.lastname = "  ".into();
        let err = user.validate().unwrap_err();
        assert!(err.to_string().contains(LAST_NAME));
    }

    #[test]
    fn test_length_limits() {
        let mut user = valid();
        user.username = "u".repeat(MAX_USERNAME_LENGTH + 1);
        assert!(matches!(user.validate(), Err(Error::Validation { .. })));

        let mut user = valid();
        user.firstname = "f".repeat(MAX_NAME_LENGTH + 1);
        assert!(matches!(user.validate(), Err(Error::Validation { .. })));

        let mut user = valid();
        user.password = "short".into();
        assert!(matches!(user.validate(), Err(Error::Validation { .. })));

        let mut user = valid();
        user.password = "p".repeat(MAX_PASSWORD_LENGTH + 1);
        assert!(matches!(user.validate(), Err(Error::Validation { .. })));

        let mut user = valid();
        user.password = "p".repeat(MAX_PASSWORD_LENGTH);
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_from_user_data() {
        let data = user_data([
            ("username", "carlos.alvarez"),
            ("firstname", "Carlos"),
            ("lastname", "Álvarez"),
            ("password", "correct horse"),
            ("department", "ignored"),
        ]);
        assert_eq!(NewUser::from_user_data(&data).unwrap(), valid());

        let data = user_data([("username", "carlos.alvarez"), ("firstname", "Carlos")]);
        let err = NewUser::from_user_data(&data).unwrap_err();
        assert!(err.to_string().contains(LAST_NAME));
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", valid());
        assert!(rendered.contains("carlos.alvarez"));
        assert!(!rendered.contains("correct horse"));
    }
}
