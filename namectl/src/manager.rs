//! Caller-facing facade: suggest, create and select.
//!
//! Each operation has an `*_outcome` twin that folds the result into an
//! [`Outcome`], so a transport layer can hand back a structured body that
//! tells failure kinds apart from payloads without matching on [`Error`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::context::Context;
use crate::data::DataSource;
use crate::directory::NewUser;
use crate::errors::{Error, Outcome, Result};
use crate::suggestor::Suggestor;
use crate::types::{SUGGESTIONS, USERNAME, UserData};

/// A caller's pick among the suggestions it was offered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectRequest {
    pub username: String,
    pub suggestions: Vec<String>,
}

impl SelectRequest {
    pub fn new(username: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self {
            username: username.into(),
            suggestions,
        }
    }

    /// Build from suggestions that arrive as a JSON array string, e.g. `["a","b"]`.
    pub fn from_json_suggestions(username: impl Into<String>, suggestions: &str) -> Result<Self> {
        let suggestions: Vec<String> = serde_json::from_str(suggestions).map_err(|e| Error::Validation {
            message: format!("{SUGGESTIONS} must be a JSON array of strings: {e}"),
        })?;
        Ok(Self::new(username, suggestions))
    }

    /// Build from a field map carrying `username` and a JSON `suggestions` array.
    pub fn from_user_data(user_data: &UserData) -> Result<Self> {
        let (Some(username), Some(suggestions)) = (user_data.get(USERNAME), user_data.get(SUGGESTIONS)) else {
            return Err(Error::Validation {
                message: format!("Selection must contain the {USERNAME} and {SUGGESTIONS} fields"),
            });
        };
        Self::from_json_suggestions(username.clone(), suggestions)
    }
}

pub struct UsernameManager {
    context: Arc<Context>,
    suggestor: Suggestor,
}

impl UsernameManager {
    pub fn new(context: Arc<Context>) -> Self {
        let suggestor = Suggestor::new(context.clone());
        Self { context, suggestor }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn suggestor(&self) -> &Suggestor {
        &self.suggestor
    }

    /// Available usernames for the person described by `user_data`, each
    /// reserved for this caller.
    pub async fn suggest(&self, user_data: &UserData) -> Result<Vec<String>> {
        self.suggestor.generate(user_data).await
    }

    /// Create the account in the directory.
    ///
    /// The cache learns about the name immediately instead of at the next
    /// refresh, and the name's reservation is released since it now exists.
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    pub async fn create(&self, user: &NewUser) -> Result<()> {
        user.validate()?;
        self.context.directory().create_user(user).await?;

        if let Some(cache) = self.context.cache() {
            // The account exists regardless; the next refresh picks it up
            if let Err(e) = cache.insert(&user.username).await {
                warn!(error = %e, "Could not record created account in the username cache");
            }
        }

        self.suggestor.release(&user.username);
        info!("Created account");
        Ok(())
    }

    /// [`create`](Self::create) from a field map.
    pub async fn create_from_user_data(&self, user_data: &UserData) -> Result<()> {
        let user = NewUser::from_user_data(user_data)?;
        self.create(&user).await
    }

    /// Release every offered suggestion except the chosen one.
    pub fn select(&self, request: &SelectRequest) -> Result<()> {
        self.suggestor.select(&request.suggestions, &request.username)
    }

    pub async fn suggest_outcome(&self, user_data: &UserData) -> Outcome<Vec<String>> {
        self.suggest(user_data).await.into()
    }

    pub async fn create_outcome(&self, user: &NewUser) -> Outcome<()> {
        self.create(user).await.into()
    }

    pub fn select_outcome(&self, request: &SelectRequest) -> Outcome<()> {
        self.select(request).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::errors::ErrorKind;
    use crate::test_utils::{carlos, test_config, test_manager};
    use crate::types::user_data;

    #[test]
    fn test_select_request_from_json() {
        let request = SelectRequest::from_json_suggestions("b", r#"["a","b","c"]"#).unwrap();
        assert_eq!(request, SelectRequest::new("b", vec!["a".into(), "b".into(), "c".into()]));

        let err = SelectRequest::from_json_suggestions("b", "a,b,c").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_select_request_from_user_data() {
        let data = user_data([("username", "b"), ("suggestions", r#"["a","b"]"#)]);
        let request = SelectRequest::from_user_data(&data).unwrap();
        assert_eq!(request.suggestions, vec!["a", "b"]);

        let data = user_data([("username", "b")]);
        assert!(matches!(SelectRequest::from_user_data(&data), Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn test_create_releases_reservation() {
        let directory = Arc::new(InMemoryDirectory::new());
        let manager = test_manager(test_config(), directory.clone());
        let suggestions = manager.suggest(&carlos()).await.unwrap();
        manager.select(&SelectRequest::new(&suggestions[0], suggestions.clone())).unwrap();
        assert_eq!(manager.suggestor().reservations().len(), 1);

        manager
            .create(&NewUser::new(&suggestions[0], "Carlos", "Álvarez", "password123"))
            .await
            .unwrap();

        assert!(manager.suggestor().reservations().is_empty());
        assert!(directory.exists(&suggestions[0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_user() {
        let directory = Arc::new(InMemoryDirectory::new());
        let manager = test_manager(test_config(), directory.clone());

        let result = manager.create(&NewUser::new("carlos", "Carlos", "Álvarez", "short")).await;

        assert!(matches!(result, Err(Error::Validation { .. })));
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn test_outcomes() {
        let directory = Arc::new(InMemoryDirectory::with_usernames(["taken"]));
        let manager = test_manager(test_config(), directory);

        match manager.suggest_outcome(&carlos()).await {
            Outcome::Ok { payload } => assert_eq!(payload.len(), 3),
            Outcome::Error { error } => panic!("unexpected failure: {error:?}"),
        }

        match manager.suggest_outcome(&user_data([("lastname", "Álvarez")])).await {
            Outcome::Error { error } => assert_eq!(error.kind, ErrorKind::Validation),
            Outcome::Ok { .. } => panic!("expected a validation failure"),
        }

        let created = manager
            .create_outcome(&NewUser::new("taken", "Some", "One", "password123"))
            .await;
        assert!(matches!(created, Outcome::Error { error } if error.kind == ErrorKind::AlreadyExists));

        let selected = manager.select_outcome(&SelectRequest::new("", vec![]));
        assert!(matches!(selected, Outcome::Error { error } if error.kind == ErrorKind::Validation));
    }
}
