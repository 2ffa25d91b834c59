use thiserror::Error;

use crate::google::api::{ApiError, CalendarEntry, GoogleCalendarClient};
use crate::google::auth::{load_registration, AuthError, Authorizer, GoogleAuthenticator, SCOPES};
use crate::storage::config::Config;
use crate::storage::token_cache::{Credential, StorageError, TokenStorage};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),
    #[error("API error: {0}")]
    ApiError(#[from] ApiError),
    #[error("Token cache error: {0}")]
    StorageError(#[from] StorageError),
}

/// Owns the single credential of a run and issues calendar calls with it.
pub struct SessionManager<A: Authorizer = GoogleAuthenticator> {
    config: Config,
    authorizer: A,
    storage: TokenStorage,
    credential: Credential,
}

impl SessionManager<GoogleAuthenticator> {
    /// Fails with `AuthError::RegistrationMissing` before any network traffic
    /// when the client registration file does not exist.
    pub async fn connect(config: Config) -> Result<Self, SessionError> {
        let secret = load_registration(&config.google.client_secret)?;
        Self::with_authorizer(config, GoogleAuthenticator::new(secret)).await
    }
}

impl<A: Authorizer> SessionManager<A> {
    pub async fn with_authorizer(config: Config, authorizer: A) -> Result<Self, SessionError> {
        let storage = TokenStorage::new(config.google.token_cache.clone());

        let credential = match load_cached(&storage) {
            Some(credential) if credential.is_valid() => {
                tracing::info!("Using cached credential from {}", storage.path().display());
                credential
            }
            Some(credential) if credential.is_expired() && credential.can_refresh() => {
                let refreshed = authorizer.refresh(&credential).await?;
                storage.save_token(&refreshed)?;
                refreshed
            }
            _ => {
                tracing::info!("No usable cached credential, starting interactive authorization");
                let fresh = authorizer.authorize_interactively().await?;
                storage.save_token(&fresh)?;
                fresh
            }
        };

        Ok(Self {
            config,
            authorizer,
            storage,
            credential,
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    async fn ensure_fresh(&mut self) -> Result<(), SessionError> {
        if !self.credential.is_expired() {
            return Ok(());
        }
        if !self.credential.can_refresh() {
            return Err(AuthError::TokenExpired.into());
        }

        let refreshed = self.authorizer.refresh(&self.credential).await?;
        self.storage.save_token(&refreshed)?;
        self.credential = refreshed;
        Ok(())
    }

    pub async fn try_list_calendars(&mut self) -> Result<Vec<CalendarEntry>, SessionError> {
        self.ensure_fresh().await?;

        let client = GoogleCalendarClient::new(self.credential.access_token.clone())
            .with_base_url(self.config.google.calendar_api.clone());

        Ok(client.list_calendars().await?)
    }

    /// Any failure is logged and reported as an empty list.
    pub async fn list_calendars(&mut self) -> Vec<CalendarEntry> {
        match self.try_list_calendars().await {
            Ok(calendars) => calendars,
            Err(e) => {
                tracing::error!("Failed to list calendars: {}", e);
                Vec::new()
            }
        }
    }
}

fn load_cached(storage: &TokenStorage) -> Option<Credential> {
    if !storage.exists() {
        return None;
    }

    match storage.load_token() {
        Ok(credential) => {
            if !credential.scopes.is_empty() && !credential.covers(SCOPES) {
                tracing::warn!(
                    "Cached credential lacks some requested scopes; delete {} to authorize again",
                    storage.path().display()
                );
            }
            Some(credential)
        }
        Err(e) => {
            tracing::warn!("Ignoring unreadable token cache {}: {}", storage.path().display(), e);
            None
        }
    }
}
