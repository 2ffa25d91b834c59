use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::storage::{TokenInfo, TokenStorage};
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

use crate::storage::token_cache::Credential;

// Changing this list invalidates cached tokens; delete the token cache and
// authorize again.
pub const SCOPES: &[&str] = &[
    "openid",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/calendar.events",
];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Client registration file not found: {0}")]
    RegistrationMissing(PathBuf),
    #[error("Invalid client registration file: {0}")]
    InvalidRegistration(String),
    #[error("Token has expired and cannot be refreshed")]
    TokenExpired,
    #[error("No refresh token available")]
    NoRefreshToken,
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("OAuth error: {0}")]
    OAuthError(String),
}

pub fn load_registration(path: &Path) -> Result<ApplicationSecret, AuthError> {
    if !path.exists() {
        return Err(AuthError::RegistrationMissing(path.to_path_buf()));
    }

    let content = std::fs::read(path)?;
    yup_oauth2::parse_application_secret(&content)
        .map_err(|e| AuthError::InvalidRegistration(format!("{}: {}", path.display(), e)))
}

/// The two ways of obtaining a credential from the authorization server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError>;

    /// Blocks until the user has completed consent in the browser.
    async fn authorize_interactively(&self) -> Result<Credential, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    fn into_credential(self, previous_refresh: Option<&str>, previous_scopes: &[String]) -> Credential {
        let scopes: Vec<String> = match &self.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => previous_scopes.to_vec(),
        };

        let mut credential = match self.expires_in {
            Some(seconds) => Credential::new(self.access_token, seconds),
            None => Credential {
                expiry: None,
                ..Credential::new(self.access_token, 0)
            },
        }
        .with_scopes(&scopes);

        credential.refresh_token = self.refresh_token.or_else(|| previous_refresh.map(str::to_string));
        credential
    }
}

/// Holds on to the token the installed flow issues so it can be written to
/// the token cache together with its refresh token.
#[derive(Clone, Default)]
struct IssuedToken(Arc<Mutex<Option<TokenInfo>>>);

impl IssuedToken {
    async fn take(&self) -> Option<TokenInfo> {
        self.0.lock().await.take()
    }
}

#[async_trait]
impl TokenStorage for IssuedToken {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        *self.0.lock().await = Some(token);
        Ok(())
    }

    async fn get(&self, _target_scopes: &[&str]) -> Option<TokenInfo> {
        None
    }
}

/// Prints the consent URL and tries to open it in the default browser.
struct BrowserPresenter;

impl InstalledFlowDelegate for BrowserPresenter {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        _need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            println!("\n=== Google Calendar Authorization ===\n");
            println!("Visit this URL in your browser to authorize chronos:\n");
            println!("{}\n", url);
            println!("Waiting for the browser to return here...");

            if let Err(e) = open::that(url) {
                tracing::warn!("Could not open browser: {}", e);
            }
            Ok(String::new())
        })
    }
}

fn credential_from_issued(token: TokenInfo, scopes: &[String]) -> Result<Credential, AuthError> {
    let access_token = token.access_token
        .ok_or_else(|| AuthError::OAuthError("Token response carried no access token".to_string()))?;

    Ok(Credential {
        access_token,
        refresh_token: token.refresh_token,
        expiry: token.expires_at
            .and_then(|at| DateTime::from_timestamp(at.unix_timestamp(), 0)),
        scopes: scopes.to_vec(),
        token_type: "Bearer".to_string(),
    })
}

pub struct GoogleAuthenticator {
    secret: ApplicationSecret,
    scopes: Vec<String>,
    client: reqwest::Client,
    presenter: fn() -> Box<dyn InstalledFlowDelegate>,
}

impl GoogleAuthenticator {
    pub fn new(secret: ApplicationSecret) -> Self {
        Self {
            secret,
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            client: reqwest::Client::new(),
            presenter: || Box::new(BrowserPresenter),
        }
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self.client
            .post(&self.secret.token_uri)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        tracing::info!("Token endpoint response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await?;
            tracing::error!("Token request failed. Status: {}, Body: {}", status, error_text);
            return Err(AuthError::OAuthError(error_text));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Authorizer for GoogleAuthenticator {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        let refresh_token = credential.refresh_token.as_ref()
            .ok_or(AuthError::NoRefreshToken)?;

        tracing::info!("Refreshing expired access token");

        let params = [
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let token_response = self.request_token(&params).await?;
        Ok(token_response.into_credential(Some(refresh_token.as_str()), &credential.scopes))
    }

    async fn authorize_interactively(&self) -> Result<Credential, AuthError> {
        tracing::info!("Starting interactive authorization");

        let issued = IssuedToken::default();
        let auth = InstalledFlowAuthenticator::builder(
            self.secret.clone(),
            InstalledFlowReturnMethod::HTTPRedirect,
        )
        .flow_delegate((self.presenter)())
        .with_storage(Box::new(issued.clone()))
        .build()
        .await?;

        let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        auth.token(&scopes)
            .await
            .map_err(|e| AuthError::OAuthError(e.to_string()))?;

        let token = issued.take().await
            .ok_or_else(|| AuthError::OAuthError("Authorization flow finished without a token".to_string()))?;
        if token.refresh_token.is_none() {
            tracing::warn!("Authorization server did not issue a refresh token");
        }

        println!("\nAuthorization successful.\n");
        credential_from_issued(token, &self.scopes)
    }
}
