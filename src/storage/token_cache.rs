use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Credentials are treated as expired this long before Google would reject them.
pub const REFRESH_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access token cache: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse token cache: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credential {
    pub fn new(access_token: String, expires_in_seconds: i64) -> Self {
        Self {
            access_token,
            refresh_token: None,
            expiry: Some(Utc::now() + chrono::Duration::seconds(expires_in_seconds)),
            scopes: Vec::new(),
            token_type: default_token_type(),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: String) -> Self {
        self.refresh_token = Some(refresh_token);
        self
    }

    pub fn with_scopes<S: AsRef<str>>(mut self, scopes: &[S]) -> Self {
        self.scopes = scopes.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn is_expired(&self) -> bool {
        let buffer = chrono::Duration::minutes(REFRESH_WINDOW_MINUTES);
        self.expiry
            .is_some_and(|expiry| expiry <= Utc::now() + buffer)
    }

    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    pub fn covers<S: AsRef<str>>(&self, requested: &[S]) -> bool {
        requested
            .iter()
            .all(|scope| self.scopes.iter().any(|granted| granted == scope.as_ref()))
    }
}

pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save_token(&self, credential: &Credential) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(credential)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!("Token cache written to {}", self.path.display());
        Ok(())
    }

    pub fn load_token(&self) -> Result<Credential, StorageError> {
        let content = std::fs::read_to_string(&self.path)?;
        let credential: Credential = serde_json::from_str(&content)?;
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn create_test_credential() -> Credential {
        Credential::new("test_access_token".to_string(), 3600)
    }

    fn create_expired_credential() -> Credential {
        Credential {
            access_token: "expired_token".to_string(),
            refresh_token: Some("refresh_token".to_string()),
            expiry: Some(Utc::now() - chrono::Duration::hours(1)),
            scopes: Vec::new(),
            token_type: "Bearer".to_string(),
        }
    }

    #[test]
    fn new_credential_is_valid() {
        let credential = create_test_credential();
        assert!(credential.is_valid());
        assert!(!credential.is_expired());
    }

    #[test]
    fn expired_credential_is_not_valid() {
        let credential = create_expired_credential();
        assert!(credential.is_expired());
        assert!(!credential.is_valid());
    }

    #[test]
    fn credential_inside_refresh_window_counts_as_expired() {
        let credential = Credential::new("token".to_string(), 120);
        assert!(credential.is_expired());
    }

    #[test]
    fn credential_without_expiry_never_expires() {
        let mut credential = create_test_credential();
        credential.expiry = None;

        assert!(!credential.is_expired());
        assert!(credential.is_valid());
    }

    #[test]
    fn empty_access_token_is_not_valid() {
        let credential = Credential::new(String::new(), 3600);
        assert!(!credential.is_valid());
    }

    #[test]
    fn can_refresh_requires_non_empty_refresh_token() {
        assert!(!create_test_credential().can_refresh());
        assert!(create_expired_credential().can_refresh());
        assert!(
            !create_test_credential()
                .with_refresh_token(String::new())
                .can_refresh()
        );
    }

    #[test]
    fn covers_checks_every_requested_scope() {
        let credential = create_test_credential().with_scopes(&["openid", "email"]);

        assert!(credential.covers(&["openid"]));
        assert!(credential.covers(&["email", "openid"]));
        assert!(!credential.covers(&["openid", "calendar"]));
    }

    #[test]
    fn save_token_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let token_path = temp_dir.path().join("nested").join("token.json");
        let storage = TokenStorage::new(token_path.clone());

        storage.save_token(&create_test_credential()).unwrap();

        assert!(token_path.exists());
    }

    #[test]
    fn load_token_returns_what_was_saved() {
        let temp_dir = TempDir::new().unwrap();
        let storage = TokenStorage::new(temp_dir.path().join("token.json"));
        let original = create_test_credential()
            .with_refresh_token("refresh".to_string())
            .with_scopes(&["openid"]);

        storage.save_token(&original).unwrap();
        let loaded = storage.load_token().unwrap();

        assert_eq!(loaded, original);
    }

    #[test]
    fn save_token_overwrites_previous_contents() {
        let temp_dir = TempDir::new().unwrap();
        let storage = TokenStorage::new(temp_dir.path().join("token.json"));

        storage.save_token(&create_expired_credential()).unwrap();
        storage.save_token(&create_test_credential()).unwrap();

        assert_eq!(storage.load_token().unwrap().access_token, "test_access_token");
    }

    #[test]
    fn load_accepts_authorized_user_layout() {
        let temp_dir = TempDir::new().unwrap();
        let token_path = temp_dir.path().join("token.json");
        std::fs::write(
            &token_path,
            r#"{
                "token": "ya29.abc",
                "refresh_token": "1//refresh",
                "client_id": "id.apps.googleusercontent.com",
                "scopes": ["openid"],
                "expiry": "2030-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();

        let loaded = TokenStorage::new(token_path).load_token().unwrap();

        assert_eq!(loaded.access_token, "ya29.abc");
        assert_eq!(loaded.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(loaded.token_type, "Bearer");
        assert!(loaded.is_valid());
    }

    #[test]
    fn load_nonexistent_token_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = TokenStorage::new(temp_dir.path().join("nonexistent.json"));

        assert!(!storage.exists());
        assert!(matches!(storage.load_token(), Err(StorageError::IoError(_))));
    }

    #[test]
    fn load_garbage_token_returns_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let token_path = temp_dir.path().join("token.json");
        std::fs::write(&token_path, "not json").unwrap();

        let result = TokenStorage::new(token_path).load_token();

        assert!(matches!(result, Err(StorageError::ParseError(_))));
    }
}
