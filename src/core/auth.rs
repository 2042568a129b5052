//! Credential storage and session validity
//!
//! Credentials live in a small JSON document next to the config file. An
//! access token exported in `STACKIT_ACCESS_TOKEN` always takes precedence.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::config::ConfigStore;
use crate::core::errors::CliError;

pub const ACCESS_TOKEN_ENV: &str = "STACKIT_ACCESS_TOKEN";
pub const AUTH_FILE_NAME: &str = "cli-auth-storage.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthFlow {
    #[serde(rename = "sa_token")]
    ServiceAccountToken,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "auth_flow_type", skip_serializing_if = "Option::is_none")]
    pub flow: Option<AuthFlow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_expires_at_unix: Option<i64>,
}

impl Credentials {
    /// Credentials for a freshly activated service-account token
    pub fn for_service_account_token(token: &str, limit: Duration, now: DateTime<Utc>) -> Self {
        let claims = token_claims(token);
        let expires = now + chrono::Duration::from_std(limit).unwrap_or(chrono::Duration::hours(2));
        Self {
            flow: Some(AuthFlow::ServiceAccountToken),
            access_token: Some(token.to_string()),
            service_account_email: claims.and_then(|c| c.email),
            session_expires_at_unix: Some(expires.timestamp()),
        }
    }

    /// The session is valid while `now` is before the recorded expiry
    pub fn session_valid(&self, now: DateTime<Utc>) -> bool {
        match self.session_expires_at_unix {
            Some(expires) => now.timestamp() < expires,
            None => false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenClaims {
    email: Option<String>,
}

/// Decode the claims of a JWT without verifying it
fn token_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Credential file next to the config file
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: Option<PathBuf>,
}

impl CredentialStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn default_location() -> Self {
        Self::new(ConfigStore::config_dir().map(|dir| dir.join(AUTH_FILE_NAME)))
    }

    pub fn load(&self) -> Result<Option<Credentials>, CliError> {
        let Some(path) = self.path.as_ref().filter(|p| p.exists()) else {
            return Ok(None);
        };
        let content =
            std::fs::read_to_string(path).map_err(|e| CliError::io("read credentials", e))?;
        let creds = serde_json::from_str(&content)
            .map_err(|e| CliError::decode("read credentials", e))?;
        Ok(Some(creds))
    }

    pub fn save(&self, creds: &Credentials) -> Result<(), CliError> {
        let path = self.path.as_ref().ok_or(CliError::Auth)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        std::fs::create_dir_all(&dir).map_err(|e| CliError::io("create config directory", e))?;

        let body = serde_json::to_vec_pretty(creds)
            .map_err(|e| CliError::decode("encode credentials", e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| CliError::io("write credentials", e))?;
        tmp.write_all(&body)
            .map_err(|e| CliError::io("write credentials", e))?;
        // NamedTempFile is created with 0600 on unix
        tmp.persist(path)
            .map_err(|e| CliError::io("write credentials", e.error))?;
        Ok(())
    }

    /// Remove stored credentials; succeeds when none exist
    pub fn delete(&self) -> Result<bool, CliError> {
        match &self.path {
            Some(path) if path.exists() => {
                std::fs::remove_file(path).map_err(|e| CliError::io("delete credentials", e))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Pick the bearer token for outgoing requests
pub fn resolve_access_token(
    env_token: Option<String>,
    store: &CredentialStore,
    now: DateTime<Utc>,
) -> Result<String, CliError> {
    if let Some(token) = env_token.filter(|t| !t.is_empty()) {
        return Ok(token);
    }
    let creds = store.load()?.ok_or(CliError::Auth)?;
    let token = creds.access_token.clone().filter(|t| !t.is_empty()).ok_or(CliError::Auth)?;
    if !creds.session_valid(now) {
        return Err(CliError::SessionExpired);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fake_jwt(payload: &str) -> String {
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.sig",
            engine.encode(r#"{"alg":"none"}"#),
            engine.encode(payload)
        )
    }

    #[test]
    fn test_env_token_wins() {
        let store = CredentialStore::new(None);
        let token = resolve_access_token(Some("env-token".into()), &store, Utc::now()).unwrap();
        assert_eq!(token, "env-token");
    }

    #[test]
    fn test_missing_credentials_is_auth_error() {
        let tmp = tempdir().unwrap();
        let store = CredentialStore::new(Some(tmp.path().join(AUTH_FILE_NAME)));
        let err = resolve_access_token(None, &store, Utc::now()).unwrap_err();
        assert!(matches!(err, CliError::Auth));
    }

    #[test]
    fn test_session_expiry() {
        let tmp = tempdir().unwrap();
        let store = CredentialStore::new(Some(tmp.path().join(AUTH_FILE_NAME)));
        let now = Utc::now();
        let creds = Credentials::for_service_account_token("tok", Duration::from_secs(3600), now);
        store.save(&creds).unwrap();

        assert_eq!(resolve_access_token(None, &store, now).unwrap(), "tok");

        let later = now + chrono::Duration::hours(2);
        let err = resolve_access_token(None, &store, later).unwrap_err();
        assert!(matches!(err, CliError::SessionExpired));
    }

    #[test]
    fn test_email_from_token_claims() {
        let token = fake_jwt(r#"{"email":"sa@sa.stackit.cloud","sub":"x"}"#);
        let creds = Credentials::for_service_account_token(&token, Duration::from_secs(60), Utc::now());
        assert_eq!(
            creds.service_account_email.as_deref(),
            Some("sa@sa.stackit.cloud")
        );
        assert_eq!(creds.flow, Some(AuthFlow::ServiceAccountToken));
    }

    #[test]
    fn test_opaque_token_has_no_email() {
        let creds = Credentials::for_service_account_token("opaque", Duration::from_secs(60), Utc::now());
        assert!(creds.service_account_email.is_none());
    }

    #[test]
    fn test_delete() {
        let tmp = tempdir().unwrap();
        let store = CredentialStore::new(Some(tmp.path().join(AUTH_FILE_NAME)));
        assert!(!store.delete().unwrap());
        store.save(&Credentials::default()).unwrap();
        assert!(store.delete().unwrap());
        assert!(store.load().unwrap().is_none());
    }
}
