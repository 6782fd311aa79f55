//! Validity decisions over persisted credentials.
//!
//! Per load attempt:
//!
//! ```text
//! NoFile                 -> Missing
//! FileValid              -> Usable
//! FileExpiredWithRefresh -> Refreshing -> Usable | Missing
//! FileExpiredNoRefresh   -> Missing
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ProviderResult;
use crate::transport::Transport;

use super::credentials::Credentials;
use super::oauth::OAuthClient;
use super::store::TokenStore;

/// What a loaded credentials file allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No token file.
    NoFile,
    /// Usable without a network call.
    Valid,
    /// Expired (or tokenless) but refreshable.
    ExpiredWithRefresh,
    /// Neither usable nor refreshable.
    ExpiredNoRefresh,
}

impl TokenState {
    /// Classifies credentials read from the store.
    pub fn of(credentials: Option<&Credentials>) -> Self {
        match credentials {
            None => Self::NoFile,
            Some(c) if c.is_valid() => Self::Valid,
            Some(c) if c.has_refresh_token() => Self::ExpiredWithRefresh,
            Some(_) => Self::ExpiredNoRefresh,
        }
    }
}

/// Owns the credentials lifecycle for one token file and scope set.
#[derive(Clone)]
pub struct TokenManager {
    store: TokenStore,
    scopes: Vec<String>,
    oauth: OAuthClient,
}

impl TokenManager {
    /// Creates a manager refreshing through `transport`.
    pub fn new(store: TokenStore, scopes: Vec<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            scopes,
            oauth: OAuthClient::new(transport),
        }
    }

    /// Returns the scopes credentials are loaded against.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Reports the state of the stored credentials without refreshing.
    pub fn classify(&self) -> ProviderResult<TokenState> {
        Ok(TokenState::of(self.store.read(&self.scopes)?.as_ref()))
    }

    /// Loads stored credentials, refreshing them if needed.
    ///
    /// `Ok(None)` means the caller has to run an interactive login.
    pub fn load(&self) -> ProviderResult<Option<Credentials>> {
        let mut credentials = self.store.read(&[])?;
        debug!("token state: {:?}", TokenState::of(credentials.as_ref()));
        if let Some(c) = credentials.as_mut()
            && !self.scopes.is_empty()
        {
            if !c.scopes.is_empty() && !c.has_scopes(&self.scopes) {
                warn!("stored credentials do not cover the requested scopes");
            }
            c.scopes = self.scopes.clone();
        }

        match (TokenState::of(credentials.as_ref()), credentials) {
            (TokenState::Valid, Some(c)) => {
                debug!("stored credentials are valid");
                Ok(Some(c))
            }
            (TokenState::ExpiredWithRefresh, Some(c)) => {
                debug!("stored credentials expired, refreshing");
                self.refresh(c)
            }
            (TokenState::ExpiredNoRefresh, _) => {
                info!("stored credentials unusable and not refreshable");
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Exchanges the refresh token for a new access token and persists the
    /// result.
    ///
    /// A revoked refresh token yields `Ok(None)`; every other failure is
    /// returned as an error.
    pub fn refresh(&self, mut credentials: Credentials) -> ProviderResult<Option<Credentials>> {
        let grant = match self.oauth.refresh(&credentials) {
            Ok(grant) => grant,
            Err(e) if e.is_invalid_grant() => {
                warn!("refresh token rejected, interactive login required: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        credentials.update_access_token(grant.access_token, grant.expires_in);
        if let Some(rotated) = grant.refresh_token {
            credentials.refresh_token = Some(rotated);
        }
        self.save(&credentials)?;
        Ok(Some(credentials))
    }

    /// Persists credentials for the next run.
    pub fn save(&self, credentials: &Credentials) -> ProviderResult<()> {
        self.store.write(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::testing::{ScriptedTransport, capture_logs, warnings};
    use crate::transport::HttpResponse;
    use serde_json::json;
    use std::fs;
    use std::path::Path;

    const SCOPE: &str = "https://www.googleapis.com/auth/calendar";

    fn scopes() -> Vec<String> {
        vec![SCOPE.to_string()]
    }

    fn write_token(path: &Path, expiry: &str, refresh_token: Option<&str>) {
        let mut doc = json!({
            "token": "stored-access",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "cid",
            "client_secret": "csecret",
            "scopes": [SCOPE],
            "expiry": expiry,
        });
        if let Some(r) = refresh_token {
            doc["refresh_token"] = json!(r);
        }
        fs::write(path, doc.to_string()).unwrap();
    }

    fn manager(path: &Path, transport: Arc<ScriptedTransport>) -> TokenManager {
        TokenManager::new(TokenStore::new(path), scopes(), transport)
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new([]);
        let loaded = manager(&dir.path().join("token.json"), transport.clone())
            .load()
            .unwrap();
        assert!(loaded.is_none());
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn valid_token_is_returned_without_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_token(&path, "2099-01-01T00:00:00Z", Some("r"));
        let before = fs::read_to_string(&path).unwrap();

        let transport = ScriptedTransport::new([]);
        let loaded = manager(&path, transport.clone()).load().unwrap().unwrap();

        assert_eq!(loaded.bearer(), Some("stored-access"));
        assert_eq!(transport.request_count(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn expired_token_refreshes_once_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_token(&path, "2000-01-01T00:00:00Z", Some("1//refresh"));

        let transport = ScriptedTransport::new([ScriptedTransport::json(
            200,
            json!({"access_token": "refreshed", "expires_in": 3599}),
        )]);
        let loaded = manager(&path, transport.clone()).load().unwrap().unwrap();

        assert_eq!(transport.request_count(), 1);
        assert_eq!(loaded.bearer(), Some("refreshed"));
        assert_eq!(loaded.refresh_token.as_deref(), Some("1//refresh"));

        let on_disk = TokenStore::new(&path).read(&scopes()).unwrap().unwrap();
        assert_eq!(on_disk, loaded);
    }

    #[test]
    fn rotated_refresh_token_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_token(&path, "2000-01-01T00:00:00Z", Some("old-refresh"));

        let transport = ScriptedTransport::new([ScriptedTransport::json(
            200,
            json!({"access_token": "a", "refresh_token": "new-refresh", "expires_in": 60}),
        )]);
        let loaded = manager(&path, transport).load().unwrap().unwrap();
        assert_eq!(loaded.refresh_token.as_deref(), Some("new-refresh"));
    }

    #[test]
    fn expired_without_refresh_token_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_token(&path, "2000-01-01T00:00:00Z", None);

        let transport = ScriptedTransport::new([]);
        let tokens = manager(&path, transport.clone());
        assert_eq!(tokens.classify().unwrap(), TokenState::ExpiredNoRefresh);
        assert!(tokens.load().unwrap().is_none());
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn revoked_refresh_token_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_token(&path, "2000-01-01T00:00:00Z", Some("revoked"));
        let before = fs::read_to_string(&path).unwrap();

        let transport = ScriptedTransport::new([ScriptedTransport::json(
            400,
            json!({"error": "invalid_grant", "error_description": "Bad Request"}),
        )]);
        assert!(manager(&path, transport).load().unwrap().is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn other_refresh_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_token(&path, "2000-01-01T00:00:00Z", Some("r"));

        let transport = ScriptedTransport::new([HttpResponse::new(500, "backend error")]);
        let err = manager(&path, transport).load().unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
    }

    #[test]
    fn transport_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_token(&path, "2000-01-01T00:00:00Z", Some("r"));

        // No scripted response: the transport reports a network error.
        let err = manager(&path, ScriptedTransport::new([])).load().unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NetworkError);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        write_token(&path, "2099-01-01T00:00:00Z", Some("r"));

        let transport = ScriptedTransport::new([]);
        let tokens = manager(&path, transport);
        let saved = tokens.load().unwrap().unwrap();

        fs::remove_file(&path).unwrap();
        tokens.save(&saved).unwrap();
        assert_eq!(tokens.load().unwrap().unwrap(), saved);
    }

    #[test]
    fn classify_states() {
        let valid = Credentials::from_json(r#"{"token": "t"}"#, &[]).unwrap();
        let refreshable = Credentials::from_json(
            r#"{"token": "t", "refresh_token": "r", "expiry": "2000-01-01T00:00:00Z"}"#,
            &[],
        )
        .unwrap();
        let dead =
            Credentials::from_json(r#"{"token": "t", "expiry": "2000-01-01T00:00:00Z"}"#, &[])
                .unwrap();

        assert_eq!(TokenState::of(None), TokenState::NoFile);
        assert_eq!(TokenState::of(Some(&valid)), TokenState::Valid);
        assert_eq!(
            TokenState::of(Some(&refreshable)),
            TokenState::ExpiredWithRefresh
        );
        assert_eq!(TokenState::of(Some(&dead)), TokenState::ExpiredNoRefresh);

        let tokenless = Credentials::from_json(r#"{"refresh_token": "r"}"#, &[]).unwrap();
        assert_eq!(
            TokenState::of(Some(&tokenless)),
            TokenState::ExpiredWithRefresh
        );
    }

    #[test]
    fn narrower_stored_scopes_warn() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(
            &path,
            json!({"token": "t", "scopes": ["https://www.googleapis.com/auth/drive.readonly"]})
                .to_string(),
        )
        .unwrap();

        let (loaded, events) =
            capture_logs(|| manager(&path, ScriptedTransport::new([])).load().unwrap());
        assert_eq!(loaded.unwrap().scopes, scopes());
        assert_eq!(warnings(&events).len(), 1);
    }
}
