//! Guarantees usable credentials, logging in interactively when needed.

use std::net::TcpListener;
use std::sync::Arc;

use tracing::info;

use crate::config::GoogleConfig;
use crate::error::ProviderResult;
use crate::transport::Transport;

use super::client_secret::ClientSecret;
use super::credentials::Credentials;
use super::manager::TokenManager;
use super::oauth::{OAuthClient, PkceFlow, bind_callback};
use super::store::TokenStore;

/// Produces credentials for one scope set.
///
/// [`create`](Self::create) never returns unusable credentials: if nothing
/// valid or refreshable is stored, it blocks on the consent flow.
#[derive(Clone)]
pub struct CredentialProvider {
    config: GoogleConfig,
    tokens: TokenManager,
    oauth: OAuthClient,
}

impl CredentialProvider {
    /// Creates a provider for `scopes` using the paths and callback settings
    /// of `config`.
    pub fn new(config: GoogleConfig, scopes: &[&str], transport: Arc<dyn Transport>) -> Self {
        let scopes = scopes.iter().map(|s| s.to_string()).collect();
        let tokens = TokenManager::new(
            TokenStore::new(&config.token_path),
            scopes,
            Arc::clone(&transport),
        );
        Self {
            config,
            tokens,
            oauth: OAuthClient::new(transport),
        }
    }

    /// Returns the token manager backing this provider.
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Returns usable credentials, from storage or via interactive login.
    pub fn create(&self) -> ProviderResult<Credentials> {
        match self.tokens.load()? {
            Some(credentials) => Ok(credentials),
            None => {
                info!("no usable stored credentials, starting interactive login");
                self.login()
            }
        }
    }

    /// Runs the consent flow and persists the resulting credentials.
    pub fn login(&self) -> ProviderResult<Credentials> {
        let client = ClientSecret::from_file(&self.config.client_secret_path)?;
        client.validate()?;

        let listener = bind_callback(self.config.callback_bind, self.config.callback_port)?;
        self.login_with(&client, &listener, PkceFlow::new())
    }

    pub(crate) fn login_with(
        &self,
        client: &ClientSecret,
        listener: &TcpListener,
        pkce: PkceFlow,
    ) -> ProviderResult<Credentials> {
        let credentials = self
            .oauth
            .authorize(client, self.tokens.scopes(), listener, pkce)?;
        self.tokens.save(&credentials)?;
        info!("credentials saved to {:?}", self.config.token_path);
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::testing::ScriptedTransport;
    use serde_json::json;
    use std::fs;
    use std::io::Write as _;
    use std::net::TcpStream;

    const SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar"];

    fn config(dir: &std::path::Path) -> GoogleConfig {
        GoogleConfig::new().with_secrets_dir(dir)
    }

    #[test]
    fn create_uses_stored_credentials() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("token.json"),
            json!({"token": "stored", "refresh_token": "r", "expiry": "2099-01-01T00:00:00Z"})
                .to_string(),
        )
        .unwrap();

        // No client secret on disk: reaching login would fail the test.
        let transport = ScriptedTransport::new([]);
        let provider = CredentialProvider::new(config(dir.path()), SCOPES, transport.clone());
        let credentials = provider.create().unwrap();

        assert_eq!(credentials.bearer(), Some("stored"));
        assert_eq!(credentials.scopes, vec![SCOPES[0].to_string()]);
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn create_refreshes_expired_credentials() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("token.json"),
            json!({"token": "old", "refresh_token": "r", "expiry": "2000-01-01T00:00:00Z"})
                .to_string(),
        )
        .unwrap();

        let transport = ScriptedTransport::new([ScriptedTransport::json(
            200,
            json!({"access_token": "new", "expires_in": 3600}),
        )]);
        let provider = CredentialProvider::new(config(dir.path()), SCOPES, transport);
        assert_eq!(provider.create().unwrap().bearer(), Some("new"));
    }

    #[test]
    fn login_without_client_secret_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            CredentialProvider::new(config(dir.path()), SCOPES, ScriptedTransport::new([]));

        let err = provider.create().unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
        assert!(!dir.path().join("token.json").exists());
    }

    #[test]
    fn login_rejects_incomplete_client_secret() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("credentials.json"),
            r#"{"installed": {"client_id": "", "client_secret": "s"}}"#,
        )
        .unwrap();
        let provider =
            CredentialProvider::new(config(dir.path()), SCOPES, ScriptedTransport::new([]));

        let err = provider.login().unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }

    #[test]
    fn login_persists_new_credentials() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("credentials.json"),
            r#"{"installed": {"client_id": "cid", "client_secret": "csecret"}}"#,
        )
        .unwrap();

        let transport = ScriptedTransport::new([ScriptedTransport::json(
            200,
            json!({"access_token": "fresh", "refresh_token": "1//r", "expires_in": 3600}),
        )]);
        let provider = CredentialProvider::new(config(dir.path()), SCOPES, transport.clone());
        let client = ClientSecret::from_file(&dir.path().join("credentials.json")).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let pkce = PkceFlow {
            state: "known-state".to_string(),
            ..PkceFlow::new()
        };
        let browser = std::thread::spawn(move || {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
            stream
                .write_all(b"GET /?code=4%2Fcode&state=known-state HTTP/1.1\r\n\r\n")
                .unwrap();
        });

        let credentials = provider.login_with(&client, &listener, pkce).unwrap();
        browser.join().unwrap();
        assert_eq!(credentials.bearer(), Some("fresh"));
        assert_eq!(transport.request_count(), 1);

        let token_path = dir.path().join("token.json");
        assert!(token_path.exists());
        let stored = provider.tokens().store().read(&[]).unwrap().unwrap();
        assert_eq!(stored.bearer(), Some("fresh"));
        assert_eq!(stored.refresh_token.as_deref(), Some("1//r"));
        assert_eq!(stored.client_id, "cid");

        // The saved token is picked up without another request or login.
        assert_eq!(provider.create().unwrap().bearer(), Some("fresh"));
        assert_eq!(transport.request_count(), 1);
    }
}
