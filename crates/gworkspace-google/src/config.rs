//! Workspace client configuration.
//!
//! Everything is explicit: there are no process-wide globals. Defaults put
//! secrets under `~/.config/gworkspace/secrets` (platform config dir via
//! `dirs`). The same settings can be read from a TOML file where every key is
//! optional:
//!
//! ```toml
//! secrets_dir = "/run/secrets/gworkspace"
//! callback_port = 8000
//! callback_bind = "all_interfaces"
//! timeout_secs = 30
//! download_chunk_size = 104857600
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::auth::CallbackBind;
use crate::drive::DEFAULT_CHUNK_SIZE;
use crate::error::{ProviderError, ProviderResult};
use crate::transport::{ReqwestTransport, Transport};

/// File name of the persisted user credentials inside the secrets directory.
pub const TOKEN_FILE_NAME: &str = "token.json";

/// File name of the OAuth client registration inside the secrets directory.
pub const CLIENT_SECRET_FILE_NAME: &str = "credentials.json";

/// Configuration shared by the credential provider and the API clients.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleConfig {
    /// Directory holding the token and client secret files.
    pub secrets_dir: PathBuf,

    /// Path of the persisted user credentials.
    ///
    /// Defaults to `<secrets_dir>/token.json`.
    pub token_path: PathBuf,

    /// Path of the OAuth client secret JSON downloaded from the Cloud Console.
    ///
    /// Defaults to `<secrets_dir>/credentials.json`.
    pub client_secret_path: PathBuf,

    /// Port of the OAuth callback listener. The redirect URI registered with
    /// Google must be `http://localhost:<port>/`.
    pub callback_port: u16,

    /// Interface the callback listener binds to.
    pub callback_bind: CallbackBind,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// User agent sent with every request.
    pub user_agent: String,

    /// Size of each ranged request when downloading Drive files.
    pub download_chunk_size: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self::with_secrets_dir_defaults(Self::default_secrets_dir())
    }
}

impl GoogleConfig {
    /// Default callback port.
    pub const DEFAULT_CALLBACK_PORT: u16 = 8000;

    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a configuration with every default.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_secrets_dir_defaults(secrets_dir: PathBuf) -> Self {
        Self {
            token_path: secrets_dir.join(TOKEN_FILE_NAME),
            client_secret_path: secrets_dir.join(CLIENT_SECRET_FILE_NAME),
            secrets_dir,
            callback_port: Self::DEFAULT_CALLBACK_PORT,
            callback_bind: CallbackBind::default(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("gworkspace/{}", env!("CARGO_PKG_VERSION")),
            download_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Returns the default secrets directory.
    pub fn default_secrets_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gworkspace")
            .join("secrets")
    }

    /// Sets the secrets directory.
    ///
    /// Token and client secret paths still pointing into the previous
    /// directory follow the new one.
    #[must_use]
    pub fn with_secrets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if self.token_path == self.secrets_dir.join(TOKEN_FILE_NAME) {
            self.token_path = dir.join(TOKEN_FILE_NAME);
        }
        if self.client_secret_path == self.secrets_dir.join(CLIENT_SECRET_FILE_NAME) {
            self.client_secret_path = dir.join(CLIENT_SECRET_FILE_NAME);
        }
        self.secrets_dir = dir;
        self
    }

    /// Sets the token path.
    #[must_use]
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Sets the client secret path.
    #[must_use]
    pub fn with_client_secret_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_secret_path = path.into();
        self
    }

    /// Sets the callback port.
    #[must_use]
    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    /// Sets the callback bind mode.
    #[must_use]
    pub fn with_callback_bind(mut self, bind: CallbackBind) -> Self {
        self.callback_bind = bind;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the download chunk size.
    #[must_use]
    pub fn with_download_chunk_size(mut self, size: u64) -> Self {
        self.download_chunk_size = size;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.callback_port == 0 {
            return Err("callback_port must be non-zero".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be non-zero".to_string());
        }
        if self.download_chunk_size == 0 {
            return Err("download_chunk_size must be non-zero".to_string());
        }
        if self.user_agent.trim().is_empty() {
            return Err("user_agent is required".to_string());
        }
        Ok(())
    }

    /// Loads configuration from a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!("failed to read config {}: {e}", path.display()))
                .with_source(e)
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> ProviderResult<Self> {
        let settings: GoogleSettings = toml::from_str(content).map_err(|e| {
            ProviderError::configuration(format!("failed to parse config: {e}")).with_source(e)
        })?;
        let config = settings.into_config();
        config.validate().map_err(ProviderError::configuration)?;
        Ok(config)
    }

    /// Builds the HTTP transport described by this configuration.
    pub fn transport(&self) -> ProviderResult<Arc<dyn Transport>> {
        Ok(Arc::new(ReqwestTransport::new(
            self.timeout,
            &self.user_agent,
        )?))
    }
}

/// On-disk shape of [`GoogleConfig`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GoogleSettings {
    secrets_dir: Option<PathBuf>,
    token_path: Option<PathBuf>,
    client_secret_path: Option<PathBuf>,
    callback_port: Option<u16>,
    callback_bind: Option<CallbackBind>,
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
    download_chunk_size: Option<u64>,
}

impl GoogleSettings {
    fn into_config(self) -> GoogleConfig {
        let mut config = GoogleConfig::default();
        if let Some(dir) = self.secrets_dir {
            config = config.with_secrets_dir(dir);
        }
        if let Some(path) = self.token_path {
            config.token_path = path;
        }
        if let Some(path) = self.client_secret_path {
            config.client_secret_path = path;
        }
        if let Some(port) = self.callback_port {
            config.callback_port = port;
        }
        if let Some(bind) = self.callback_bind {
            config.callback_bind = bind;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }
        if let Some(size) = self.download_chunk_size {
            config.download_chunk_size = size;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    #[test]
    fn defaults() {
        let config = GoogleConfig::new();
        assert_eq!(config.callback_port, 8000);
        assert_eq!(config.callback_bind, CallbackBind::Loopback);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.download_chunk_size, 100 * 1024 * 1024);
        assert!(config.secrets_dir.ends_with("gworkspace/secrets"));
        assert_eq!(config.token_path, config.secrets_dir.join("token.json"));
        assert_eq!(
            config.client_secret_path,
            config.secrets_dir.join("credentials.json")
        );
        assert!(config.user_agent.starts_with("gworkspace/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn secrets_dir_moves_default_paths() {
        let config = GoogleConfig::new().with_secrets_dir("/run/secrets");
        assert_eq!(config.token_path, PathBuf::from("/run/secrets/token.json"));
        assert_eq!(
            config.client_secret_path,
            PathBuf::from("/run/secrets/credentials.json")
        );
    }

    #[test]
    fn secrets_dir_keeps_explicit_paths() {
        let config = GoogleConfig::new()
            .with_token_path("/tmp/my-token.json")
            .with_secrets_dir("/run/secrets");
        assert_eq!(config.token_path, PathBuf::from("/tmp/my-token.json"));
        assert_eq!(
            config.client_secret_path,
            PathBuf::from("/run/secrets/credentials.json")
        );
    }

    #[test]
    fn builder_methods() {
        let config = GoogleConfig::new()
            .with_client_secret_path("/etc/client.json")
            .with_callback_port(9000)
            .with_callback_bind(CallbackBind::AllInterfaces)
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("test-agent")
            .with_download_chunk_size(1024);

        assert_eq!(config.client_secret_path, PathBuf::from("/etc/client.json"));
        assert_eq!(config.callback_port, 9000);
        assert_eq!(config.callback_bind, CallbackBind::AllInterfaces);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.download_chunk_size, 1024);
    }

    #[test]
    fn validation() {
        assert!(GoogleConfig::new().with_callback_port(0).validate().is_err());
        assert!(
            GoogleConfig::new()
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            GoogleConfig::new()
                .with_download_chunk_size(0)
                .validate()
                .is_err()
        );
        assert!(GoogleConfig::new().with_user_agent(" ").validate().is_err());
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(GoogleConfig::from_toml("").unwrap(), GoogleConfig::default());
    }

    #[test]
    fn parses_toml() {
        let config = GoogleConfig::from_toml(
            r#"
            secrets_dir = "/run/secrets"
            callback_bind = "all_interfaces"
            callback_port = 8123
            timeout_secs = 10
            download_chunk_size = 4096
            "#,
        )
        .unwrap();

        assert_eq!(config.token_path, PathBuf::from("/run/secrets/token.json"));
        assert_eq!(config.callback_bind, CallbackBind::AllInterfaces);
        assert_eq!(config.callback_port, 8123);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.download_chunk_size, 4096);
    }

    #[test]
    fn invalid_toml_is_configuration_error() {
        let err = GoogleConfig::from_toml("callback_port = \"eight\"").unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);

        let err = GoogleConfig::from_toml("callback_port = 0").unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);

        let err = GoogleConfig::from_toml("unknown_key = 1").unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gworkspace.toml");
        std::fs::write(&path, "user_agent = \"from-file\"\n").unwrap();
        assert_eq!(GoogleConfig::load_from(&path).unwrap().user_agent, "from-file");

        let err = GoogleConfig::load_from(dir.path().join("missing.toml")).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }
}
