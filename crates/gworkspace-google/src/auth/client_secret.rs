//! OAuth client secret file.
//!
//! The JSON downloaded from the Google Cloud Console "OAuth 2.0 Client IDs"
//! page. It is read-only input to the interactive login flow.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// Default authorization endpoint.
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
/// Default token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client registration used for the authorization-code flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

/// Top level of the credentials file.
///
/// Either an `installed` (desktop) or `web` section, or the fields at the
/// root (as written by gcloud).
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecretSection>,
    web: Option<ClientSecretSection>,
    #[serde(flatten)]
    flat: FlatSection,
}

#[derive(Debug, Deserialize)]
struct ClientSecretSection {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatSection {
    client_id: Option<String>,
    client_secret: Option<String>,
    token_uri: Option<String>,
}

impl ClientSecret {
    /// Creates a client secret with Google's default endpoints.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
        }
    }

    /// Reads and parses a client secret file.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read client secret file {}: {e}",
                path.display()
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses a client secret JSON document.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse client secret JSON: {e}"))
                .with_source(e)
        })?;

        if let Some(section) = file.installed.or(file.web) {
            return Ok(Self {
                client_id: section.client_id,
                client_secret: section.client_secret,
                auth_uri: section
                    .auth_uri
                    .unwrap_or_else(|| GOOGLE_AUTH_URI.to_string()),
                token_uri: section
                    .token_uri
                    .unwrap_or_else(|| GOOGLE_TOKEN_URI.to_string()),
            });
        }

        match (file.flat.client_id, file.flat.client_secret) {
            (Some(client_id), Some(client_secret)) => {
                let mut secret = Self::new(client_id, client_secret);
                if let Some(token_uri) = file.flat.token_uri {
                    secret.token_uri = token_uri;
                }
                Ok(secret)
            }
            _ => Err(ProviderError::configuration(
                "client secret file must contain an 'installed'/'web' section or \
                 'client_id'/'client_secret' at the root",
            )),
        }
    }

    /// Checks that the registration looks usable.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.client_id.is_empty() {
            return Err(ProviderError::configuration("client_id is required"));
        }
        if self.client_secret.is_empty() {
            return Err(ProviderError::configuration("client_secret is required"));
        }
        Ok(())
    }
}
