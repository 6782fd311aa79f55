//! OAuth user credentials.
//!
//! Serialized in Google's "authorized user" JSON layout so token files are
//! interchangeable with other Google client libraries.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::client_secret::{ClientSecret, GOOGLE_TOKEN_URI};

/// Tokens within this window of their expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// An OAuth2 token bundle authorizing API calls for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// Access token sent as bearer; absent in files that only carry a refresh token.
    #[serde(rename = "token", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Long-lived token used to mint new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token endpoint used for refresh.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    /// OAuth client id the tokens were issued to.
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret the tokens were issued to.
    #[serde(default)]
    pub client_secret: String,

    /// Scopes the credentials are used with.
    #[serde(default, deserialize_with = "scopes_from_list_or_string")]
    pub scopes: Vec<String>,

    /// Access token expiry; `None` means the token does not expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,

    /// Fields written by other libraries (`universe_domain`, `account`, ...),
    /// preserved on save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

fn scopes_from_list_or_string<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scopes {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Option::<Scopes>::deserialize(deserializer)? {
        Some(Scopes::List(list)) => list,
        Some(Scopes::Joined(joined)) => joined.split_whitespace().map(String::from).collect(),
        None => Vec::new(),
    })
}

impl Credentials {
    /// Builds credentials from a token endpoint grant.
    pub fn from_grant(
        client: &ClientSecret,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token,
            token_uri: client.token_uri.clone(),
            client_id: client.client_id.clone(),
            client_secret: client.client_secret.clone(),
            scopes,
            expiry: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
            extra: serde_json::Map::new(),
        }
    }

    /// Parses credentials and applies the `required` scope set.
    ///
    /// An empty `required` keeps the scopes from the document.
    pub fn from_json(json: &str, required: &[String]) -> serde_json::Result<Self> {
        let mut credentials: Self = serde_json::from_str(json)?;
        if !required.is_empty() {
            credentials.scopes = required.to_vec();
        }
        Ok(credentials)
    }

    /// Serializes to the authorized-user JSON layout.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Returns true if the access token is past, or within the skew window of,
    /// its expiry.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// [`is_expired`](Self::is_expired) evaluated at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now >= expiry - Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    /// Returns true if an access token is present and not expired.
    pub fn is_valid(&self) -> bool {
        self.has_access_token() && !self.is_expired()
    }

    /// Returns true if a non-empty refresh token is present.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    fn has_access_token(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Returns true if every scope in `required` is present.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Replaces the access token after a refresh.
    pub fn update_access_token(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) {
        self.access_token = Some(access_token.into());
        self.expiry = expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs));
    }

    /// Returns the bearer token, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}
