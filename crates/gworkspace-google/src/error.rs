//! Error types for Google API operations.
//!
//! Recoverable authentication states (no stored credentials, a revoked
//! refresh token) are not errors: the token manager reports them as `None`.
//! Everything here is meant to abort the current operation.

use std::fmt;
use thiserror::Error;

/// The category of a [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Credentials were rejected or the OAuth flow failed.
    AuthenticationFailed,
    /// The account lacks permission for the resource.
    AuthorizationFailed,
    /// The token endpoint answered `invalid_grant`: the refresh token was
    /// revoked or expired.
    InvalidGrant,
    /// Connection failure, timeout, DNS resolution, local listener I/O.
    NetworkError,
    /// Too many requests.
    RateLimited,
    /// The server returned a 5xx status.
    ServerError,
    /// The response body could not be understood.
    InvalidResponse,
    /// Resource not found (404, or a folder lookup with no match).
    NotFound,
    /// The request was rejected as malformed (400).
    BadRequest,
    /// Missing or invalid configuration, unreadable secret or token files.
    ConfigurationError,
    /// Unexpected internal state.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns a stable snake_case name for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::InvalidGrant => "invalid_grant",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }

    /// Maps a non-success HTTP status to an error code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::AuthenticationFailed,
            403 => Self::AuthorizationFailed,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::InvalidResponse,
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while talking to Google or managing local credential state.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates an error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Credentials were rejected or the consent flow failed.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// The refresh token was revoked or has expired.
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidGrant, message)
    }

    /// Transport or callback listener failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Google answered with a 5xx status.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    /// A response body or header that cannot be decoded.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// The requested resource does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    /// Unreadable or malformed local files and settings.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Local failure not caused by the caller or by Google.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Creates an error for a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        Self::new(
            ProviderErrorCode::from_status(status),
            format!("API error ({status}): {body}"),
        )
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the category.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the human-readable detail.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true when the refresh token was revoked and a fresh interactive
    /// login is needed.
    pub fn is_invalid_grant(&self) -> bool {
        self.code == ProviderErrorCode::InvalidGrant
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Result of every fallible operation in this crate.
pub type ProviderResult<T> = Result<T, ProviderError>;
