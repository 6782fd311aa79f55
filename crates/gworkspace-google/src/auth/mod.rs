//! OAuth 2.0 user credentials.
//!
//! # Lifecycle
//!
//! 1. [`TokenStore`] reads the persisted authorized-user JSON, if any
//! 2. [`TokenManager`] keeps it when valid, refreshes it when expired, and
//!    discards it when the refresh token was revoked
//! 3. [`CredentialProvider`] falls back to the interactive consent flow and
//!    persists the result
//!
//! The consent flow prints the authorization URL and waits on a callback
//! listener (port 8000 by default). In a container, bind it to all interfaces
//! with [`CallbackBind::AllInterfaces`] and publish the port.
//!
//! # Example
//!
//! ```ignore
//! use gworkspace_google::auth::CredentialProvider;
//! use gworkspace_google::{GoogleConfig, calendar::CALENDAR_SCOPES};
//!
//! let config = GoogleConfig::new();
//! let provider = CredentialProvider::new(config.clone(), CALENDAR_SCOPES, config.transport()?);
//! let credentials = provider.create()?;
//! ```

mod client_secret;
mod credentials;
mod manager;
mod oauth;
mod provider;
mod store;

pub use client_secret::{ClientSecret, GOOGLE_AUTH_URI, GOOGLE_TOKEN_URI};
pub use credentials::Credentials;
pub use manager::{TokenManager, TokenState};
pub use oauth::{CallbackBind, OAuthClient, PkceFlow, TokenGrant};
pub use provider::CredentialProvider;
pub use store::TokenStore;
