//! Google Workspace access for Calendar and Drive.
//!
//! This crate provides:
//!
//! - [`auth`] - OAuth 2.0 user credentials: load, refresh, interactive login, persist
//! - [`calendar`] - Calendar v3 client and the [`EventManager`](calendar::EventManager)
//! - [`drive`] - Drive v3 client and the download-once [`FileCache`](drive::FileCache)
//! - [`Paginated`] - lazy page-token-following iteration
//! - [`ProviderError`] - error type shared by every operation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  CredentialProvider  │── login ──▶ OAuthClient (consent flow)
//! └──────────┬───────────┘
//!            │ load
//!            ▼
//! ┌──────────────────────┐
//! │     TokenManager     │── refresh ──▶ token endpoint
//! └──────────┬───────────┘
//!            ▼
//!       TokenStore (token.json)
//!
//!   Credentials
//!        │
//!        ├──▶ GoogleCalendarClient ──▶ EventManager
//!        └──▶ GoogleDriveClient    ──▶ FileCache
//! ```
//!
//! All calls are blocking and go through a [`Transport`].

pub mod auth;
pub mod calendar;
pub mod config;
pub mod drive;
pub mod error;
pub mod pagination;
pub mod transport;

#[cfg(test)]
mod testing;

pub use auth::{CallbackBind, CredentialProvider, Credentials, TokenManager, TokenStore};
pub use config::GoogleConfig;
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use pagination::{Page, Paginated};
pub use transport::{ReqwestTransport, Transport};
