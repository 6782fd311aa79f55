//! Google Drive access and the download-once file cache.
//!
//! # Example
//!
//! ```ignore
//! use gworkspace_google::drive::{DRIVE_SCOPES, FileCache, GoogleDriveClient};
//!
//! let credentials = provider.create()?;
//! let drive = GoogleDriveClient::new(config.transport()?, &credentials)?
//!     .with_chunk_size(config.download_chunk_size);
//! let cache = FileCache::new(drive, "/var/cache/reports");
//! let latest = cache.get_first("Monthly reports", ".csv")?;
//! ```

mod cache;
mod client;

pub use cache::{CachedFiles, FileCache};
pub use client::{
    DEFAULT_CHUNK_SIZE, DRIVE_API_BASE, DriveApi, FOLDER_MIME_TYPE, FileMetadata, FileQuery,
    GoogleDriveClient, escape_query_value,
};

/// Scopes required by [`GoogleDriveClient`].
pub const DRIVE_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive.metadata.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
];
