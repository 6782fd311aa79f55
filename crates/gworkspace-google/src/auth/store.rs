//! File-backed credential persistence.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

use super::credentials::Credentials;

/// Reads and writes one credentials file. Holds no state besides the path.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a store for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a token file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the credentials, applying `scopes` over the stored ones.
    ///
    /// Returns `Ok(None)` when no file exists.
    pub fn read(&self, scopes: &[String]) -> ProviderResult<Option<Credentials>> {
        if !self.path.exists() {
            debug!("no token file at {:?}", self.path);
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to read token file: {e}")).with_source(e)
        })?;

        let credentials = Credentials::from_json(&content, scopes).map_err(|e| {
            ProviderError::configuration(format!("failed to parse token file: {e}")).with_source(e)
        })?;

        debug!("loaded credentials from {:?}", self.path);
        Ok(Some(credentials))
    }

    /// Writes the credentials, replacing any previous file atomically.
    ///
    /// The content goes to a sibling temp file first and is then renamed over
    /// the target, so a crash mid-write leaves the previous file intact.
    pub fn write(&self, credentials: &Credentials) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!("failed to create token directory: {e}"))
                    .with_source(e)
            })?;
        }

        let content = credentials.to_json().map_err(|e| {
            ProviderError::internal(format!("failed to serialize credentials: {e}")).with_source(e)
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content).map_err(|e| {
            ProviderError::configuration(format!("failed to write token file: {e}")).with_source(e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to replace token file: {e}"))
                .with_source(e)
        })?;

        debug!("saved credentials to {:?}", self.path);
        Ok(())
    }

    /// Deletes the token file if present.
    pub fn clear(&self) -> ProviderResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                ProviderError::configuration(format!("failed to remove token file: {e}"))
                    .with_source(e)
            })?;
            info!("cleared credentials at {:?}", self.path);
        }
        Ok(())
    }
}
