//! Download-once local copies of Drive files.
//!
//! A cached file lives at `<cache_dir>/<file name>`. If that path exists it is
//! returned as is: there is no eviction, no size check and no re-validation
//! against the remote copy.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::pagination::Paginated;

use super::client::{DriveApi, FileMetadata, FileQuery};

/// Local cache of Drive files keyed by file name.
pub struct FileCache<D> {
    drive: D,
    cache_dir: PathBuf,
}

impl<D: DriveApi> FileCache<D> {
    /// Creates a cache writing into `cache_dir` (created on first download).
    pub fn new(drive: D, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            drive,
            cache_dir: cache_dir.into(),
        }
    }

    /// Returns the cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns where `file_name` is (or would be) cached.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }

    /// Returns the local path of a file, downloading it only if that path does
    /// not exist yet.
    ///
    /// Content is written to a hidden `.part` file and renamed into place
    /// once complete, so an interrupted download never leaves a file that
    /// would be mistaken for a cached one.
    pub fn ensure_downloaded(&self, file_id: &str, file_name: &str) -> ProviderResult<PathBuf> {
        check_file_name(file_name)?;
        debug!("{} ({})", file_name, file_id);

        let path = self.path_for(file_name);
        if path.exists() {
            debug!("File already exists: {}", path.display());
            return Ok(path);
        }

        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to create cache directory {}: {e}",
                self.cache_dir.display()
            ))
            .with_source(e)
        })?;

        let part = self.part_path(file_name);
        match self.download_to(file_id, &part) {
            Ok(bytes) => {
                fs::rename(&part, &path).map_err(|e| {
                    ProviderError::internal(format!(
                        "failed to move download into {}: {e}",
                        path.display()
                    ))
                    .with_source(e)
                })?;
                info!("downloaded {} ({} bytes)", path.display(), bytes);
                Ok(path)
            }
            Err(e) => {
                let _ = fs::remove_file(&part);
                Err(e)
            }
        }
    }

    /// Temporary path for a download in progress. Hashed so that it stays
    /// within the file-name limit whatever the length of `file_name`.
    fn part_path(&self, file_name: &str) -> PathBuf {
        let digest = format!("{:x}", Sha256::digest(file_name.as_bytes()));
        self.cache_dir.join(format!(".{}.part", &digest[..16]))
    }

    fn download_to(&self, file_id: &str, part: &Path) -> ProviderResult<u64> {
        let io_error = |e: std::io::Error| {
            ProviderError::internal(format!("failed to write {}: {e}", part.display()))
                .with_source(e)
        };

        let mut file = File::create(part).map_err(io_error)?;
        let bytes = self.drive.download_file(file_id, &mut file)?;
        file.flush().map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        Ok(bytes)
    }

    /// Lazily yields the local paths of up to `n` files in `folder_name` whose
    /// name contains `name_contains`, in descending name order.
    ///
    /// Each file is downloaded when the iterator reaches it. Pages beyond the
    /// one holding the `n`th file are never requested. If the folder holds
    /// fewer matches, a warning is logged and the sequence is shorter.
    ///
    /// # Errors
    ///
    /// A not-found error if no folder called `folder_name` exists.
    pub fn get_first_n(
        &self,
        folder_name: &str,
        name_contains: &str,
        n: usize,
    ) -> ProviderResult<CachedFiles<'_, D>> {
        let folder_id = self.drive.find_folder(folder_name)?.ok_or_else(|| {
            ProviderError::not_found(format!("folder not found: {folder_name}"))
        })?;

        let query = FileQuery::in_folder(&folder_id, name_contains);
        let files = Paginated::new(move |token: Option<&str>| self.drive.list_files(&query, token));

        Ok(CachedFiles {
            cache: self,
            files: Box::new(files),
            folder_name: folder_name.to_string(),
            remaining: n,
        })
    }

    /// Returns the local path of the first matching file in `folder_name`.
    pub fn get_first(&self, folder_name: &str, name_contains: &str) -> ProviderResult<PathBuf> {
        self.get_first_n(folder_name, name_contains, 1)?
            .next()
            .unwrap_or_else(|| {
                Err(ProviderError::not_found(format!(
                    "no file containing {name_contains:?} in folder {folder_name}"
                )))
            })
    }
}

/// Iterator returned by [`FileCache::get_first_n`].
pub struct CachedFiles<'a, D> {
    cache: &'a FileCache<D>,
    files: Box<dyn Iterator<Item = ProviderResult<FileMetadata>> + 'a>,
    folder_name: String,
    remaining: usize,
}

impl<D: DriveApi> Iterator for CachedFiles<'_, D> {
    type Item = ProviderResult<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        match self.files.next() {
            Some(Ok(file)) => {
                self.remaining -= 1;
                Some(self.cache.ensure_downloaded(&file.id, &file.name))
            }
            Some(Err(e)) => {
                self.remaining = 0;
                Some(Err(e))
            }
            None => {
                warn!("No more files found in folder: {}", self.folder_name);
                self.remaining = 0;
                None
            }
        }
    }
}

/// Rejects names that would resolve outside the cache directory.
fn check_file_name(file_name: &str) -> ProviderResult<()> {
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ProviderError::invalid_response(format!(
            "file name {file_name:?} is not a plain file name"
        ))),
    }
}
