//! Google Drive API v3 client.
//!
//! Only what the file cache needs: folder lookup by name, file listing with a
//! search query, and media download.

use std::io::Write;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, error};

use crate::auth::Credentials;
use crate::error::{ProviderError, ProviderResult};
use crate::pagination::{ListResponse, Page};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// MIME type Drive assigns to folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Bytes requested per ranged download request.
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Partial response selector used by every listing.
const LIST_FIELDS: &str = "nextPageToken, files(id, name)";

const LIST_PAGE_SIZE: u32 = 100;

/// The file fields this crate reads.
///
/// See <https://developers.google.com/drive/api/reference/rest/v3/files#File>.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
}

impl FileMetadata {
    /// Creates metadata from an id and a name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Parameters of a `files.list` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileQuery {
    /// Search query (`q`); `None` lists everything visible to the user.
    pub q: Option<String>,
    /// Sort order, e.g. `name desc`.
    pub order_by: Option<String>,
    /// Page size.
    pub page_size: u32,
}

impl FileQuery {
    /// Folders called exactly `name`.
    pub fn folder_named(name: &str) -> Self {
        Self {
            q: Some(format!(
                "mimeType = '{FOLDER_MIME_TYPE}' and name = '{}'",
                escape_query_value(name)
            )),
            order_by: None,
            page_size: LIST_PAGE_SIZE,
        }
    }

    /// Children of `folder_id` whose name contains `name_contains`, sorted by
    /// name descending.
    pub fn in_folder(folder_id: &str, name_contains: &str) -> Self {
        Self {
            q: Some(format!(
                "'{}' in parents and name contains '{}'",
                escape_query_value(folder_id),
                escape_query_value(name_contains)
            )),
            order_by: Some("name desc".to_string()),
            page_size: LIST_PAGE_SIZE,
        }
    }

    /// Every file, unfiltered.
    pub fn all(page_size: u32) -> Self {
        Self {
            q: None,
            order_by: None,
            page_size,
        }
    }
}

/// Escapes a value for use inside a single-quoted Drive query string.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// File operations on one Google account.
pub trait DriveApi {
    /// Returns the id of the first folder called `name`.
    fn find_folder(&self, name: &str) -> ProviderResult<Option<String>>;

    /// Fetches one page of files matching `query`.
    fn list_files(
        &self,
        query: &FileQuery,
        page_token: Option<&str>,
    ) -> ProviderResult<Page<FileMetadata>>;

    /// Streams the content of `file_id` into `out` and returns the byte count.
    fn download_file(&self, file_id: &str, out: &mut dyn Write) -> ProviderResult<u64>;
}

/// [`DriveApi`] over the REST endpoints.
#[derive(Clone)]
pub struct GoogleDriveClient {
    transport: Arc<dyn Transport>,
    access_token: String,
    base_url: String,
    chunk_size: u64,
}

impl GoogleDriveClient {
    /// Creates a client authorized by `credentials`.
    pub fn new(transport: Arc<dyn Transport>, credentials: &Credentials) -> ProviderResult<Self> {
        let access_token = credentials
            .bearer()
            .ok_or_else(|| ProviderError::authentication("credentials carry no access token"))?;
        Ok(Self {
            transport,
            access_token: access_token.to_string(),
            base_url: DRIVE_API_BASE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the download chunk size (at least one byte).
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Lists the first `page_size` files visible to the user.
    pub fn list_root_files(&self, page_size: u32) -> ProviderResult<Vec<FileMetadata>> {
        Ok(self.list_files(&FileQuery::all(page_size), None)?.items)
    }

    fn execute(&self, request: HttpRequest) -> ProviderResult<HttpResponse> {
        self.transport
            .execute(request.bearer(&self.access_token))
            .inspect_err(|e| error!("drive request failed: {}", e))
    }

    fn send(&self, request: HttpRequest) -> ProviderResult<HttpResponse> {
        self.execute(request)?
            .error_for_status()
            .inspect_err(|e| error!("drive request failed: {}", e))
    }
}

impl DriveApi for GoogleDriveClient {
    fn find_folder(&self, name: &str) -> ProviderResult<Option<String>> {
        let page = self.list_files(&FileQuery::folder_named(name), None)?;
        let id = page.items.into_iter().next().map(|f| f.id);
        debug!("folder {:?} resolved to {:?}", name, id);
        Ok(id)
    }

    fn list_files(
        &self,
        query: &FileQuery,
        page_token: Option<&str>,
    ) -> ProviderResult<Page<FileMetadata>> {
        let mut request = HttpRequest::get(format!("{}/files", self.base_url))
            .query("pageSize", query.page_size.to_string())
            .query("fields", LIST_FIELDS);
        if let Some(ref q) = query.q {
            request = request.query("q", q);
        }
        if let Some(ref order_by) = query.order_by {
            request = request.query("orderBy", order_by);
        }
        if let Some(token) = page_token {
            request = request.query("pageToken", token);
        }

        Ok(self
            .send(request)?
            .json::<ListResponse<FileMetadata>>()?
            .into())
    }

    fn download_file(&self, file_id: &str, out: &mut dyn Write) -> ProviderResult<u64> {
        let url = format!("{}/files/{}", self.base_url, urlencoding::encode(file_id));
        let mut offset: u64 = 0;

        loop {
            let last = offset.saturating_add(self.chunk_size - 1);
            let request = HttpRequest::get(&url)
                .query("alt", "media")
                .header("Range", format!("bytes={offset}-{last}"));
            let response = self.execute(request)?;

            match response.status {
                // Range past the end: nothing (more) to read.
                416 => {
                    debug!("Download 100%.");
                    return Ok(offset);
                }
                // The server ignored the range and sent the whole file.
                200 if offset == 0 => {
                    write_chunk(out, &response.body)?;
                    debug!("Download 100%.");
                    return Ok(offset + response.body.len() as u64);
                }
                206 => {
                    let total = content_range_total(&response)
                        .inspect_err(|e| error!("drive download failed: {}", e))?;
                    write_chunk(out, &response.body)?;
                    let received = response.body.len() as u64;
                    offset += received;

                    match total {
                        Some(total) => {
                            debug!("Download {}%.", offset.min(total) * 100 / total.max(1));
                            if offset >= total {
                                return Ok(offset);
                            }
                        }
                        None => debug!("Downloaded {} bytes.", offset),
                    }

                    if received == 0 {
                        let err = ProviderError::invalid_response(format!(
                            "empty partial response at offset {offset}"
                        ));
                        error!("drive download failed: {}", err);
                        return Err(err);
                    }
                    if total.is_none() && received < self.chunk_size {
                        return Ok(offset);
                    }
                }
                200 => {
                    let err = ProviderError::invalid_response(format!(
                        "full response after {offset} bytes of partial content"
                    ));
                    error!("drive download failed: {}", err);
                    return Err(err);
                }
                status => {
                    let err = response.error_for_status().err().unwrap_or_else(|| {
                        ProviderError::invalid_response(format!(
                            "unexpected download status {status}"
                        ))
                    });
                    error!("drive download failed: {}", err);
                    return Err(err);
                }
            }
        }
    }
}

fn write_chunk(out: &mut dyn Write, bytes: &[u8]) -> ProviderResult<()> {
    out.write_all(bytes).map_err(|e| {
        ProviderError::internal(format!("failed to write downloaded data: {e}")).with_source(e)
    })
}

/// Total size from `Content-Range: bytes <first>-<last>/<total>`; `None`
/// when the server reports `*`.
fn content_range_total(response: &HttpResponse) -> ProviderResult<Option<u64>> {
    let header = response
        .header("content-range")
        .ok_or_else(|| ProviderError::invalid_response("partial response without Content-Range"))?;

    let total = header
        .rsplit_once('/')
        .map(|(_, total)| total.trim())
        .ok_or_else(|| {
            ProviderError::invalid_response(format!("malformed Content-Range: {header}"))
        })?;

    if total == "*" {
        return Ok(None);
    }
    total.parse().map(Some).map_err(|_| {
        ProviderError::invalid_response(format!("malformed Content-Range: {header}"))
    })
}
