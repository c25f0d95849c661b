use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::auth::TokenProvider;
use crate::backoff::Backoff;
use crate::hierarchy::order_folders_on_hierarchy;
use crate::types::{ChangeSet, Drive, File, Folder};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const PAGE_SIZE: &str = "1000";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const FILE_FIELDS: &str =
    "nextPageToken,files(id,name,mimeType,parents,md5Checksum,size,trashed)";
const CHANGE_FIELDS: &str = "nextPageToken,newStartPageToken,changes(driveId,fileId,removed,\
     drive(id,name),file(id,driveId,name,mimeType,parents,md5Checksum,size,trashed))";

/// Injectable sleep primitive so tests can observe the retry schedule
/// without waiting it out.
pub type SleepFn =
    Arc<dyn Fn(Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("token provider failed: {0}")]
    Token(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("shared drive not found: {0}")]
    NotFound(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid base url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {message}")]
    Api { status: StatusCode, message: String },
}

/// Authenticated client for the catalog API of one Shared Drive.
///
/// Every request carries a fresh bearer token from the provider and is
/// retried with exponential backoff on rate-limit and server errors.
#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    drive_id: String,
    auth: Arc<dyn TokenProvider>,
    backoff: Backoff,
    sleep: SleepFn,
}

impl DriveClient {
    pub fn new(
        drive_id: impl Into<String>,
        auth: Arc<dyn TokenProvider>,
    ) -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_BASE_URL, drive_id, auth)
    }

    pub fn with_base_url(
        base_url: &str,
        drive_id: impl Into<String>,
        auth: Arc<dyn TokenProvider>,
    ) -> Result<Self, FetchError> {
        // A trailing slash keeps Url::join from swallowing the base path.
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            http: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: Url::parse(&base)?,
            drive_id: drive_id.into(),
            auth,
            backoff: Backoff::default(),
            sleep: Arc::new(|duration| -> Pin<Box<dyn Future<Output = ()> + Send>> {
                Box::pin(tokio::time::sleep(duration))
            }),
        })
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_sleep_fn(mut self, sleep: SleepFn) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn drive_id(&self) -> &str {
        &self.drive_id
    }

    /// Fetches the drive's display name.
    pub async fn drive_name(&self) -> Result<String, FetchError> {
        let mut url = self.endpoint(&format!("drives/{}", self.drive_id))?;
        url.query_pairs_mut().append_pair("fields", "name");

        let response: DriveNameResponse = self.get_json(url).await?;
        Ok(response.name)
    }

    /// Fetches the cursor representing "now" in the drive's change stream.
    pub async fn start_page_token(&self) -> Result<String, FetchError> {
        let mut url = self.endpoint("changes/startPageToken")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("driveId", &self.drive_id);
            query.append_pair("supportsAllDrives", "true");
        }

        let response: StartPageTokenResponse = self.get_json(url).await?;
        Ok(response.start_page_token)
    }

    /// Fetches the complete catalog of the drive, folders ordered so that
    /// every folder precedes its descendants.
    pub async fn all_content(&self) -> Result<(Vec<Folder>, Vec<File>), FetchError> {
        let mut folders = Vec::new();
        let mut files = Vec::new();
        let mut page_token = String::new();

        loop {
            let mut url = self.endpoint("files")?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("corpora", "drive");
                query.append_pair("driveId", &self.drive_id);
                query.append_pair("pageSize", PAGE_SIZE);
                query.append_pair("includeItemsFromAllDrives", "true");
                query.append_pair("supportsAllDrives", "true");
                query.append_pair("fields", FILE_FIELDS);
                if !page_token.is_empty() {
                    query.append_pair("pageToken", &page_token);
                }
            }

            let response: FileListResponse = self.get_json(url).await?;

            let (new_folders, new_files) = convert(response.files);
            folders.extend(new_folders);
            files.extend(new_files);

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = token,
                _ => break,
            }
        }

        Ok((order_folders_on_hierarchy(folders), files))
    }

    /// Fetches all changes since `page_token` and folds them into one batch.
    ///
    /// The returned drive name is empty unless a rename was observed, and the
    /// returned page token is the cursor to persist once the batch commits.
    pub async fn changed_content(&self, page_token: &str) -> Result<ChangeSet, FetchError> {
        let mut folders = Vec::new();
        let mut files = Vec::new();
        let mut removed_ids = Vec::new();

        let mut drive = Drive {
            id: self.drive_id.clone(),
            ..Drive::default()
        };
        let mut page_token = page_token.to_string();

        loop {
            let mut url = self.endpoint("changes")?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("driveId", &self.drive_id);
                query.append_pair("pageSize", PAGE_SIZE);
                query.append_pair("pageToken", &page_token);
                query.append_pair("includeItemsFromAllDrives", "true");
                query.append_pair("supportsAllDrives", "true");
                query.append_pair("fields", CHANGE_FIELDS);
            }

            let response: ChangeListResponse = self.get_json(url).await?;

            let mut changed_items = Vec::new();
            for change in response.changes {
                if change.file_id.is_empty() {
                    // Without a file id, the only change worth keeping is a
                    // drive rename; last one on the stream wins.
                    if !change.drive_id.is_empty() {
                        drive.name = change.drive.map(|d| d.name).unwrap_or_default();
                    }
                    continue;
                }

                let moved_out = change
                    .file
                    .as_ref()
                    .map_or(true, |file| file.drive_id != self.drive_id);

                if change.removed || moved_out {
                    removed_ids.push(change.file_id);
                } else if let Some(item) = change.file {
                    changed_items.push(item);
                }
            }

            let (changed_folders, changed_files) = convert(changed_items);
            folders.extend(changed_folders);
            files.extend(changed_files);

            drive.page_token = response.new_start_page_token.unwrap_or_default();

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = token,
                _ => break,
            }
        }

        Ok(ChangeSet {
            drive,
            changed_folders: order_folders_on_hierarchy(folders),
            changed_files: files,
            removed_ids,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T>(&self, url: Url) -> Result<T, FetchError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut attempt: u32 = 0;

        loop {
            let token = self
                .auth
                .access_token()
                .await
                .map_err(FetchError::Token)?;

            let response = self
                .http
                .get(url.clone())
                .header(header::AUTHORIZATION, format!("Bearer {}", token.secret))
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::OK {
                return Ok(response.json::<T>().await?);
            }

            let body = response.json::<ErrorResponse>().await.unwrap_or_default();

            match status.as_u16() {
                429 | 500 | 502 | 503 | 504 => {
                    self.pause(attempt).await;
                    attempt += 1;
                }
                401 => return Err(FetchError::InvalidCredentials),
                404 => return Err(FetchError::NotFound(body.error.message)),
                403 => match body.error.errors.first().map(|e| e.reason.as_str()) {
                    Some("userRateLimitExceeded") | Some("rateLimitExceeded") => {
                        self.pause(attempt).await;
                        attempt += 1;
                    }
                    _ => {
                        return Err(FetchError::Api {
                            status,
                            message: body.error.message,
                        })
                    }
                },
                _ => {
                    return Err(FetchError::Api {
                        status,
                        message: body.error.message,
                    })
                }
            }
        }
    }

    async fn pause(&self, attempt: u32) {
        (self.sleep)(self.backoff.delay(attempt)).await;
    }
}

/// Splits upstream items into folders and files by MIME type.
///
/// Only the first parent counts; upstream may list several but the mirror
/// keeps a tree. Items without any parent have no place in the hierarchy
/// and are dropped.
fn convert(items: Vec<DriveItem>) -> (Vec<Folder>, Vec<File>) {
    let mut folders = Vec::new();
    let mut files = Vec::new();

    for item in items {
        let Some(parent) = item.parents.into_iter().next() else {
            continue;
        };

        if item.mime_type == FOLDER_MIME_TYPE {
            folders.push(Folder {
                id: item.id,
                name: item.name,
                parent: Some(parent),
                trashed: item.trashed,
            });
        } else {
            files.push(File {
                id: item.id,
                name: item.name,
                parent,
                trashed: item.trashed,
                size: parse_size(item.size.as_deref()),
                md5: item.md5_checksum,
            });
        }
    }

    (folders, files)
}

// Upstream serialises the byte size as a quoted decimal; anything absent or
// unparseable counts as zero.
fn parse_size(size: Option<&str>) -> i64 {
    size.and_then(|raw| raw.parse().ok()).unwrap_or(0)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DriveItem {
    id: String,
    name: String,
    mime_type: String,
    parents: Vec<String>,
    md5_checksum: String,
    size: Option<String>,
    trashed: bool,
    drive_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SharedDriveRef {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DriveChange {
    drive_id: String,
    file_id: String,
    removed: bool,
    drive: Option<SharedDriveRef>,
    file: Option<DriveItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FileListResponse {
    files: Vec<DriveItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ChangeListResponse {
    changes: Vec<DriveChange>,
    next_page_token: Option<String>,
    new_start_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DriveNameResponse {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StartPageTokenResponse {
    start_page_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorResponse {
    error: ErrorPayload,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorPayload {
    errors: Vec<ApiErrorDetail>,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiErrorDetail {
    reason: String,
}
