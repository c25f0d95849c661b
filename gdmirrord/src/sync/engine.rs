use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use gdmirror_core::{Drive, DriveClient, FetchError, File, Folder};

use crate::store::{Datastore, StoreError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
    #[error("hook failed: {0}")]
    Hook(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SyncError {
    /// True when the mirror hit a referential anomaly; the caller should
    /// give the upstream a moment to settle and retry.
    pub fn is_data_anomaly(&self) -> bool {
        matches!(self, SyncError::Store(StoreError::DataAnomaly))
    }

    /// True when no cursor is stored yet and a full sync must run first.
    pub fn requires_full_sync(&self) -> bool {
        matches!(self, SyncError::Store(StoreError::FullSyncRequired))
    }
}

/// Observes a fetched change batch before it is committed.
///
/// The drive argument always carries the drive id; its name is non-empty
/// only when the drive was renamed within the batch. Files and folders
/// arrive in their new state, folders parent-first. Removed items are given
/// by id only; their last-known state can still be read from the store,
/// because hooks run before the commit.
#[async_trait]
pub trait SyncHook: Send {
    async fn on_changes(
        &mut self,
        drive: &Drive,
        files: &[File],
        folders: &[Folder],
        removed_ids: &[String],
    ) -> Result<(), SyncError>;
}

/// Binds the catalog client to a datastore and drives both sync flows.
pub struct SyncEngine<S> {
    client: DriveClient,
    store: S,
    safe_sleep: Duration,
}

impl<S: Datastore> SyncEngine<S> {
    pub fn new(client: DriveClient, store: S) -> Self {
        Self {
            client,
            store,
            safe_sleep: Duration::ZERO,
        }
    }

    /// Wait this long between capturing the change cursor and reading the
    /// snapshot, giving upstream time to settle in-flight changes.
    pub fn with_safe_sleep(mut self, safe_sleep: Duration) -> Self {
        self.safe_sleep = safe_sleep;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mirrors the entire drive catalog into the store.
    pub async fn full_sync(&self) -> Result<(), SyncError> {
        // Cursor first: changes landing while the snapshot is read are
        // replayed by the next partial sync instead of being lost.
        let page_token = self.client.start_page_token().await?;

        if !self.safe_sleep.is_zero() {
            tokio::time::sleep(self.safe_sleep).await;
        }

        let name = self.client.drive_name().await?;
        let (folders, files) = self.client.all_content().await?;

        let drive = Drive {
            id: self.client.drive_id().to_string(),
            name,
            page_token,
        };

        self.store.full_sync(&drive, &folders, &files).await?;
        Ok(())
    }

    /// Applies all upstream changes since the stored cursor.
    ///
    /// Hooks run in order between fetch and commit; any hook error aborts
    /// the sync before anything is written.
    pub async fn partial_sync(&self, hooks: &mut [&mut dyn SyncHook]) -> Result<(), SyncError> {
        let page_token = self.store.page_token(self.client.drive_id()).await?;

        let diff = self.client.changed_content(&page_token).await?;

        // Upstream handed back the same cursor: nothing new to apply.
        if diff.drive.page_token == page_token {
            return Ok(());
        }

        for hook in hooks.iter_mut() {
            hook.on_changes(
                &diff.drive,
                &diff.changed_files,
                &diff.changed_folders,
                &diff.removed_ids,
            )
            .await?;
        }

        self.store
            .partial_sync(
                &diff.drive,
                &diff.changed_folders,
                &diff.changed_files,
                &diff.removed_ids,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
