use async_trait::async_trait;
use thiserror::Error;

use gdmirror_core::{Drive, File, Folder};

mod hook;
mod sqlite;

pub use hook::{Difference, DifferenceHook};
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A referential-integrity violation at commit, typically caused by
    /// upstream propagation lag. Wait a moment and retry the sync.
    #[error("data anomaly")]
    DataAnomaly,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no page token stored, run a full sync first")]
    FullSyncRequired,
}

/// Transactional persistence of one drive's mirror.
///
/// Every write operation carries a page token that must only become visible
/// when the whole batch commits; a failed batch leaves the store untouched.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Replaces the drive's state with a fresh snapshot in one transaction.
    ///
    /// The drive itself is inserted as the root folder, and the given folders
    /// are upserted in input order, so they must arrive parent-first.
    async fn full_sync(
        &self,
        drive: &Drive,
        folders: &[Folder],
        files: &[File],
    ) -> Result<(), StoreError>;

    /// Merges one change batch in one transaction: upserts changed folders
    /// and files, then deletes removed items, then commits the new cursor.
    async fn partial_sync(
        &self,
        drive: &Drive,
        changed_folders: &[Folder],
        changed_files: &[File],
        removed_ids: &[String],
    ) -> Result<(), StoreError>;

    /// The cursor the mirror currently reflects.
    async fn page_token(&self, drive_id: &str) -> Result<String, StoreError>;
}
