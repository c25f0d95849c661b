use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use gdmirror_core::{Drive, File, Folder};

use super::{Datastore, StoreError};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const UPSERT_DRIVE: &str = "\
    INSERT INTO drive (id, page_token) VALUES (?1, ?2)
    ON CONFLICT(id) DO UPDATE SET
        page_token = excluded.page_token";

const UPSERT_FOLDER: &str = "\
    INSERT INTO folder (id, drive, name, parent, trashed) VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(id, drive) DO UPDATE SET
        name = excluded.name,
        parent = excluded.parent,
        trashed = excluded.trashed";

const UPSERT_FILE: &str = "\
    INSERT INTO file (id, drive, name, md5, parent, size, trashed)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(id, drive) DO UPDATE SET
        name = excluded.name,
        md5 = excluded.md5,
        parent = excluded.parent,
        size = excluded.size,
        trashed = excluded.trashed";

const GET_PAGE_TOKEN: &str = "SELECT page_token FROM drive WHERE id = ?1";
const GET_FOLDER: &str = "SELECT name, parent, trashed FROM folder WHERE drive = ?1 AND id = ?2";
const GET_FILE: &str =
    "SELECT name, parent, trashed, size, md5 FROM file WHERE drive = ?1 AND id = ?2";

/// SQLite-backed mirror store.
///
/// Foreign keys on the folder hierarchy are deferred to commit, so a batch
/// that removes a whole subtree resolves even though single statements within
/// it would dangle; an incomplete batch still fails the commit.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        // A single connection keeps every query on the same in-memory
        // database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().in_memory(true).foreign_keys(true))
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Looks up one folder row, drive-scoped.
    pub async fn folder(&self, drive_id: &str, id: &str) -> Result<Option<Folder>, StoreError> {
        let row = sqlx::query(GET_FOLDER)
            .bind(drive_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Folder {
            id: id.to_string(),
            name: row.try_get("name")?,
            parent: row.try_get("parent")?,
            trashed: row.try_get("trashed")?,
        }))
    }

    /// Looks up one file row, drive-scoped.
    pub async fn file(&self, drive_id: &str, id: &str) -> Result<Option<File>, StoreError> {
        let row = sqlx::query(GET_FILE)
            .bind(drive_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(File {
            id: id.to_string(),
            name: row.try_get("name")?,
            parent: row.try_get("parent")?,
            trashed: row.try_get("trashed")?,
            size: row.try_get("size")?,
            md5: row.try_get("md5")?,
        }))
    }
}

#[async_trait]
impl Datastore for SqliteStore {
    async fn full_sync(
        &self,
        drive: &Drive,
        folders: &[Folder],
        files: &[File],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        upsert_drive(&mut tx, drive).await?;

        // The drive doubles as the root folder anchoring the hierarchy.
        upsert_folder(&mut tx, &drive.id, &root_folder(drive)).await?;

        for folder in folders {
            upsert_folder(&mut tx, &drive.id, folder).await?;
        }

        for file in files {
            upsert_file(&mut tx, &drive.id, file).await?;
        }

        tx.commit().await.map_err(write_error)?;
        Ok(())
    }

    async fn partial_sync(
        &self,
        drive: &Drive,
        changed_folders: &[Folder],
        changed_files: &[File],
        removed_ids: &[String],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        upsert_drive(&mut tx, drive).await?;

        // The name is only carried when the drive was renamed.
        if !drive.name.is_empty() {
            upsert_folder(&mut tx, &drive.id, &root_folder(drive)).await?;
        }

        for folder in changed_folders {
            upsert_folder(&mut tx, &drive.id, folder).await?;
        }

        for file in changed_files {
            upsert_file(&mut tx, &drive.id, file).await?;
        }

        if !removed_ids.is_empty() {
            // Files go first so folders only have folders left to check.
            delete_rows(&mut tx, "file", &drive.id, removed_ids).await?;
            delete_rows(&mut tx, "folder", &drive.id, removed_ids).await?;
        }

        tx.commit().await.map_err(write_error)?;
        Ok(())
    }

    async fn page_token(&self, drive_id: &str) -> Result<String, StoreError> {
        let row = sqlx::query(GET_PAGE_TOKEN)
            .bind(drive_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(StoreError::FullSyncRequired);
        };

        Ok(row.try_get("page_token")?)
    }
}

fn root_folder(drive: &Drive) -> Folder {
    Folder {
        id: drive.id.clone(),
        name: drive.name.clone(),
        parent: None,
        trashed: false,
    }
}

async fn upsert_drive(tx: &mut Transaction<'_, Sqlite>, drive: &Drive) -> Result<(), StoreError> {
    sqlx::query(UPSERT_DRIVE)
        .bind(&drive.id)
        .bind(&drive.page_token)
        .execute(&mut **tx)
        .await
        .map_err(write_error)?;
    Ok(())
}

async fn upsert_folder(
    tx: &mut Transaction<'_, Sqlite>,
    drive_id: &str,
    folder: &Folder,
) -> Result<(), StoreError> {
    sqlx::query(UPSERT_FOLDER)
        .bind(&folder.id)
        .bind(drive_id)
        .bind(&folder.name)
        .bind(folder.parent.as_deref())
        .bind(folder.trashed)
        .execute(&mut **tx)
        .await
        .map_err(write_error)?;
    Ok(())
}

async fn upsert_file(
    tx: &mut Transaction<'_, Sqlite>,
    drive_id: &str,
    file: &File,
) -> Result<(), StoreError> {
    sqlx::query(UPSERT_FILE)
        .bind(&file.id)
        .bind(drive_id)
        .bind(&file.name)
        .bind(&file.md5)
        .bind(&file.parent)
        .bind(file.size)
        .bind(file.trashed)
        .execute(&mut **tx)
        .await
        .map_err(write_error)?;
    Ok(())
}

async fn delete_rows(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    drive_id: &str,
    ids: &[String],
) -> Result<(), StoreError> {
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("DELETE FROM {table} WHERE id IN ({placeholders}) AND drive = ?");

    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }

    query
        .bind(drive_id)
        .execute(&mut **tx)
        .await
        .map_err(write_error)?;
    Ok(())
}

fn write_error(err: sqlx::Error) -> StoreError {
    if is_integrity_violation(&err) {
        StoreError::DataAnomaly
    } else {
        StoreError::Database(err)
    }
}

fn is_integrity_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => !matches!(db.kind(), sqlx::error::ErrorKind::Other),
        _ => false,
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
