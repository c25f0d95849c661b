use async_trait::async_trait;

use gdmirror_core::{Drive, File, Folder};

use super::sqlite::SqliteStore;
use super::StoreError;
use crate::sync::{SyncError, SyncHook};

/// All added, changed and removed files and folders between two states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Difference {
    pub added_files: Vec<File>,
    pub changed_files: Vec<File>,
    pub removed_files: Vec<File>,

    pub added_folders: Vec<Folder>,
    pub changed_folders: Vec<Folder>,
    pub removed_folders: Vec<Folder>,
}

/// A sync hook that classifies each change batch against the current store
/// state.
///
/// Hooks run before the batch commits, so every lookup observes the previous
/// state of the mirror. Removed items are reported in their last-known state;
/// a removed id that matches nothing in the store is the same anomaly class
/// as a broken reference.
pub struct DifferenceHook {
    store: SqliteStore,
    difference: Difference,
}

impl DifferenceHook {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            store,
            difference: Difference::default(),
        }
    }

    pub fn difference(&self) -> &Difference {
        &self.difference
    }

    pub fn into_difference(self) -> Difference {
        self.difference
    }
}

#[async_trait]
impl SyncHook for DifferenceHook {
    async fn on_changes(
        &mut self,
        drive: &Drive,
        files: &[File],
        folders: &[Folder],
        removed_ids: &[String],
    ) -> Result<(), SyncError> {
        for folder in folders {
            match self.store.folder(&drive.id, &folder.id).await? {
                None => self.difference.added_folders.push(folder.clone()),
                Some(previous) if previous != *folder => {
                    self.difference.changed_folders.push(folder.clone());
                }
                Some(_) => {}
            }
        }

        for file in files {
            match self.store.file(&drive.id, &file.id).await? {
                None => self.difference.added_files.push(file.clone()),
                Some(previous) if previous != *file => {
                    self.difference.changed_files.push(file.clone());
                }
                Some(_) => {}
            }
        }

        for id in removed_ids {
            if let Some(file) = self.store.file(&drive.id, id).await? {
                self.difference.removed_files.push(file);
            } else if let Some(folder) = self.store.folder(&drive.id, id).await? {
                self.difference.removed_folders.push(folder);
            } else {
                return Err(SyncError::Store(StoreError::DataAnomaly));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Datastore;

    const DRIVE_ID: &str = "drive1";

    fn drive() -> Drive {
        Drive {
            id: DRIVE_ID.to_string(),
            name: String::new(),
            page_token: "100".to_string(),
        }
    }

    fn folder(id: &str, parent: &str) -> Folder {
        Folder {
            id: id.to_string(),
            name: format!("folder {id}"),
            parent: Some(parent.to_string()),
            trashed: false,
        }
    }

    fn file(id: &str, parent: &str) -> File {
        File {
            id: id.to_string(),
            name: format!("file {id}"),
            parent: parent.to_string(),
            trashed: false,
            size: 10,
            md5: format!("md5 {id}"),
        }
    }

    async fn seeded_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store
            .full_sync(
                &Drive {
                    name: "Drive One".to_string(),
                    ..drive()
                },
                &[folder("A", DRIVE_ID)],
                &[file("Z", "A"), file("W", "A")],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn classifies_added_changed_and_removed() {
        let store = seeded_store().await;
        let mut hook = DifferenceHook::new(store);

        let mut changed = file("Z", "A");
        changed.size = 999;

        hook.on_changes(
            &drive(),
            &[changed.clone(), file("Y", "B")],
            &[folder("B", "A")],
            &["W".to_string()],
        )
        .await
        .unwrap();

        let difference = hook.into_difference();
        assert_eq!(difference.added_folders, vec![folder("B", "A")]);
        assert_eq!(difference.added_files, vec![file("Y", "B")]);
        assert_eq!(difference.changed_files, vec![changed]);
        assert!(difference.changed_folders.is_empty());
        assert_eq!(difference.removed_files, vec![file("W", "A")]);
        assert!(difference.removed_folders.is_empty());
    }

    #[tokio::test]
    async fn unchanged_items_are_not_reported() {
        let store = seeded_store().await;
        let mut hook = DifferenceHook::new(store);

        hook.on_changes(&drive(), &[file("Z", "A")], &[folder("A", DRIVE_ID)], &[])
            .await
            .unwrap();

        assert_eq!(hook.difference(), &Difference::default());
    }

    #[tokio::test]
    async fn removed_folders_are_reported_in_last_known_state() {
        let store = seeded_store().await;
        store
            .partial_sync(&drive(), &[folder("B", "A")], &[], &[])
            .await
            .unwrap();

        let mut hook = DifferenceHook::new(store);
        hook.on_changes(&drive(), &[], &[], &["B".to_string()])
            .await
            .unwrap();

        assert_eq!(hook.difference().removed_folders, vec![folder("B", "A")]);
    }

    #[tokio::test]
    async fn unknown_removed_id_is_a_data_anomaly() {
        let store = seeded_store().await;
        let mut hook = DifferenceHook::new(store);

        let err = hook
            .on_changes(&drive(), &[], &[], &["ghost".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Store(StoreError::DataAnomaly)));
    }
}
