use super::*;

const DRIVE_ID: &str = "drive1";

async fn make_store() -> SqliteStore {
    SqliteStore::open_in_memory().await.unwrap()
}

fn drive(page_token: &str) -> Drive {
    Drive {
        id: DRIVE_ID.to_string(),
        name: "Drive One".to_string(),
        page_token: page_token.to_string(),
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

/// drive1 containing folder A with subfolder B, which holds file Z.
async fn seeded_store() -> SqliteStore {
    let store = make_store().await;
    store
        .full_sync(
            &drive("100"),
            &[folder("A", DRIVE_ID), folder("B", "A")],
            &[file("Z", "B")],
        )
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn full_sync_persists_the_catalog() {
    let store = seeded_store().await;

    assert_eq!(store.page_token(DRIVE_ID).await.unwrap(), "100");

    let root = store.folder(DRIVE_ID, DRIVE_ID).await.unwrap().unwrap();
    assert_eq!(root.name, "Drive One");
    assert_eq!(root.parent, None);
    assert!(!root.trashed);

    assert_eq!(store.folder(DRIVE_ID, "A").await.unwrap(), Some(folder("A", DRIVE_ID)));
    assert_eq!(store.folder(DRIVE_ID, "B").await.unwrap(), Some(folder("B", "A")));
    assert_eq!(store.file(DRIVE_ID, "Z").await.unwrap(), Some(file("Z", "B")));
}

#[tokio::test]
async fn open_creates_the_database_file_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mirror").join("mirror.db");

    {
        let store = SqliteStore::open(&path).await.unwrap();
        store.full_sync(&drive("100"), &[], &[]).await.unwrap();
    }

    let reopened = SqliteStore::open(&path).await.unwrap();
    assert_eq!(reopened.page_token(DRIVE_ID).await.unwrap(), "100");
}

#[tokio::test]
async fn page_token_without_state_requires_full_sync() {
    let store = make_store().await;

    let err = store.page_token(DRIVE_ID).await.unwrap_err();

    assert!(matches!(err, StoreError::FullSyncRequired));
}

#[tokio::test]
async fn lookups_are_scoped_to_the_drive() {
    let store = seeded_store().await;

    assert_eq!(store.folder("otherDrive", "A").await.unwrap(), None);
    assert_eq!(store.file("otherDrive", "Z").await.unwrap(), None);
}

#[tokio::test]
async fn full_sync_with_unknown_parent_rolls_back() {
    let store = make_store().await;

    let err = store
        .full_sync(&drive("100"), &[folder("B", "missing")], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::DataAnomaly));
    assert!(matches!(
        store.page_token(DRIVE_ID).await.unwrap_err(),
        StoreError::FullSyncRequired
    ));
    assert_eq!(store.folder(DRIVE_ID, "B").await.unwrap(), None);
}

#[tokio::test]
async fn full_sync_upserts_over_previous_state() {
    let store = seeded_store().await;

    let mut changed = file("Z", "B");
    changed.size = 999;
    changed.trashed = true;

    store
        .full_sync(
            &drive("200"),
            &[folder("A", DRIVE_ID), folder("B", "A")],
            &[changed.clone()],
        )
        .await
        .unwrap();

    assert_eq!(store.page_token(DRIVE_ID).await.unwrap(), "200");
    assert_eq!(store.file(DRIVE_ID, "Z").await.unwrap(), Some(changed));
}

#[tokio::test]
async fn partial_sync_advances_the_cursor() {
    let store = seeded_store().await;

    let batch_drive = Drive {
        name: String::new(),
        ..drive("101")
    };
    store.partial_sync(&batch_drive, &[], &[], &[]).await.unwrap();

    assert_eq!(store.page_token(DRIVE_ID).await.unwrap(), "101");
    // No rename in the batch, so the root keeps its name.
    let root = store.folder(DRIVE_ID, DRIVE_ID).await.unwrap().unwrap();
    assert_eq!(root.name, "Drive One");
}

#[tokio::test]
async fn partial_sync_renames_the_root_folder() {
    let store = seeded_store().await;

    let batch_drive = Drive {
        name: "Drive Reborn".to_string(),
        ..drive("101")
    };
    store.partial_sync(&batch_drive, &[], &[], &[]).await.unwrap();

    let root = store.folder(DRIVE_ID, DRIVE_ID).await.unwrap().unwrap();
    assert_eq!(root.name, "Drive Reborn");
}

#[tokio::test]
async fn partial_sync_upserts_changed_items() {
    let store = seeded_store().await;

    store
        .partial_sync(
            &drive("101"),
            &[folder("C", "A")],
            &[file("Y", "C")],
            &[],
        )
        .await
        .unwrap();

    assert_eq!(store.folder(DRIVE_ID, "C").await.unwrap(), Some(folder("C", "A")));
    assert_eq!(store.file(DRIVE_ID, "Y").await.unwrap(), Some(file("Y", "C")));
}

#[tokio::test]
async fn partial_sync_removes_a_whole_subtree() {
    let store = seeded_store().await;

    store
        .partial_sync(
            &drive("101"),
            &[],
            &[],
            &["A".to_string(), "B".to_string(), "Z".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(store.folder(DRIVE_ID, "A").await.unwrap(), None);
    assert_eq!(store.folder(DRIVE_ID, "B").await.unwrap(), None);
    assert_eq!(store.file(DRIVE_ID, "Z").await.unwrap(), None);
    // The root anchor is untouched.
    assert!(store.folder(DRIVE_ID, DRIVE_ID).await.unwrap().is_some());
}

#[tokio::test]
async fn incomplete_removal_rolls_back_unchanged() {
    let store = seeded_store().await;

    // Folder B still holds file Z, which the batch does not remove.
    let err = store
        .partial_sync(&drive("101"), &[], &[], &["B".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::DataAnomaly));
    assert_eq!(store.page_token(DRIVE_ID).await.unwrap(), "100");
    assert_eq!(store.folder(DRIVE_ID, "B").await.unwrap(), Some(folder("B", "A")));
    assert_eq!(store.file(DRIVE_ID, "Z").await.unwrap(), Some(file("Z", "B")));
}

#[tokio::test]
async fn partial_sync_rejects_files_with_unknown_parents() {
    let store = seeded_store().await;

    let err = store
        .partial_sync(&drive("101"), &[], &[file("Y", "missing")], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::DataAnomaly));
    assert_eq!(store.page_token(DRIVE_ID).await.unwrap(), "100");
    assert_eq!(store.file(DRIVE_ID, "Y").await.unwrap(), None);
}
