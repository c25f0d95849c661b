/// A Shared Drive, the top-level container of folders and files.
///
/// The page token marks the position in the upstream change stream up to
/// which the local mirror is known to be complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drive {
    pub id: String,
    pub name: String,
    pub page_token: String,
}

/// A folder within a Shared Drive. The parent is `None` only for the
/// synthetic root folder that anchors the drive itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub parent: Option<String>,
    pub trashed: bool,
}

/// Any non-folder item within a Shared Drive. The MD5 checksum may be empty
/// for items the upstream does not hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    pub id: String,
    pub name: String,
    pub parent: String,
    pub trashed: bool,
    pub size: i64,
    pub md5: String,
}

/// The decoded result of one incremental fetch cycle.
///
/// `drive.name` is empty unless the drive was renamed within the batch, and
/// `drive.page_token` carries the cursor to commit once the batch is applied.
/// Changed folders are ordered parent-first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub drive: Drive,
    pub changed_folders: Vec<Folder>,
    pub changed_files: Vec<File>,
    pub removed_ids: Vec<String>,
}
