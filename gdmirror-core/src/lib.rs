mod auth;
mod backoff;
mod client;
mod hierarchy;
mod types;

pub use auth::{AccessToken, TokenProvider};
pub use backoff::Backoff;
pub use client::{DriveClient, FetchError, SleepFn};
pub use hierarchy::{order_folders_on_hierarchy, root_folders};
pub use types::{ChangeSet, Drive, File, Folder};
