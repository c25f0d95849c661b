mod engine;

pub use engine::{SyncEngine, SyncError, SyncHook};
