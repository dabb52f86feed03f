pub mod models;
pub mod store;

pub use models::{
    ChangeSet, DatasetChanges, DatasetMetadata, DatasetSnapshot, FileRecord, FileStatus,
    PersistedState, Snapshot,
};
pub use store::{StateLock, StateStore};
