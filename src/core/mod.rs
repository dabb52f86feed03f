pub mod diff;
pub mod engine;
pub mod fingerprint;
pub mod gate;
pub mod prune;
pub mod snapshot;

pub use diff::{annotate_dataset, diff, diff_dataset};
pub use engine::{SyncEngine, SyncReport, SyncStage};
pub use fingerprint::{fingerprint_bytes, fingerprint_file};
pub use gate::{datasets_needing_fetch, delisted_datasets};
pub use prune::{prune, PruneReport};
pub use snapshot::{DatasetBuildOutcome, SnapshotBuilder};
