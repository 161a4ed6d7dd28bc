//! Persistence for incremental build metadata.
//!
//! A project keeps exactly one `(BuildMetadata, BuildSetup)` entry. It is read
//! at the start of a run and replaced as a whole at the end of a successful one.
//!
//! - [`FileStore`]: bincode file, versioned, written atomically
//! - [`CachedStore`]: memoizing decorator over any [`MetadataStore`]
//! - [`shared_store`]: one [`CachedStore`] per location for the whole process
//! - [`RunScope`]: serializes runs on a location across threads and processes
//!
//! Corrupt or foreign-version files read as "no previous analysis"; only
//! genuine I/O failures are reported as [`StoreError`].

mod error;
mod lock;
mod scope;
mod store;
mod util;

pub use error::{Result, StoreError};
pub use lock::{lock_path_for, StoreLock};
pub use scope::RunScope;
pub use store::{
    shared_store, CachedStore, FileStore, MetadataStore, StoreEntry, ANALYSIS_SCHEMA_VERSION,
};
pub use util::ANALYSIS_PAYLOAD_LIMIT_BYTES;
