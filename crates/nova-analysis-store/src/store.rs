use crate::error::Result;
use crate::util::{atomic_write, bincode_deserialize, bincode_serialize, read_file_limited};
use nova_analysis::{BuildMetadata, BuildSetup};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

/// Version of the on-disk analysis format written by [`FileStore`].
pub const ANALYSIS_SCHEMA_VERSION: u32 = 2;

const NOVA_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What a store holds: the metadata of the last successful run and the setup
/// it ran under.
pub type StoreEntry = (BuildMetadata, BuildSetup);

/// Persistence for the single `(metadata, setup)` entry of one project.
///
/// `get` reports "nothing usable" as `Ok(None)`; `Err` is reserved for the
/// store itself being inaccessible. `set` replaces the whole entry.
pub trait MetadataStore: Send + Sync {
    fn location(&self) -> &Path;

    fn get(&self) -> Result<Option<StoreEntry>>;

    fn set(&self, metadata: &BuildMetadata, setup: &BuildSetup) -> Result<()>;
}

impl<S: MetadataStore + ?Sized> MetadataStore for Arc<S> {
    fn location(&self) -> &Path {
        (**self).location()
    }

    fn get(&self) -> Result<Option<StoreEntry>> {
        (**self).get()
    }

    fn set(&self, metadata: &BuildMetadata, setup: &BuildSetup) -> Result<()> {
        (**self).set(metadata, setup)
    }
}

impl<S: MetadataStore + ?Sized> MetadataStore for &S {
    fn location(&self) -> &Path {
        (**self).location()
    }

    fn get(&self) -> Result<Option<StoreEntry>> {
        (**self).get()
    }

    fn set(&self, metadata: &BuildMetadata, setup: &BuildSetup) -> Result<()> {
        (**self).set(metadata, setup)
    }
}

#[derive(Debug, Serialize)]
struct PersistedAnalysis<'a> {
    schema_version: u32,
    nova_version: &'a str,
    metadata: &'a BuildMetadata,
    setup: &'a BuildSetup,
}

#[derive(Debug, Deserialize)]
struct PersistedAnalysisOwned {
    schema_version: u32,
    nova_version: String,
    metadata: BuildMetadata,
    setup: BuildSetup,
}

/// A single bincode file holding one [`StoreEntry`].
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetadataStore for FileStore {
    fn location(&self) -> &Path {
        &self.path
    }

    fn get(&self) -> Result<Option<StoreEntry>> {
        let Some(bytes) = read_file_limited(&self.path)? else {
            return Ok(None);
        };

        let persisted: PersistedAnalysisOwned = match bincode_deserialize(&bytes) {
            Ok(persisted) => persisted,
            Err(err) => {
                tracing::debug!(
                    target: "nova.analysis_store",
                    path = %self.path.display(),
                    error = %err,
                    "stored analysis is unreadable; starting from scratch"
                );
                return Ok(None);
            }
        };

        if persisted.schema_version != ANALYSIS_SCHEMA_VERSION
            || persisted.nova_version != NOVA_VERSION
        {
            tracing::debug!(
                target: "nova.analysis_store",
                path = %self.path.display(),
                schema_version = persisted.schema_version,
                nova_version = %persisted.nova_version,
                "stored analysis was written by an incompatible version; ignoring it"
            );
            return Ok(None);
        }

        Ok(Some((persisted.metadata, persisted.setup)))
    }

    fn set(&self, metadata: &BuildMetadata, setup: &BuildSetup) -> Result<()> {
        let persisted = PersistedAnalysis {
            schema_version: ANALYSIS_SCHEMA_VERSION,
            nova_version: NOVA_VERSION,
            metadata,
            setup,
        };
        let bytes = bincode_serialize(&persisted)?;
        atomic_write(&self.path, &bytes)?;
        tracing::debug!(
            target: "nova.analysis_store",
            path = %self.path.display(),
            bytes = bytes.len(),
            "stored analysis"
        );
        Ok(())
    }
}

/// Memoizes the entry of an inner store.
///
/// Observationally the same as the inner store as long as nothing else writes
/// to it.
#[derive(Debug)]
pub struct CachedStore<S> {
    inner: S,
    // `None` = not loaded yet; `Some(None)` = loaded, nothing stored.
    cache: Mutex<Option<Option<StoreEntry>>>,
}

impl<S: MetadataStore> CachedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Mutex::new(None),
        }
    }
}

impl<S: MetadataStore> MetadataStore for CachedStore<S> {
    fn location(&self) -> &Path {
        self.inner.location()
    }

    fn get(&self) -> Result<Option<StoreEntry>> {
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = cache.as_ref() {
            return Ok(entry.clone());
        }

        let entry = self.inner.get()?;
        *cache = Some(entry.clone());
        Ok(entry)
    }

    fn set(&self, metadata: &BuildMetadata, setup: &BuildSetup) -> Result<()> {
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match self.inner.set(metadata, setup) {
            Ok(()) => {
                *cache = Some(Some((metadata.clone(), setup.clone())));
                Ok(())
            }
            Err(err) => {
                *cache = None;
                Err(err)
            }
        }
    }
}

/// The process-wide cached store for `path`.
///
/// Every call with the same path returns the same instance, so runs in one
/// process share a single memoized entry per location. Paths are compared
/// as given; callers should pass a canonical form.
pub fn shared_store(path: &Path) -> Arc<CachedStore<FileStore>> {
    static STORES: OnceLock<Mutex<HashMap<PathBuf, Arc<CachedStore<FileStore>>>>> =
        OnceLock::new();
    let stores = STORES.get_or_init(|| Mutex::new(HashMap::new()));

    let mut map = stores
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    map.entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(CachedStore::new(FileStore::new(path))))
        .clone()
}
