use nova_analysis::BuildMetadata;
use nova_analysis_store::MetadataStore;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Metadata of sibling projects, keyed by the classpath entry they produce.
///
/// A `None` answer is never an error: the classpath entry simply does not
/// belong to a project this build knows about.
pub trait MetadataLookup: Send + Sync {
    fn metadata_for(&self, entry: &Path) -> Option<Arc<BuildMetadata>>;
}

impl<F> MetadataLookup for F
where
    F: Fn(&Path) -> Option<Arc<BuildMetadata>> + Send + Sync,
{
    fn metadata_for(&self, entry: &Path) -> Option<Arc<BuildMetadata>> {
        self(entry)
    }
}

impl MetadataLookup for BTreeMap<PathBuf, Arc<BuildMetadata>> {
    fn metadata_for(&self, entry: &Path) -> Option<Arc<BuildMetadata>> {
        self.get(entry).cloned()
    }
}

impl std::fmt::Debug for dyn MetadataLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MetadataLookup")
    }
}

/// A build without sibling projects.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProjects;

impl MetadataLookup for NoProjects {
    fn metadata_for(&self, _entry: &Path) -> Option<Arc<BuildMetadata>> {
        None
    }
}

/// Reads sibling projects' stores on first use.
///
/// Each store is read at most once per lookup. Read failures are logged and
/// remembered as gaps.
pub struct StoreLookup {
    stores: BTreeMap<PathBuf, Arc<dyn MetadataStore>>,
    loaded: Mutex<HashMap<PathBuf, Option<Arc<BuildMetadata>>>>,
}

impl StoreLookup {
    pub fn new() -> Self {
        Self {
            stores: BTreeMap::new(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Register the store of the project whose output is `entry`.
    pub fn with_project(mut self, entry: impl Into<PathBuf>, store: Arc<dyn MetadataStore>) -> Self {
        self.stores.insert(entry.into(), store);
        self
    }
}

impl Default for StoreLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StoreLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLookup")
            .field("projects", &self.stores.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MetadataLookup for StoreLookup {
    fn metadata_for(&self, entry: &Path) -> Option<Arc<BuildMetadata>> {
        let store = self.stores.get(entry)?;
        let mut loaded = self
            .loaded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(metadata) = loaded.get(entry) {
            return metadata.clone();
        }

        let metadata = match store.get() {
            Ok(stored) => stored.map(|(metadata, _setup)| Arc::new(metadata)),
            Err(err) => {
                tracing::debug!(
                    target: "nova.incremental",
                    entry = %entry.display(),
                    store = %store.location().display(),
                    error = %err,
                    "failed to read sibling project analysis; its APIs stay unresolved"
                );
                None
            }
        };
        loaded.insert(entry.to_path_buf(), metadata.clone());
        metadata
    }
}
