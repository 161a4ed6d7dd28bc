use crate::classpath::ClasspathLocator;
use crate::lookup::MetadataLookup;
use nova_analysis::ApiFingerprint;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Answers "what API does this binary dependency expose?".
///
/// Never fails: anything that cannot be resolved is
/// [`ApiFingerprint::empty`].
pub trait ExternalApis {
    fn resolve(&self, binary: &Path, class_name: &str) -> ApiFingerprint;

    /// API of `class_name` wherever the search classpath finds it now.
    ///
    /// Used to check whether an external dependency recorded by an earlier
    /// build still has the API it had then.
    fn resolve_class(&self, class_name: &str) -> ApiFingerprint {
        let _ = class_name;
        ApiFingerprint::empty()
    }
}

impl<F> ExternalApis for F
where
    F: Fn(&Path, &str) -> ApiFingerprint,
{
    fn resolve(&self, binary: &Path, class_name: &str) -> ApiFingerprint {
        self(binary, class_name)
    }
}

/// Resolves classes loaded from sibling projects' outputs to the API the
/// sibling recorded for them.
#[derive(Debug)]
pub struct ExternalApiResolver {
    locator: ClasspathLocator,
    lookup: Arc<dyn MetadataLookup>,
}

impl ExternalApiResolver {
    pub fn new(search_classpath: &[PathBuf], lookup: Arc<dyn MetadataLookup>) -> Self {
        Self {
            locator: ClasspathLocator::new(search_classpath),
            lookup,
        }
    }

    pub fn locator(&self) -> &ClasspathLocator {
        &self.locator
    }

    fn exported_by(&self, entry: &Path, class_name: &str) -> ApiFingerprint {
        let Some(metadata) = self.lookup.metadata_for(entry) else {
            return ApiFingerprint::empty();
        };
        metadata
            .exported_api(class_name)
            .cloned()
            .unwrap_or_else(ApiFingerprint::empty)
    }
}

impl ExternalApis for ExternalApiResolver {
    fn resolve(&self, binary: &Path, class_name: &str) -> ApiFingerprint {
        let Some(entry) = self.locator.entry_for(class_name) else {
            tracing::trace!(target: "nova.incremental", class_name, "class not on search classpath");
            return ApiFingerprint::empty();
        };

        let resolved = entry.resolve(class_name);
        if !same_file(&resolved, binary) {
            // Another entry earlier in the search order shadows `binary`.
            tracing::debug!(
                target: "nova.incremental",
                class_name,
                binary = %binary.display(),
                resolved = %resolved.display(),
                "binary dependency is shadowed on the search classpath"
            );
            return ApiFingerprint::empty();
        }

        self.exported_by(entry.path(), class_name)
    }

    fn resolve_class(&self, class_name: &str) -> ApiFingerprint {
        match self.locator.entry_for(class_name) {
            Some(entry) => self.exported_by(entry.path(), class_name),
            None => ApiFingerprint::empty(),
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
