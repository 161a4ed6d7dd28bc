use crate::api_resolver::ExternalApis;
use crate::error::IncrementalError;
use nova_analysis::{ApiFingerprint, BuildMetadata, Stamp};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Facts a compiler backend reports about the sources it compiled.
///
/// The primary compiler calls these while it runs; for the secondary compiler
/// an [`crate::ArtifactAnalyzer`] recovers them from the generated artifacts.
/// Facts may arrive in any order and may repeat.
pub trait AnalysisCallback {
    /// Visible API of `source`. Several reports for one source are combined.
    fn api(&mut self, source: &Path, api: ApiFingerprint);

    fn generated_class(&mut self, source: &Path, product: &Path, class_name: &str);

    /// `source` refers to something defined in `on`, another source of this build.
    fn source_dependency(&mut self, source: &Path, on: &Path);

    /// `source` refers to `class_name`, loaded from `binary` (a jar or class file).
    fn binary_dependency(&mut self, source: &Path, binary: &Path, class_name: &str);
}

/// Accumulates the facts of one compilation round.
///
/// The result depends only on the set of facts received.
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Artifacts of sources compiled in earlier runs, product -> source.
    previous_products: BTreeMap<PathBuf, PathBuf>,
    sources: BTreeSet<PathBuf>,
    apis: BTreeMap<PathBuf, BTreeSet<ApiFingerprint>>,
    products: BTreeMap<PathBuf, BTreeMap<PathBuf, String>>,
    source_deps: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    binary_deps: BTreeMap<PathBuf, BTreeSet<(PathBuf, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink for a round that compiles `sources` on top of `previous`.
    ///
    /// Every source in `sources` ends up in the result, even if the compiler
    /// reports nothing about it.
    pub fn for_round<'a>(
        previous: &BuildMetadata,
        sources: impl IntoIterator<Item = &'a PathBuf>,
    ) -> Self {
        let relations = &previous.relations;
        let previous_products = relations
            .products
            .keys()
            .flat_map(|source| {
                relations
                    .products
                    .forward(source)
                    .map(move |product| (product.clone(), source.clone()))
            })
            .collect();

        Self {
            previous_products,
            sources: sources.into_iter().cloned().collect(),
            ..Self::default()
        }
    }

    pub fn sources(&self) -> &BTreeSet<PathBuf> {
        &self.sources
    }

    /// Turn the recorded facts into metadata for the recorded sources.
    ///
    /// Sources are content-stamped; products and binaries are stamped by
    /// modification time. Binary dependencies are classified as:
    /// - a source dependency when the binary is a product of this build
    /// - an external dependency when `apis` resolves the class
    /// - a library dependency otherwise
    pub fn into_metadata(self, apis: &dyn ExternalApis) -> Result<BuildMetadata, IncrementalError> {
        let mut metadata = BuildMetadata::empty();

        let mut owners: BTreeMap<&Path, &Path> = self
            .previous_products
            .iter()
            .map(|(product, source)| (product.as_path(), source.as_path()))
            .collect();
        for (source, products) in &self.products {
            for product in products.keys() {
                owners.insert(product.as_path(), source.as_path());
            }
        }

        for source in &self.sources {
            let stamp = Stamp::hash(source).map_err(|err| IncrementalError::Stamp {
                path: source.clone(),
                source: err,
            })?;
            metadata.stamps.sources.insert(source.clone(), stamp);
            metadata.relations.register_source(source.clone());
        }

        for (source, reported) in &self.apis {
            metadata
                .apis
                .internal
                .insert(source.clone(), ApiFingerprint::combine(reported));
        }

        for (source, products) in &self.products {
            for (product, class_name) in products {
                let stamp = Stamp::last_modified_or_missing(product).map_err(|err| {
                    IncrementalError::Stamp {
                        path: product.clone(),
                        source: err,
                    }
                })?;
                metadata.stamps.products.insert(product.clone(), stamp);
                metadata
                    .relations
                    .products
                    .insert(source.clone(), product.clone());
                metadata
                    .relations
                    .classes
                    .insert(source.clone(), class_name.clone());
            }
        }

        for (source, deps) in &self.source_deps {
            for dep in deps {
                metadata
                    .relations
                    .source_deps
                    .insert(source.clone(), dep.clone());
            }
        }

        for (source, deps) in &self.binary_deps {
            for (binary, class_name) in deps {
                if let Some(owner) = owners.get(binary.as_path()) {
                    if *owner != source.as_path() {
                        metadata
                            .relations
                            .source_deps
                            .insert(source.clone(), owner.to_path_buf());
                    }
                    continue;
                }

                let api = apis.resolve(binary, class_name);
                if !api.is_empty() {
                    metadata
                        .relations
                        .external_deps
                        .insert(source.clone(), class_name.clone());
                    metadata.apis.external.insert(class_name.clone(), api);
                    continue;
                }

                let stamp = Stamp::last_modified_or_missing(binary).map_err(|err| {
                    IncrementalError::Stamp {
                        path: binary.clone(),
                        source: err,
                    }
                })?;
                metadata
                    .relations
                    .library_deps
                    .insert(source.clone(), binary.clone());
                metadata.stamps.binaries.insert(binary.clone(), stamp);
                metadata
                    .stamps
                    .class_names
                    .insert(binary.clone(), class_name.clone());
            }
        }

        Ok(metadata)
    }
}

impl AnalysisCallback for RecordingSink {
    fn api(&mut self, source: &Path, api: ApiFingerprint) {
        tracing::trace!(target: "nova.incremental", source = %source.display(), api = %api, "api");
        self.sources.insert(source.to_path_buf());
        self.apis.entry(source.to_path_buf()).or_default().insert(api);
    }

    fn generated_class(&mut self, source: &Path, product: &Path, class_name: &str) {
        tracing::trace!(
            target: "nova.incremental",
            source = %source.display(),
            product = %product.display(),
            class_name,
            "generated class"
        );
        self.sources.insert(source.to_path_buf());
        self.products
            .entry(source.to_path_buf())
            .or_default()
            .insert(product.to_path_buf(), class_name.to_owned());
    }

    fn source_dependency(&mut self, source: &Path, on: &Path) {
        self.sources.insert(source.to_path_buf());
        if source == on {
            return;
        }
        tracing::trace!(
            target: "nova.incremental",
            source = %source.display(),
            on = %on.display(),
            "source dependency"
        );
        self.source_deps
            .entry(source.to_path_buf())
            .or_default()
            .insert(on.to_path_buf());
    }

    fn binary_dependency(&mut self, source: &Path, binary: &Path, class_name: &str) {
        tracing::trace!(
            target: "nova.incremental",
            source = %source.display(),
            binary = %binary.display(),
            class_name,
            "binary dependency"
        );
        self.sources.insert(source.to_path_buf());
        self.binary_deps
            .entry(source.to_path_buf())
            .or_default()
            .insert((binary.to_path_buf(), class_name.to_owned()));
    }
}
