use crate::api::{ApiFingerprint, Apis};
use crate::relations::{Relation, Relations};
use crate::stamp::Stamps;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Everything one build recorded about its sources.
///
/// Keys are source paths as they were handed to the build. Per source there is
/// at most one stamp, one internal API and one row in each relation. Products,
/// binaries and external APIs are owned by the sources that reference them and
/// disappear together with the last such source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub stamps: Stamps,
    pub apis: Apis,
    pub relations: Relations,
}

impl BuildMetadata {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sources().is_empty()
    }

    /// All sources with at least one recorded fact.
    pub fn sources(&self) -> BTreeSet<PathBuf> {
        let relations = &self.relations;
        self.stamps
            .sources
            .keys()
            .chain(self.apis.internal.keys())
            .chain(relations.products.keys())
            .chain(relations.source_deps.keys())
            .chain(relations.library_deps.keys())
            .chain(relations.external_deps.keys())
            .chain(relations.classes.keys())
            .cloned()
            .collect()
    }

    /// Keep exactly the entries for sources in `sources`.
    ///
    /// Sources that are not in the metadata are not added, so the result covers
    /// `sources ∩ self.sources()`.
    pub fn retain_sources(&mut self, sources: &BTreeSet<PathBuf>) {
        self.stamps.sources.retain(|path, _| sources.contains(path));
        self.apis.internal.retain(|path, _| sources.contains(path));
        self.relations
            .retain_sources(|path| sources.contains(path));
        self.gc_owned_entries();
    }

    pub fn remove_sources<'a>(&mut self, sources: impl IntoIterator<Item = &'a PathBuf>) {
        for source in sources {
            self.stamps.sources.remove(source);
            self.apis.internal.remove(source);
            self.relations.remove_source(source);
        }
        self.gc_owned_entries();
    }

    /// Fold the results of a compilation round into this metadata.
    ///
    /// Every source mentioned by `delta` is replaced wholesale, never merged
    /// fact by fact: stale edges from the previous compilation of a recompiled
    /// source must not survive.
    pub fn merge(&mut self, delta: BuildMetadata) {
        let replaced = delta.sources();
        self.remove_sources(&replaced);

        let BuildMetadata {
            stamps,
            apis,
            relations,
        } = delta;

        self.stamps.sources.extend(stamps.sources);
        self.stamps.products.extend(stamps.products);
        self.stamps.binaries.extend(stamps.binaries);
        self.stamps.class_names.extend(stamps.class_names);
        self.apis.internal.extend(apis.internal);
        self.apis.external.extend(apis.external);

        merge_relation(&mut self.relations.products, relations.products);
        merge_relation(&mut self.relations.source_deps, relations.source_deps);
        merge_relation(&mut self.relations.library_deps, relations.library_deps);
        merge_relation(&mut self.relations.external_deps, relations.external_deps);
        merge_relation(&mut self.relations.classes, relations.classes);
    }

    /// The source that defines `class_name`, if any.
    pub fn defining_source(&self, class_name: &str) -> Option<&PathBuf> {
        self.relations.defining_source(class_name)
    }

    /// External-facing API of `class_name`: the API of the source defining it.
    ///
    /// This is what a dependent project sees when it resolves one of our
    /// classes from its classpath.
    pub fn exported_api(&self, class_name: &str) -> Option<&ApiFingerprint> {
        let source = self.defining_source(class_name)?;
        self.apis.internal_api(source)
    }

    /// Sources from `sources` that lack a stamp or any relations entry.
    ///
    /// After a successful run this is empty for the run's source set.
    pub fn missing_entries(&self, sources: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
        sources
            .iter()
            .filter(|source| {
                !self.stamps.sources.contains_key(*source)
                    || !self.relations.contains_source(source)
            })
            .cloned()
            .collect()
    }

    pub fn contains_source(&self, source: &Path) -> bool {
        self.stamps.sources.contains_key(source)
    }

    /// Drop products, binaries and external APIs no remaining source refers to.
    fn gc_owned_entries(&mut self) {
        let relations = &self.relations;

        self.stamps
            .products
            .retain(|product, _| relations.produced_by(product).is_some());

        let live_binaries: BTreeSet<&PathBuf> = relations.library_deps.values().collect();
        self.stamps
            .binaries
            .retain(|binary, _| live_binaries.contains(binary));
        self.stamps
            .class_names
            .retain(|binary, _| live_binaries.contains(binary));

        let live_classes: BTreeSet<&String> = relations.external_deps.values().collect();
        self.apis
            .external
            .retain(|class_name, _| live_classes.contains(class_name));
    }
}

fn merge_relation<B: Ord + Clone>(into: &mut Relation<PathBuf, B>, from: Relation<PathBuf, B>) {
    for source in from.keys() {
        into.insert_key(source.clone());
        for target in from.forward(source) {
            into.insert(source.clone(), target.clone());
        }
    }
}
