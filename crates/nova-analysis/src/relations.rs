use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// A many-to-many relation indexed in both directions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation<A: Ord, B: Ord> {
    forward: BTreeMap<A, BTreeSet<B>>,
    reverse: BTreeMap<B, BTreeSet<A>>,
}

impl<A: Ord, B: Ord> Default for Relation<A, B> {
    fn default() -> Self {
        Self {
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
        }
    }
}

impl<A: Ord + Clone, B: Ord + Clone> Relation<A, B> {
    pub fn insert(&mut self, a: A, b: B) {
        self.reverse
            .entry(b.clone())
            .or_default()
            .insert(a.clone());
        self.forward.entry(a).or_default().insert(b);
    }

    /// Record `a` as a key even if it has no pairs yet.
    pub fn insert_key(&mut self, a: A) {
        self.forward.entry(a).or_default();
    }

    pub fn forward(&self, a: &A) -> impl Iterator<Item = &B> {
        self.forward.get(a).into_iter().flatten()
    }

    pub fn reverse(&self, b: &B) -> impl Iterator<Item = &A> {
        self.reverse.get(b).into_iter().flatten()
    }

    pub fn contains_key(&self, a: &A) -> bool {
        self.forward.contains_key(a)
    }

    pub fn keys(&self) -> impl Iterator<Item = &A> {
        self.forward.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &B> {
        self.reverse.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Drop every pair whose left side is `a`.
    pub fn remove_key(&mut self, a: &A) {
        let Some(targets) = self.forward.remove(a) else {
            return;
        };
        for b in targets {
            if let Some(sources) = self.reverse.get_mut(&b) {
                sources.remove(a);
                if sources.is_empty() {
                    self.reverse.remove(&b);
                }
            }
        }
    }

    /// Keep only pairs whose left side satisfies `keep`.
    pub fn retain_keys(&mut self, mut keep: impl FnMut(&A) -> bool) {
        let dropped: Vec<A> = self
            .forward
            .keys()
            .filter(|a| !keep(*a))
            .cloned()
            .collect();
        for a in &dropped {
            self.remove_key(a);
        }
    }
}

/// Dependency edges recorded by one build. Every relation is keyed by source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relations {
    /// source -> generated artifact.
    pub products: Relation<PathBuf, PathBuf>,
    /// source -> source it depends on.
    pub source_deps: Relation<PathBuf, PathBuf>,
    /// source -> library binary (jar or class file) it depends on.
    pub library_deps: Relation<PathBuf, PathBuf>,
    /// source -> class from a sibling project it depends on.
    pub external_deps: Relation<PathBuf, String>,
    /// source -> class name it defines.
    pub classes: Relation<PathBuf, String>,
}

impl Relations {
    pub fn contains_source(&self, source: &Path) -> bool {
        let source = source.to_path_buf();
        self.products.contains_key(&source)
            || self.source_deps.contains_key(&source)
            || self.library_deps.contains_key(&source)
            || self.external_deps.contains_key(&source)
            || self.classes.contains_key(&source)
    }

    /// Give `source` a (possibly empty) row so it counts as analyzed.
    pub fn register_source(&mut self, source: PathBuf) {
        self.products.insert_key(source);
    }

    /// Sources that depend directly on `source`.
    pub fn dependents(&self, source: &Path) -> BTreeSet<PathBuf> {
        self.source_deps
            .reverse(&source.to_path_buf())
            .cloned()
            .collect()
    }

    pub fn products_of(&self, source: &Path) -> BTreeSet<PathBuf> {
        self.products
            .forward(&source.to_path_buf())
            .cloned()
            .collect()
    }

    pub fn produced_by(&self, product: &Path) -> Option<&PathBuf> {
        self.products.reverse(&product.to_path_buf()).next()
    }

    pub fn defining_source(&self, class_name: &str) -> Option<&PathBuf> {
        self.classes.reverse(&class_name.to_string()).next()
    }

    pub(crate) fn remove_source(&mut self, source: &PathBuf) {
        self.products.remove_key(source);
        self.source_deps.remove_key(source);
        self.library_deps.remove_key(source);
        self.external_deps.remove_key(source);
        self.classes.remove_key(source);
    }

    pub(crate) fn retain_sources(&mut self, mut keep: impl FnMut(&PathBuf) -> bool) {
        self.products.retain_keys(&mut keep);
        self.source_deps.retain_keys(&mut keep);
        self.library_deps.retain_keys(&mut keep);
        self.external_deps.retain_keys(&mut keep);
        self.classes.retain_keys(&mut keep);
    }
}
