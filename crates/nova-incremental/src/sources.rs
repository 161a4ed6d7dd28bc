use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Primary,
    Secondary,
}

/// Decides which backend compiles a source, by file extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceClassifier {
    secondary_extensions: BTreeSet<String>,
}

impl SourceClassifier {
    /// Extensions are matched case-insensitively and may be given with or
    /// without the leading dot.
    pub fn new(secondary_extensions: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            secondary_extensions: secondary_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, source: &Path) -> SourceKind {
        let secondary = source
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.secondary_extensions
                    .contains(&ext.to_ascii_lowercase())
            });
        if secondary {
            SourceKind::Secondary
        } else {
            SourceKind::Primary
        }
    }

    /// Split `sources` into `(primary, secondary)`, keeping relative order.
    pub fn partition<'a>(
        &self,
        sources: impl IntoIterator<Item = &'a PathBuf>,
    ) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let mut primary = Vec::new();
        let mut secondary = Vec::new();
        for source in sources {
            match self.classify(source) {
                SourceKind::Primary => primary.push(source.clone()),
                SourceKind::Secondary => secondary.push(source.clone()),
            }
        }
        (primary, secondary)
    }
}

impl Default for SourceClassifier {
    fn default() -> Self {
        Self::new(["java"])
    }
}
