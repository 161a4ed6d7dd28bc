use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Digest of a compilation unit's externally visible signature.
///
/// Stored as a lowercase hex string. The empty string is reserved for
/// [`ApiFingerprint::empty`], the "unknown / external" sentinel: it never
/// compares equal to a real digest, so dependents of an unresolved API are
/// always treated as changed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiFingerprint(String);

impl ApiFingerprint {
    /// Fingerprint an API rendered to bytes by a compiler backend.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes.as_ref());
        Self(hex::encode(hasher.finalize()))
    }

    /// Sentinel for an API that could not be resolved.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Combine several fingerprints reported for the same unit.
    ///
    /// The result depends only on the set of inputs, not on their order.
    pub fn combine<'a>(parts: impl IntoIterator<Item = &'a ApiFingerprint>) -> Self {
        let mut parts: Vec<&ApiFingerprint> = parts.into_iter().collect();
        parts.sort();
        parts.dedup();
        match parts.as_slice() {
            [] => Self::empty(),
            [single] => (*single).clone(),
            many => {
                let mut hasher = Sha256::new();
                for part in many {
                    hasher.update(part.0.as_bytes());
                    hasher.update([0]);
                }
                Self(hex::encode(hasher.finalize()))
            }
        }
    }
}

impl fmt::Display for ApiFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("<unknown>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// API fingerprints recorded by one build.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apis {
    /// APIs of this project's own sources.
    pub internal: BTreeMap<PathBuf, ApiFingerprint>,
    /// APIs of classes from sibling projects this project depends on, as seen
    /// when the dependent sources were last compiled.
    pub external: BTreeMap<String, ApiFingerprint>,
}

impl Apis {
    pub fn internal_api(&self, source: &Path) -> Option<&ApiFingerprint> {
        self.internal.get(source)
    }

    pub fn external_api(&self, class_name: &str) -> Option<&ApiFingerprint> {
        self.external.get(class_name)
    }
}
