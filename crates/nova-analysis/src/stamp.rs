use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::UNIX_EPOCH;

/// Fingerprint of a single file as observed by one build.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stamp {
    /// SHA-256 of the file contents (lowercase hex).
    Hash(String),
    /// Modification time in milliseconds since the UNIX epoch.
    LastModified(u64),
    /// The file did not exist when it was stamped.
    Missing,
}

impl Stamp {
    /// Content stamp, used for sources.
    ///
    /// Streams the file so large generated sources are never read into memory
    /// at once.
    pub fn hash(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0_u8; 64 * 1024];
        loop {
            let read = file.read(&mut buf)?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
        }
        Ok(Self::Hash(hex::encode(hasher.finalize())))
    }

    /// Content stamp of an in-memory buffer.
    pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes.as_ref());
        Self::Hash(hex::encode(hasher.finalize()))
    }

    /// Cheap metadata stamp, used for products and binaries.
    pub fn last_modified(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)?;
        let millis = match meta.modified()?.duration_since(UNIX_EPOCH) {
            Ok(dur) => dur.as_millis() as u64,
            Err(err) => {
                static REPORTED_MTIME_BEFORE_EPOCH: OnceLock<()> = OnceLock::new();
                if REPORTED_MTIME_BEFORE_EPOCH.set(()).is_ok() {
                    tracing::debug!(
                        target: "nova.analysis",
                        path = %path.display(),
                        error = ?err,
                        "file mtime is before UNIX_EPOCH; using 0 for stamp"
                    );
                }
                0
            }
        };
        Ok(Self::LastModified(millis))
    }

    /// Stamp a product or binary, degrading to [`Stamp::Missing`] for missing files.
    pub fn last_modified_or_missing(path: impl AsRef<Path>) -> io::Result<Self> {
        match Self::last_modified(path) {
            Ok(stamp) => Ok(stamp),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::Missing),
            Err(err) => Err(err),
        }
    }
}

/// Stamps recorded for every file the previous build looked at.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamps {
    pub sources: BTreeMap<PathBuf, Stamp>,
    pub products: BTreeMap<PathBuf, Stamp>,
    pub binaries: BTreeMap<PathBuf, Stamp>,
    /// Class name a binary dependency was resolved for.
    pub class_names: BTreeMap<PathBuf, String>,
}

impl Stamps {
    pub fn source(&self, path: &Path) -> Option<&Stamp> {
        self.sources.get(path)
    }

    pub fn product(&self, path: &Path) -> Option<&Stamp> {
        self.products.get(path)
    }

    pub fn binary(&self, path: &Path) -> Option<&Stamp> {
        self.binaries.get(path)
    }
}
