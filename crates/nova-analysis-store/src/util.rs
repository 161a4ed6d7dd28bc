use crate::error::StoreError;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Hard upper bound for a persisted analysis we will attempt to decode.
///
/// A corrupted length prefix must degrade to "no previous analysis", not to an
/// out-of-memory abort.
pub const ANALYSIS_PAYLOAD_LIMIT_BYTES: usize = 512 * 1024 * 1024;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn bincode_options() -> impl bincode::Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

pub(crate) fn bincode_serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(bincode_options().serialize(value)?)
}

pub(crate) fn bincode_deserialize<T: for<'de> Deserialize<'de>>(
    bytes: &[u8],
) -> Result<T, StoreError> {
    Ok(bincode_options()
        .with_limit(ANALYSIS_PAYLOAD_LIMIT_BYTES as u64)
        .deserialize(bytes)?)
}

/// Read `path`, returning `Ok(None)` when it does not exist.
///
/// Oversized files are treated as absent. Any other I/O failure is returned:
/// a store that cannot be read is not the same thing as an empty store.
pub(crate) fn read_file_limited(path: &Path) -> io::Result<Option<Vec<u8>>> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    if !meta.is_file() {
        return Err(io::Error::other(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    if meta.len() > ANALYSIS_PAYLOAD_LIMIT_BYTES as u64 {
        tracing::debug!(
            target: "nova.analysis_store",
            path = %path.display(),
            len = meta.len(),
            "stored analysis exceeds payload limit; ignoring it"
        );
        return Ok(None);
    }

    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Replace `path` with `bytes` so readers see either the old or the new file.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let Some(parent) = path.parent() else {
        return Err(StoreError::InvalidLocation {
            path: path.to_path_buf(),
        });
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    fs::create_dir_all(parent)?;

    let (tmp_path, mut file) = open_unique_tmp_file(path, parent)?;
    if let Err(err) = file.write_all(bytes).and_then(|()| file.sync_all()) {
        drop(file);
        remove_tmp_best_effort(&tmp_path);
        return Err(err.into());
    }
    drop(file);

    const MAX_RENAME_ATTEMPTS: usize = 1024;
    let rename_result = (|| -> io::Result<()> {
        let mut attempts = 0usize;
        loop {
            match fs::rename(&tmp_path, path) {
                Ok(()) => return Ok(()),
                Err(err)
                    if cfg!(windows)
                        && (err.kind() == io::ErrorKind::AlreadyExists || path.exists()) =>
                {
                    // On Windows, `rename` doesn't overwrite.
                    match fs::remove_file(path) {
                        Ok(()) => {}
                        Err(remove_err) if remove_err.kind() == io::ErrorKind::NotFound => {}
                        Err(remove_err) => return Err(remove_err),
                    }

                    attempts += 1;
                    if attempts >= MAX_RENAME_ATTEMPTS {
                        return Err(err);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    })();

    if let Err(err) = rename_result {
        remove_tmp_best_effort(&tmp_path);
        return Err(err.into());
    }

    #[cfg(unix)]
    {
        if let Err(err) = fs::File::open(parent).and_then(|dir| dir.sync_all()) {
            tracing::debug!(
                target: "nova.analysis_store",
                dir = %parent.display(),
                error = %err,
                "failed to sync directory (best effort)"
            );
        }
    }

    Ok(())
}

fn remove_tmp_best_effort(tmp_path: &Path) {
    if let Err(err) = fs::remove_file(tmp_path) {
        if err.kind() != io::ErrorKind::NotFound {
            tracing::debug!(
                target: "nova.analysis_store",
                path = %tmp_path.display(),
                error = %err,
                "failed to remove temporary file"
            );
        }
    }
}

fn open_unique_tmp_file(dest: &Path, parent: &Path) -> io::Result<(PathBuf, fs::File)> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::other("destination path has no file name"))?;
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(format!(".tmp.{pid}.{counter}"));
        let tmp_path = parent.join(tmp_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
}
