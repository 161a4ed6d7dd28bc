use crate::error::{Result, StoreError};
use fs2::FileExt as _;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock, TryLockError};

/// Exclusive hold on a store location, across threads and processes.
///
/// The lock file next to the store records the pid of the current holder, so
/// a run that has to wait can say who it is waiting for. Released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
    // `fs2` locks do not exclude threads of the same process on every
    // platform; the per-location mutex does.
    _guard: MutexGuard<'static, ()>,
}

impl StoreLock {
    /// Lock the store at `location`, blocking while another run holds it.
    pub fn acquire(location: &Path) -> Result<Self> {
        let path = lock_path_for(location);
        let lock_err = |source| StoreError::Lock {
            path: path.clone(),
            source,
        };

        let guard = wait_in_process(location);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(lock_err)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(lock_err)?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                tracing::debug!(
                    target: "nova.analysis_store",
                    location = %location.display(),
                    holder = ?read_holder(&path),
                    "analysis store is in use by another process; waiting"
                );
                file.lock_exclusive().map_err(lock_err)?;
            }
            Err(err) => return Err(lock_err(err)),
        }

        // The pid is informational only; a lock we could not annotate still
        // excludes other runs.
        let recorded = file
            .set_len(0)
            .and_then(|()| write!(file, "{}", std::process::id()));
        if let Err(err) = recorded {
            tracing::debug!(
                target: "nova.analysis_store",
                path = %path.display(),
                error = %err,
                "failed to record store lock holder"
            );
        }

        tracing::trace!(target: "nova.analysis_store", path = %path.display(), "store lock acquired");

        Ok(Self {
            file,
            path,
            _guard: guard,
        })
    }

    /// The lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pid of the process that last locked the store at `location`.
    ///
    /// `None` when the store was never locked or the lock file is unreadable,
    /// which some platforms enforce while another process holds it.
    pub fn holder(location: &Path) -> Option<u32> {
        read_holder(&lock_path_for(location))
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        tracing::trace!(target: "nova.analysis_store", path = %self.path.display(), "store lock released");
    }
}

/// Lock file guarding the store at `location`: `<location>.lock`.
pub fn lock_path_for(location: &Path) -> PathBuf {
    let mut name = location.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

fn read_holder(lock_path: &Path) -> Option<u32> {
    std::fs::read_to_string(lock_path).ok()?.trim().parse().ok()
}

/// Take the in-process mutex for `location`, logging when another thread of
/// this process is mid-run on the same store.
fn wait_in_process(location: &Path) -> MutexGuard<'static, ()> {
    let mutex = run_mutex_for(location);
    match mutex.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => {
            tracing::debug!(
                target: "nova.analysis_store",
                location = %location.display(),
                "analysis store is in use by another run in this process; waiting"
            );
            mutex
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }
}

fn run_mutex_for(location: &Path) -> &'static Mutex<()> {
    static RUN_MUTEXES: OnceLock<Mutex<HashMap<PathBuf, &'static Mutex<()>>>> = OnceLock::new();
    let mutexes = RUN_MUTEXES.get_or_init(|| Mutex::new(HashMap::new()));

    let mut map = mutexes
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    // Leaked: a process touches a handful of store locations at most.
    *map
        .entry(location.to_path_buf())
        .or_insert_with(|| &*Box::leak(Box::new(Mutex::new(()))))
}
