use crate::error::Result;
use crate::lock::StoreLock;
use crate::store::MetadataStore;
use tracing::dispatcher::{DefaultGuard, Dispatch};

/// Exclusive access to one store location for the duration of a run.
///
/// While alive, the scope holds the location's [`StoreLock`] and, when given
/// one, makes the ambient dispatcher the thread's default so that compiler
/// subsystems log into it. Dropping the scope restores the previous
/// dispatcher and then releases the lock, on success, error and unwind alike.
#[derive(Debug)]
pub struct RunScope {
    // Field order is drop order: restore logging before unlocking.
    dispatch: Option<DefaultGuard>,
    _lock: StoreLock,
}

impl RunScope {
    pub fn enter(store: &dyn MetadataStore, ambient: Option<&Dispatch>) -> Result<Self> {
        let lock = StoreLock::acquire(store.location())?;
        let dispatch = ambient.map(tracing::dispatcher::set_default);

        tracing::debug!(
            target: "nova.analysis_store",
            location = %store.location().display(),
            ambient = dispatch.is_some(),
            "entered run scope"
        );

        Ok(Self {
            dispatch,
            _lock: lock,
        })
    }

    pub fn has_ambient_dispatch(&self) -> bool {
        self.dispatch.is_some()
    }
}
