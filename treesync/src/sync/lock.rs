use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::anyhow;

use crate::error::SyncError;

/// One mutex per synchronized root. A batch holds the guard of its root from
/// filtering to application, so batches of a same root never overlap.
#[derive(Debug, Clone, Default)]
pub struct RootLocks {
    locks: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl RootLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, root: &Path) -> Result<Arc<Mutex<()>>, SyncError> {
        let key = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| anyhow!("Root locks are poisoned"))?;
        Ok(locks.entry(key).or_default().clone())
    }

    pub fn acquire(lock: &Mutex<()>) -> Result<MutexGuard<'_, ()>, SyncError> {
        Ok(lock
            .lock()
            .map_err(|_| anyhow!("Root lock is poisoned"))?)
    }
}
