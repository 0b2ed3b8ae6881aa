use std::path::{Path, PathBuf};

use treesync_core::event::Event;

use crate::{
    apply::{Applier, ApplyPolicy},
    error::SyncError,
};

use super::{peer::Peer, sync_target_init};

/// Replica directory on the local filesystem
pub struct LocalPeer {
    target: PathBuf,
    policy: ApplyPolicy,
}

impl LocalPeer {
    pub fn new(target: &Path, policy: ApplyPolicy) -> Self {
        Self {
            target: target.to_path_buf(),
            policy,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl Peer for LocalPeer {
    fn apply(&mut self, changeset: &[Event]) -> Result<(), SyncError> {
        log::debug!(
            "Apply {} events on '{}'",
            changeset.len(),
            self.target.display()
        );
        Ok(Applier::new(&self.target, self.policy).apply(changeset)?)
    }

    fn apply_init(&mut self, changeset: &[Event]) -> Result<(), SyncError> {
        sync_target_init(&self.target, changeset)
    }
}
