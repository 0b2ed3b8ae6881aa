use std::io::Write;

use anyhow::Context;
use treesync_core::{codec::to_lines, event::Event};

use crate::error::SyncError;

/// Receiver of changesets produced on the source side
#[cfg_attr(test, mockall::automock)]
pub trait Peer {
    /// Apply a changeset computed from a batch of source events
    fn apply(&mut self, changeset: &[Event]) -> Result<(), SyncError>;
    /// Replace the whole peer tree by a full synchronization changeset
    fn apply_init(&mut self, changeset: &[Event]) -> Result<(), SyncError>;
}

/// Write changesets as newline delimited json records
pub struct JsonLinesPeer<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesPeer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, changeset: &[Event]) -> Result<(), SyncError> {
        let lines = to_lines(changeset)?;
        self.writer
            .write_all(lines.as_bytes())
            .context("Write changeset records")?;
        self.writer.flush().context("Flush changeset records")?;
        Ok(())
    }
}

impl<W: Write> Peer for JsonLinesPeer<W> {
    fn apply(&mut self, changeset: &[Event]) -> Result<(), SyncError> {
        self.write(changeset)
    }

    fn apply_init(&mut self, changeset: &[Event]) -> Result<(), SyncError> {
        self.write(changeset)
    }
}
