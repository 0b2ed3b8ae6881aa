use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use treesync_core::event::Event;

use crate::error::WatchError;

/// Group events delivered by the watcher thread into batches: everything
/// queued when a batch is requested belongs to it. Consecutive duplicates,
/// which debounced watchers commonly emit, are reduced to one.
#[derive(Clone)]
pub struct BatchReceiver {
    receiver: Receiver<Event>,
}

impl BatchReceiver {
    pub fn new(receiver: Receiver<Event>) -> Self {
        Self { receiver }
    }

    /// Block until one event is available, then take all queued ones
    pub fn recv(&self) -> Result<Vec<Event>, WatchError> {
        let first = self
            .receiver
            .recv()
            .map_err(|_| WatchError::ChannelClosed)?;
        Ok(self.drain(first))
    }

    /// Same as [`BatchReceiver::recv`] but give up after `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Vec<Event>>, WatchError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(first) => Ok(Some(self.drain(first))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(WatchError::ChannelClosed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    fn drain(&self, first: Event) -> Vec<Event> {
        let mut batch = vec![first];
        for event in self.receiver.try_iter() {
            if batch.last() != Some(&event) {
                batch.push(event);
            }
        }
        batch
    }
}
