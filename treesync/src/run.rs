use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;
use treesync_core::config::SyncConfig;

use crate::{
    local::{reducer::BatchReceiver, watcher::LocalWatcher},
    sync::{lock::RootLocks, peer::Peer, Synchronizer},
};

/// Fully synchronize `peer` with `source`, then replicate each batch of
/// source changes until stop signal (or right after first synchronization
/// when `exit_after_sync`)
pub fn run<P: Peer>(
    source: &Path,
    config: SyncConfig,
    peer: P,
    exit_after_sync: bool,
    stop_signal: Arc<AtomicBool>,
) -> Result<()> {
    log::info!("Prepare to sync {:?}", source);
    fs::create_dir_all(source).context(format!("Create source folder {:?}", source))?;

    // Watcher is started before first synchronization to not miss changes
    let (sender, receiver) = unbounded();
    let mut watcher = LocalWatcher::new(source, config.debounce, stop_signal.clone(), sender)
        .context("Create local watcher")?;
    let watched_root = watcher.root().to_path_buf();
    let watcher_handle = if exit_after_sync {
        None
    } else {
        log::info!("Start watcher");
        Some(thread::spawn(move || {
            if let Err(error) = watcher.listen() {
                log::error!("Local watcher failed: {}", error)
            }
        }))
    };

    let mut synchronizer = Synchronizer::new(&watched_root, config, RootLocks::new(), peer);
    synchronizer.init().context("First synchronization")?;
    if exit_after_sync {
        log::info!("Synchronization finished");
        return Ok(());
    }

    let batch_receiver = BatchReceiver::new(receiver);
    loop {
        if stop_signal.load(Ordering::Relaxed) {
            log::info!("Finished synchronization (on stop signal)");
            break;
        }

        match batch_receiver.recv_timeout(Duration::from_millis(250)) {
            Ok(Some(batch)) => {
                log::debug!("Received batch of {} events", batch.len());
                synchronizer
                    .process(&batch)
                    .context("Synchronize batch of events")?;
            }
            Ok(None) => {}
            Err(error) => {
                log::error!("Finished synchronization : {}", error);
                break;
            }
        }
    }

    if let Some(watcher_handle) = watcher_handle {
        if watcher_handle.join().is_err() {
            log::error!("Fail to join local watcher");
        }
    }
    Ok(())
}
