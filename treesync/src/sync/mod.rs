use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use treesync_core::{
    config::SyncConfig,
    event::Event,
    types::Changeset,
    utils::{read_content, slash_path, tree_fingerprint},
};
use walkdir::WalkDir;

use crate::{
    apply::{Applier, ApplyPolicy},
    error::SyncError,
    invert::Inverter,
};

use self::{lock::RootLocks, peer::Peer};

pub mod local;
pub mod lock;
pub mod peer;
pub mod rebase;

fn is_under(path: &str, directory: &str) -> bool {
    directory.is_empty()
        || path
            .strip_prefix(directory)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

fn is_same_or_ancestor(path: &str, of: &str) -> bool {
    path == of || is_under(of, path)
}

pub fn is_blacklisted(
    path: &str,
    blacklist_directories: &[String],
    blacklist_extensions: &[String],
) -> bool {
    path.split('/')
        .any(|segment| blacklist_directories.iter().any(|name| name == segment))
        || blacklist_extensions
            .iter()
            .any(|extension| path.ends_with(extension.as_str()))
}

/// Make events relative to `root_dir` and drop operationally irrelevant ones:
/// directory modifications and events on blacklisted paths. A move between a
/// blacklisted and a regular path becomes a creation or a deletion of the
/// regular one.
pub fn filter(
    root_dir: &Path,
    events: &[Event],
    blacklist_directories: &[String],
    blacklist_extensions: &[String],
) -> Result<Vec<Event>, SyncError> {
    let blacklisted = |path: &str| is_blacklisted(path, blacklist_directories, blacklist_extensions);
    let mut kept = vec![];

    for event in events {
        let event = event.clone().relative_to(root_dir)?;
        let event = match event {
            Event::Modified {
                is_directory: true, ..
            } => None,
            Event::Moved {
                ref src_path,
                ref dest_path,
                is_directory,
            } => match (blacklisted(src_path.as_str()), blacklisted(dest_path.as_str())) {
                (false, false) => Some(event.clone()),
                (true, false) => Some(Event::created(dest_path, is_directory)),
                (false, true) => Some(Event::deleted(src_path, is_directory)),
                (true, true) => None,
            },
            _ if blacklisted(event.src_path()) => None,
            _ => Some(event),
        };

        if let Some(event) = event {
            kept.push(event);
        }
    }

    log::debug!(
        "Filter kept {} of {} events : {}",
        kept.len(),
        events.len(),
        kept.iter().join(", ")
    );
    Ok(kept)
}

/// Drop child moves a watcher reports along with the move of their directory
pub fn drop_synthetic_moves(events: Vec<Event>) -> Vec<Event> {
    let directory_moves = events
        .iter()
        .filter_map(|event| match event {
            Event::Moved {
                src_path,
                dest_path,
                is_directory: true,
            } => Some((src_path.clone(), dest_path.clone())),
            _ => None,
        })
        .collect::<Vec<(String, String)>>();

    let implied = |src_path: &str, dest_path: &str| {
        directory_moves.iter().any(|(from, to)| {
            match (
                src_path.strip_prefix(from.as_str()),
                dest_path.strip_prefix(to.as_str()),
            ) {
                (Some(src_rest), Some(dest_rest)) => {
                    src_rest.starts_with('/') && src_rest == dest_rest
                }
                _ => false,
            }
        })
    };

    events
        .into_iter()
        .filter(|event| match event {
            Event::Moved {
                src_path,
                dest_path,
                ..
            } if implied(src_path.as_str(), dest_path.as_str()) => {
                log::debug!("Drop synthetic event : {}", event);
                false
            }
            _ => true,
        })
        .collect()
}

/// Place each directory creation before the first event located beneath it
pub fn hoist_directory_creations(mut events: Vec<Event>) -> Vec<Event> {
    let mut index = 0;
    while index < events.len() {
        let directory = match &events[index] {
            Event::Created {
                src_path,
                is_directory: true,
            } => Some(src_path.clone()),
            _ => None,
        };

        if let Some(directory) = directory {
            let mut target = None;
            for previous in (0..index).rev() {
                let paths = events[previous].paths();
                if paths
                    .iter()
                    .any(|path| is_same_or_ancestor(path, &directory))
                {
                    break;
                }
                if paths.iter().any(|path| is_under(path, &directory)) {
                    target = Some(previous);
                }
            }

            if let Some(target) = target {
                log::debug!("Move creation of '{}' before its content", directory);
                let event = events.remove(index);
                events.insert(target, event);
            }
        }

        index += 1;
    }

    events
}

/// Keep only the last content written to each path
pub fn keep_last_contents(events: Vec<Event>) -> Vec<Event> {
    let mut written: HashSet<String> = HashSet::new();
    let mut kept = vec![];

    for event in events.into_iter().rev() {
        match &event {
            Event::Modified {
                src_path,
                content: Some(_),
                ..
            } => {
                if !written.insert(src_path.clone()) {
                    log::debug!("Drop overwritten content of '{}'", src_path);
                    continue;
                }
            }
            _ => {
                let paths = event.paths();
                written.retain(|path| {
                    !paths
                        .iter()
                        .any(|path_| path == path_ || is_under(path, path_))
                });
            }
        }
        kept.push(event);
    }

    kept.reverse();
    kept
}

/// Outbound entry point: turn raw watcher events of `root_dir` into a
/// changeset ready to be transported and replayed on a replica
pub fn sync_source(
    root_dir: &Path,
    events: &[Event],
    config: &SyncConfig,
) -> Result<Changeset, SyncError> {
    let events = filter(
        root_dir,
        events,
        &config.blacklist_directories,
        &config.blacklist_extensions,
    )?;
    let events = drop_synthetic_moves(events);
    let events = Inverter::new(root_dir)
        .with_materialized_creations(true)
        .invert(&events)?;
    let events = hoist_directory_creations(events);
    Ok(keep_last_contents(events))
}

/// Inbound entry point: apply a changeset on the replica `root_dir`.
/// Replaying a changeset is a no-op.
pub fn sync_target(root_dir: &Path, changeset: &[Event]) -> Result<(), SyncError> {
    Ok(Applier::new(root_dir, ApplyPolicy::Replay).apply(changeset)?)
}

/// Changeset building the whole `root_dir` tree from nothing: directories
/// before their content, files with their content
pub fn sync_init(root_dir: &Path, config: &SyncConfig) -> Result<Changeset, SyncError> {
    let mut changeset = vec![];

    for entry in WalkDir::new(root_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !is_blacklisted(
                &name,
                &config.blacklist_directories,
                &config.blacklist_extensions,
            )
        })
    {
        let entry = entry.map_err(|error| {
            SyncError::RelatedLocalFileIoError(root_dir.to_path_buf(), error.into())
        })?;
        let relative_path = match entry.path().strip_prefix(root_dir) {
            Ok(relative_path) => slash_path(relative_path),
            Err(_) => continue,
        };

        if entry.file_type().is_dir() {
            changeset.push(Event::created(&relative_path, true));
        } else {
            let content = read_content(entry.path()).map_err(|error| {
                SyncError::RelatedLocalFileIoError(entry.path().to_path_buf(), error)
            })?;
            changeset.push(Event::with_content(&relative_path, content));
        }
    }

    Ok(changeset)
}

/// Empty the replica `root_dir`, then apply a full resync changeset on it
pub fn sync_target_init(root_dir: &Path, changeset: &[Event]) -> Result<(), SyncError> {
    fs::create_dir_all(root_dir)
        .map_err(|error| SyncError::RelatedLocalFileIoError(root_dir.to_path_buf(), error))?;

    let entries = fs::read_dir(root_dir)
        .map_err(|error| SyncError::RelatedLocalFileIoError(root_dir.to_path_buf(), error))?;
    for entry in entries {
        let path = entry
            .map_err(|error| SyncError::RelatedLocalFileIoError(root_dir.to_path_buf(), error))?
            .path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|error| SyncError::RelatedLocalFileIoError(path.clone(), error))?;
    }

    Ok(Applier::new(root_dir, ApplyPolicy::Strict).apply(changeset)?)
}

/// True when both trees hold the same paths with the same content, ignoring
/// blacklisted paths
pub fn synchronized(source: &Path, target: &Path, config: &SyncConfig) -> Result<bool, SyncError> {
    let fingerprint = |root: &Path| {
        tree_fingerprint(root)
            .map(|fingerprint| {
                fingerprint
                    .into_iter()
                    .filter(|(path, _)| {
                        !is_blacklisted(
                            path,
                            &config.blacklist_directories,
                            &config.blacklist_extensions,
                        )
                    })
                    .collect::<Vec<(String, Option<String>)>>()
            })
            .map_err(|error| SyncError::RelatedLocalFileIoError(root.to_path_buf(), error))
    };

    Ok(fingerprint(source)? == fingerprint(target)?)
}

/// Replicate changes of a source directory to a peer, one batch at a time
pub struct Synchronizer<P: Peer> {
    source: PathBuf,
    config: SyncConfig,
    locks: RootLocks,
    peer: P,
}

impl<P: Peer> Synchronizer<P> {
    pub fn new(source: &Path, config: SyncConfig, locks: RootLocks, peer: P) -> Self {
        Self {
            source: source.to_path_buf(),
            config,
            locks,
            peer,
        }
    }

    pub fn peer(&self) -> &P {
        &self.peer
    }

    /// Send the whole source tree to the peer
    pub fn init(&mut self) -> Result<Changeset, SyncError> {
        let lock = self.locks.get(&self.source)?;
        let _guard = RootLocks::acquire(&lock)?;

        let changeset = sync_init(&self.source, &self.config)?;
        log::info!(
            "Full synchronization of '{}' ({} events)",
            self.source.display(),
            changeset.len()
        );
        self.peer.apply_init(&changeset)?;
        Ok(changeset)
    }

    /// Filter, compact and send one batch of raw events. The source root is
    /// locked for the whole pipeline.
    pub fn process_batch(&mut self, raw_events: &[Event]) -> Result<Changeset, SyncError> {
        let lock = self.locks.get(&self.source)?;
        let _guard = RootLocks::acquire(&lock)?;

        let mut events = raw_events
            .iter()
            .map(|event| event.clone().relative_to(&self.source))
            .collect::<Result<Vec<Event>, _>>()?;
        if !self.config.directories.is_empty() {
            events = rebase::filter_by_directory(&events, &self.config.directories);
        }

        let changeset = sync_source(&self.source, &events, &self.config)?;
        if changeset.is_empty() {
            log::debug!("Nothing to synchronize for {} events", raw_events.len());
            return Ok(changeset);
        }

        log::info!("Synchronize {} events", changeset.len());
        self.peer.apply(&changeset)?;
        Ok(changeset)
    }

    /// Process a batch, falling back to a full synchronization when it fails
    pub fn process(&mut self, raw_events: &[Event]) -> Result<(), SyncError> {
        if let Err(error) = self.process_batch(raw_events) {
            log::error!("Batch synchronization failed, resynchronize all : {}", error);
            self.init()?;
        }
        Ok(())
    }
}
