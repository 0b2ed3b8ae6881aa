use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use strum_macros::Display;
use treesync_core::event::Event;

use crate::error::ApplyError;

/// How events finding their target already in final state are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ApplyPolicy {
    /// Creation or move onto an existing target is an error
    Strict,
    /// Creation of an already existing entity of the same type, and move of
    /// an entity already found at its destination, are considered done
    Replay,
}

/// Mutate the filesystem under `root_dir` according to events, in order.
/// There is no rollback: on error, events applied before stay applied.
pub struct Applier {
    root_dir: PathBuf,
    policy: ApplyPolicy,
}

impl Applier {
    pub fn new(root_dir: &Path, policy: ApplyPolicy) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
            policy,
        }
    }

    pub fn apply(&self, events: &[Event]) -> Result<(), ApplyError> {
        for (index, event) in events.iter().enumerate() {
            self.apply_in_changeset(event, &events[index + 1..])?;
        }
        Ok(())
    }

    pub fn apply_one(&self, event: &Event) -> Result<(), ApplyError> {
        self.apply_in_changeset(event, &[])
    }

    /// Apply `event` knowing the `following` events of its changeset
    fn apply_in_changeset(&self, event: &Event, following: &[Event]) -> Result<(), ApplyError> {
        log::debug!("[{}] Apply {}", self.policy, event);
        let path = self.target(event, event.src_path())?;

        match event {
            Event::Created {
                is_directory: true, ..
            } => match fs::create_dir(&path) {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                    self.already_exists(event, path.is_dir())
                }
                Err(error) => Err(ApplyError::Io(event.clone(), error)),
            },
            Event::Created {
                is_directory: false,
                ..
            } => match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => Ok(()),
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                    self.already_exists(event, path.is_file())
                }
                Err(error) => Err(ApplyError::Io(event.clone(), error)),
            },
            Event::Deleted { is_directory, .. } => {
                let metadata = match fs::symlink_metadata(&path) {
                    Ok(metadata) => metadata,
                    Err(error) if error.kind() == io::ErrorKind::NotFound => {
                        // Compaction can elide the matching creation
                        log::debug!("Deleted target '{}' already absent", path.display());
                        return Ok(());
                    }
                    Err(error) => return Err(ApplyError::Io(event.clone(), error)),
                };

                if metadata.is_dir() != *is_directory {
                    return Err(ApplyError::TypeMismatch(event.clone()));
                }
                let removed = if metadata.is_dir() {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_file(&path)
                };
                removed.map_err(|error| ApplyError::Io(event.clone(), error))
            }
            Event::Moved {
                src_path,
                dest_path,
                ..
            } => {
                let dest = self.target(event, dest_path)?;
                if dest.symlink_metadata().is_ok() {
                    // Source is back when a following event recreated it
                    let done = path.symlink_metadata().is_err()
                        || following.iter().any(|next| recreates(next, src_path));
                    if self.policy == ApplyPolicy::Replay && done {
                        log::debug!("Move to '{}' already done", dest.display());
                        return Ok(());
                    }
                    return Err(ApplyError::AlreadyExists(event.clone()));
                }

                fs::rename(&path, &dest).map_err(|error| ApplyError::Io(event.clone(), error))
            }
            Event::Modified {
                is_directory,
                content,
                ..
            } => {
                let content = content
                    .as_ref()
                    .ok_or_else(|| ApplyError::MissingContent(event.clone()))?;
                if *is_directory || path.is_dir() {
                    return Err(ApplyError::TypeMismatch(event.clone()));
                }

                fs::write(&path, content.as_bytes())
                    .map_err(|error| ApplyError::Io(event.clone(), error))
            }
        }
    }

    fn target(&self, event: &Event, relative_path: &str) -> Result<PathBuf, ApplyError> {
        if relative_path.is_empty()
            || Path::new(relative_path).is_absolute()
            || relative_path.split('/').any(|part| part == "..")
        {
            return Err(ApplyError::InvalidPath(event.clone()));
        }

        Ok(self.root_dir.join(relative_path))
    }

    fn already_exists(&self, event: &Event, same_type: bool) -> Result<(), ApplyError> {
        if self.policy == ApplyPolicy::Replay && same_type {
            log::debug!("Creation of '{}' already done", event.src_path());
            return Ok(());
        }

        Err(ApplyError::AlreadyExists(event.clone()))
    }
}

fn recreates(event: &Event, path: &str) -> bool {
    match event {
        Event::Created { src_path, .. } | Event::Modified { src_path, .. } => src_path == path,
        Event::Moved { dest_path, .. } => dest_path == path,
        Event::Deleted { .. } => false,
    }
}

/// Apply `events` on `root_dir` with strict policy
pub fn apply(root_dir: &Path, events: &[Event]) -> Result<(), ApplyError> {
    Applier::new(root_dir, ApplyPolicy::Strict).apply(events)
}
