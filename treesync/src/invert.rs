use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

use treesync_core::{
    event::{Content, Event},
    utils::read_content,
};

use crate::{
    error::InvertError,
    tree::{Mark, PathTree},
};

/// Compute, from a final filesystem state and the chronological events which
/// produced it, the minimal chronological changeset which turns the initial
/// state into the final one.
///
/// Events are walked backward in time. A [`PathTree`] tracks the instant
/// name of each entity and where it lives in the final state, so content can
/// be read from disk for the last modification of each file. Events
/// superseded by a later delete or by a captured modification are dropped.
pub struct Inverter {
    root_dir: PathBuf,
    materialize_creations: bool,
}

impl Inverter {
    pub fn new(root_dir: &Path) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
            materialize_creations: false,
        }
    }

    /// Turn kept file creations into modifications carrying the final
    /// content, so a replica receives content never reported as modified
    pub fn with_materialized_creations(mut self, materialize_creations: bool) -> Self {
        self.materialize_creations = materialize_creations;
        self
    }

    pub fn invert(&self, events: &[Event]) -> Result<Vec<Event>, InvertError> {
        let mut tree = PathTree::new(&self.root_dir);
        let mut inverted = VecDeque::new();

        for event in events.iter().rev() {
            let event = event.clone().relative_to(&self.root_dir)?;
            if let Some(event) = self.rewind(&mut tree, event)? {
                inverted.push_front(event);
            }
        }

        log::trace!("Inversion tree :\n{}", tree.render());
        Ok(inverted.into())
    }

    fn rewind(&self, tree: &mut PathTree, event: Event) -> Result<Option<Event>, InvertError> {
        if event.paths().iter().any(|path| path.is_empty()) {
            log::debug!("Ignore event on root : {}", event);
            return Ok(None);
        }

        match event {
            Event::Created {
                ref src_path,
                is_directory,
            } => {
                let kept = if self.creation_is_superseded(tree, src_path)? {
                    log::debug!("Drop superseded event : {}", event);
                    None
                } else if self.materialize_creations && !is_directory {
                    let final_path = tree.get_or_create(src_path)?.final_path().to_string();
                    Some(self.materialize(src_path, &final_path)?)
                } else {
                    Some(event.clone())
                };

                // Before its creation, the entity does not exist
                tree.detach(src_path)?;
                Ok(kept)
            }
            Event::Deleted { ref src_path, .. } => {
                if tree.is_ignored(src_path)? {
                    log::debug!("Drop superseded event : {}", event);
                    return Ok(None);
                }

                tree.mark_ignore(src_path, Mark::Deleted)?;
                Ok(Some(event))
            }
            Event::Modified {
                src_path,
                is_directory,
                ..
            } => {
                if is_directory {
                    log::debug!("Drop directory modification of '{}'", src_path);
                    return Ok(None);
                }
                if tree.is_ignored(&src_path)? {
                    log::debug!("Drop superseded modification of '{}'", src_path);
                    return Ok(None);
                }

                let final_path = tree.get_or_create(&src_path)?.final_path().to_string();
                let content = self.read_final_content(&final_path)?;
                tree.mark_ignore(&src_path, Mark::Modified)?;
                Ok(Some(Event::Modified {
                    src_path,
                    is_directory,
                    content: Some(content),
                }))
            }
            Event::Moved {
                src_path,
                dest_path,
                is_directory,
            } => {
                if tree.is_deleted(&dest_path)? {
                    // Moved then deleted: only the source must disappear
                    if tree.has_deleted_ancestor(&src_path)? {
                        log::debug!(
                            "Drop move of '{}' into deleted '{}'",
                            src_path,
                            dest_path
                        );
                        return Ok(None);
                    }

                    tree.get_or_create(&dest_path)?;
                    tree.move_node(&dest_path, &src_path)?;
                    tree.mark_ignore(&src_path, Mark::Deleted)?;
                    log::debug!(
                        "Replace move of '{}' into deleted '{}' by its deletion",
                        src_path,
                        dest_path
                    );
                    return Ok(Some(Event::Deleted {
                        src_path,
                        is_directory,
                    }));
                }

                tree.get_or_create(&dest_path)?;
                tree.move_node(&dest_path, &src_path)?;
                Ok(Some(Event::Moved {
                    src_path,
                    dest_path,
                    is_directory,
                }))
            }
        }
    }

    /// A creation is superseded by a later deletion, or by a captured content
    /// written at the same path (writing the content creates the file). A
    /// node renamed later still needs its creation.
    fn creation_is_superseded(
        &self,
        tree: &PathTree,
        src_path: &str,
    ) -> Result<bool, InvertError> {
        if tree.is_deleted(src_path)? {
            return Ok(true);
        }

        Ok(match tree.get(src_path)? {
            Some(node) => node.mark() == Some(Mark::Modified) && node.final_path() == src_path,
            None => false,
        })
    }

    fn materialize(&self, src_path: &str, final_path: &str) -> Result<Event, InvertError> {
        if !self.root_dir.join(final_path).is_file() {
            log::debug!(
                "Final file '{}' of created '{}' not found, keep creation",
                final_path,
                src_path
            );
            return Ok(Event::created(src_path, false));
        }

        Ok(Event::with_content(
            src_path,
            self.read_final_content(final_path)?,
        ))
    }

    fn read_final_content(&self, final_path: &str) -> Result<Content, InvertError> {
        let path = self.root_dir.join(final_path);
        read_content(&path).map_err(|error| InvertError::ReadContent(path, error))
    }
}

/// Invert `events` against the final state located at `root_dir`
pub fn invert(root_dir: &Path, events: &[Event]) -> Result<Vec<Event>, InvertError> {
    Inverter::new(root_dir).invert(events)
}
