use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, RecvTimeoutError},
        Arc,
    },
    time::Duration,
};

use crossbeam_channel::Sender;
use notify::{watcher, DebouncedEvent, RecursiveMode, Watcher};
use treesync_core::{event::Event, types::RelativeFilePath, utils::slash_path};
use walkdir::WalkDir;

use crate::error::WatchError;

trait IntoRelative {
    fn relative(&self, prefix: &Path) -> Option<RelativeFilePath>;
}

impl IntoRelative for PathBuf {
    fn relative(&self, prefix: &Path) -> Option<RelativeFilePath> {
        self.strip_prefix(prefix).ok().map(slash_path)
    }
}

/// Translate debounced filesystem notifications of a root directory into
/// root relative events. Known directories are indexed so a removal can be
/// reported with its type.
pub struct LocalWatcher {
    root: PathBuf,
    debounce: Duration,
    stop_signal: Arc<AtomicBool>,
    sender: Sender<Event>,
    directories: BTreeSet<PathBuf>,
}

impl LocalWatcher {
    pub fn new(
        root: &Path,
        debounce: Duration,
        stop_signal: Arc<AtomicBool>,
        sender: Sender<Event>,
    ) -> Result<Self, WatchError> {
        let root =
            fs::canonicalize(root).map_err(|error| WatchError::Io(root.to_path_buf(), error))?;
        let mut directories = BTreeSet::new();
        for entry in WalkDir::new(&root).min_depth(1) {
            let entry = entry.map_err(|error| WatchError::Index(root.clone(), error))?;
            if entry.file_type().is_dir() {
                directories.insert(entry.path().to_path_buf());
            }
        }

        Ok(Self {
            root,
            debounce,
            stop_signal,
            sender,
            directories,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn listen(&mut self) -> Result<(), WatchError> {
        log::debug!("[{}] Start listening for local changes", self.root.display());
        let (inotify_sender, inotify_receiver) = channel();
        let mut inotify_watcher = watcher(inotify_sender, self.debounce)?;
        inotify_watcher.watch(&self.root, RecursiveMode::Recursive)?;

        loop {
            match inotify_receiver.recv_timeout(Duration::from_millis(250)) {
                Ok(event) => {
                    for event in self.digest_event(&event) {
                        if let Err(error) = self.sender.send(event) {
                            log::error!(
                                "[{}] Error when send local event : '{}'",
                                self.root.display(),
                                error
                            );
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.stop_signal.load(Ordering::Relaxed) {
                        log::info!(
                            "[{}] Finished local listening (on stop signal)",
                            self.root.display()
                        );
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log::error!(
                        "[{}] Finished local listening (on channel closed)",
                        self.root.display()
                    );
                    break;
                }
            }
        }

        Ok(())
    }

    pub fn digest_event(&mut self, event: &DebouncedEvent) -> Vec<Event> {
        log::debug!("[{}] Local event received: {:?}", self.root.display(), event);

        let events = match event {
            DebouncedEvent::Create(absolute_path) => self.created(absolute_path),
            DebouncedEvent::Write(absolute_path) => absolute_path
                .relative(&self.root)
                .map(|path| vec![Event::modified(&path, absolute_path.is_dir())])
                .unwrap_or_default(),
            DebouncedEvent::Remove(absolute_path) => self.removed(absolute_path),
            DebouncedEvent::Rename(absolute_source_path, absolute_dest_path) => {
                match (
                    absolute_source_path.relative(&self.root),
                    absolute_dest_path.relative(&self.root),
                ) {
                    (Some(src_path), Some(dest_path)) => {
                        let is_directory = absolute_dest_path.is_dir();
                        if is_directory {
                            self.forget_directory(absolute_source_path);
                            self.index_directory(absolute_dest_path);
                        }
                        vec![Event::moved(&src_path, &dest_path, is_directory)]
                    }
                    (Some(_), None) => self.removed(absolute_source_path),
                    (None, Some(_)) => self.created(absolute_dest_path),
                    (None, None) => vec![],
                }
            }
            // Ignore these
            DebouncedEvent::NoticeWrite(_)
            | DebouncedEvent::NoticeRemove(_)
            | DebouncedEvent::Chmod(_)
            | DebouncedEvent::Rescan => vec![],
            DebouncedEvent::Error(error, path) => {
                log::error!("Error {} on {:?}", error, path);
                vec![]
            }
        };

        log::debug!(
            "[{}] Produced events for event: {:?}",
            self.root.display(),
            &events
        );
        events
    }

    /// Creation of the entity and, for a directory, of all its content
    fn created(&mut self, absolute_path: &Path) -> Vec<Event> {
        let mut events = vec![];
        for entry in WalkDir::new(absolute_path).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    log::debug!("Unable to walk created '{:?}' : {}", absolute_path, error);
                    continue;
                }
            };
            let is_directory = entry.file_type().is_dir();
            if is_directory {
                self.directories.insert(entry.path().to_path_buf());
            }
            if let Some(path) = entry.path().to_path_buf().relative(&self.root) {
                events.push(Event::created(&path, is_directory));
            }
        }
        events
    }

    fn removed(&mut self, absolute_path: &Path) -> Vec<Event> {
        let is_directory = self.directories.contains(absolute_path);
        self.forget_directory(absolute_path);
        absolute_path
            .to_path_buf()
            .relative(&self.root)
            .map(|path| vec![Event::deleted(&path, is_directory)])
            .unwrap_or_default()
    }

    fn forget_directory(&mut self, absolute_path: &Path) {
        self.directories
            .retain(|directory| !directory.starts_with(absolute_path));
    }

    fn index_directory(&mut self, absolute_path: &Path) {
        for entry in WalkDir::new(absolute_path).into_iter().flatten() {
            if entry.file_type().is_dir() {
                self.directories.insert(entry.path().to_path_buf());
            }
        }
    }
}
