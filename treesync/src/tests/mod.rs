use std::collections::BTreeMap;
use std::fs;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use testdir::testdir;
use treesync_core::codec::{parse_lines, to_lines};
use treesync_core::config::SyncConfig;
use treesync_core::event::Event;
use treesync_core::types::Changeset;
use treesync_core::utils::{slash_path, tree_fingerprint};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::apply::apply;
use crate::invert::invert;
use crate::sync::{sync_init, sync_source, sync_target, sync_target_init, synchronized};

mod sync_scenarios;

pub fn tmpdir() -> PathBuf {
    let path = testdir!().join(PathBuf::from(Uuid::new_v4().to_string()));
    fs::create_dir_all(&path).unwrap();
    path
}

pub fn disk_files(tmpdir: &Path) -> Vec<String> {
    let mut files = WalkDir::new(tmpdir)
        .into_iter()
        .map(|entry| slash_path(entry.unwrap().path().strip_prefix(tmpdir).unwrap()))
        .filter(|p| !p.is_empty())
        .collect::<Vec<String>>();
    files.sort();
    files
}

pub fn fingerprint(root: &Path) -> BTreeMap<String, Option<String>> {
    tree_fingerprint(root).unwrap()
}

pub fn copy_tree(source: &Path, target: &Path) {
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.unwrap();
        let destination = target.join(entry.path().strip_prefix(source).unwrap());
        if entry.file_type().is_dir() {
            fs::create_dir_all(destination).unwrap();
        } else {
            fs::copy(entry.path(), destination).unwrap();
        }
    }
}

/// Mutate a filesystem and record the events a watcher would report
pub struct Mutator {
    fs: PathBuf,
    pub events: Vec<Event>,
}

impl Mutator {
    pub fn new(fs: &Path) -> Self {
        Self {
            fs: fs.to_path_buf(),
            events: vec![],
        }
    }

    pub fn touch(&mut self, path: &str) {
        let fs_path = self.fs.join(path);
        if fs_path.exists() {
            self.events.push(Event::modified(path, fs_path.is_dir()));
        } else {
            self.events.push(Event::created(path, false));
        }
        if !fs_path.is_dir() {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(fs_path)
                .unwrap();
        }
    }

    /// Record a modification without changing anything
    pub fn modified(&mut self, path: &str) {
        let is_directory = self.fs.join(path).is_dir();
        self.events.push(Event::modified(path, is_directory));
    }

    /// Record a creation without changing anything
    pub fn created(&mut self, path: &str) {
        let is_directory = self.fs.join(path).is_dir();
        self.events.push(Event::created(path, is_directory));
    }

    pub fn mkdir(&mut self, path: &str) {
        self.events.push(Event::created(path, true));
        fs::create_dir(self.fs.join(path)).unwrap();
    }

    pub fn unlink(&mut self, path: &str) {
        self.events.push(Event::deleted(path, false));
        fs::remove_file(self.fs.join(path)).unwrap();
    }

    pub fn rmdir(&mut self, path: &str) {
        self.events.push(Event::deleted(path, true));
        fs::remove_dir_all(self.fs.join(path)).unwrap();
    }

    pub fn rename(&mut self, old: &str, new: &str) {
        let is_directory = self.fs.join(old).is_dir();
        self.events.push(Event::moved(old, new, is_directory));
        fs::rename(self.fs.join(old), self.fs.join(new)).unwrap();
    }

    pub fn write<C: AsRef<[u8]>>(&mut self, path: &str, content: C) {
        self.events.push(Event::modified(path, false));
        fs::write(self.fs.join(path), content).unwrap();
    }
}

/// Invert events against a final state (`source`) and apply the result on a
/// copy of the initial state (`initial`)
pub struct FilesystemFixture {
    pub source: PathBuf,
    pub initial: PathBuf,
    pub inverted_events: Vec<Event>,
}

impl FilesystemFixture {
    pub fn new() -> Self {
        let root = tmpdir();
        let source = root.join("source");
        let initial = root.join("initial");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&initial).unwrap();
        Self {
            source,
            initial,
            inverted_events: vec![],
        }
    }

    /// Build the initial state
    pub fn init<F: FnOnce(&mut Mutator)>(&self, build: F) {
        let mut mutator = Mutator::new(&self.source);
        build(&mut mutator);
        copy_tree(&self.source, &self.initial);
    }

    /// Turn the initial state into the final one, return recorded events
    pub fn mutate<F: FnOnce(&mut Mutator)>(&self, mutate: F) -> Vec<Event> {
        let mut mutator = Mutator::new(&self.source);
        mutate(&mut mutator);
        mutator.events
    }

    pub fn invoke(&mut self, raw_events: &str) {
        let events = parse_lines(raw_events).unwrap();
        self.invoke_events(&events);
    }

    pub fn invoke_events(&mut self, events: &[Event]) {
        self.inverted_events = invert(&self.source, events).unwrap();
        apply(&self.initial, &self.inverted_events).unwrap();
    }

    pub fn assert_filesystem_are_equal(&self) {
        assert_eq!(fingerprint(&self.initial), fingerprint(&self.source));
    }
}

/// Source and target directories side by side in a same folder, raw events
/// being expressed relatively to that folder (`source/...`)
pub struct SyncFixture {
    pub root: PathBuf,
    pub source: PathBuf,
    pub target: PathBuf,
    pub config: SyncConfig,
}

impl SyncFixture {
    pub fn new() -> Self {
        let root = tmpdir();
        let source = root.join("source");
        let target = root.join("target");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&target).unwrap();
        Self {
            root,
            source,
            target,
            config: SyncConfig::default(),
        }
    }

    pub fn copy_source_to_target(&self) {
        copy_tree(&self.source, &self.target);
    }

    /// Run raw events through source side, json lines transport and target
    /// side. Return the transported changeset.
    pub fn apply_events(&self, raw_events: &str) -> Changeset {
        let events = parse_lines(raw_events)
            .unwrap()
            .into_iter()
            .map(|event| {
                event
                    .try_map_paths(|path| Ok(self.root.join(path).display().to_string()))
                    .unwrap()
            })
            .collect::<Vec<Event>>();

        let changeset = sync_source(&self.source, &events, &self.config).unwrap();
        let received = parse_lines(&to_lines(&changeset).unwrap()).unwrap();
        assert_eq!(received, changeset);
        sync_target(&self.target, &received).unwrap();
        changeset
    }

    pub fn do_init(&self) {
        let changeset = sync_init(&self.source, &self.config).unwrap();
        sync_target_init(&self.target, &changeset).unwrap();
    }

    pub fn synchronized(&self) -> bool {
        synchronized(&self.source, &self.target, &self.config).unwrap()
    }
}
