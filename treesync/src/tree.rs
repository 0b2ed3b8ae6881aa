use std::{
    collections::{hash_map::Entry, HashMap},
    fmt::Write,
    path::{Path, PathBuf},
};

use treesync_core::types::RelativeFilePath;

use crate::error::TreeError;

/// Why earlier history of a node is superseded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// A later event deleted the node
    Deleted,
    /// A later event content has been captured for the node
    Modified,
}

/// One path segment of the tree. `name` is the segment name at the instant
/// currently reached by the backward traversal, `final_path` is where the
/// entity lives once all events happened.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    name: String,
    final_path: RelativeFilePath,
    is_directory: bool,
    mark: Option<Mark>,
    children: HashMap<String, Node>,
}

impl Node {
    pub fn new(name: &str, final_path: &str, is_directory: bool) -> Result<Self, TreeError> {
        if final_path.contains("//") {
            return Err(TreeError::InvalidPath(final_path.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            final_path: final_path.to_string(),
            is_directory,
            mark: None,
            children: HashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn final_path(&self) -> &str {
        &self.final_path
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn mark(&self) -> Option<Mark> {
        self.mark
    }

    pub fn to_ignore(&self) -> bool {
        self.mark.is_some()
    }

    pub fn children(&self) -> &HashMap<String, Node> {
        &self.children
    }

    fn child_final_path(&self, name: &str) -> String {
        if self.final_path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.final_path, name)
        }
    }

    fn render(&self, depth: usize, output: &mut String) {
        let mut flags = vec![];
        if self.is_directory {
            flags.push("dir".to_string());
        }
        if let Some(mark) = self.mark {
            flags.push(format!("{:?}", mark).to_lowercase());
        }
        // Writing into a String can't fail
        let _ = writeln!(
            output,
            "{}{} ({}) [{}]",
            "  ".repeat(depth),
            if depth == 0 { "/" } else { &self.name },
            self.final_path,
            flags.join(",")
        );

        let mut names = self.children.keys().collect::<Vec<&String>>();
        names.sort();
        for name in names {
            if let Some(child) = self.children.get(name) {
                child.render(depth + 1, output);
            }
        }
    }
}

/// Path namespace reconstructed backward in time from a final filesystem
/// state located at `root_dir`.
#[derive(Debug)]
pub struct PathTree {
    root_dir: PathBuf,
    root: Node,
}

fn parts(path: &str) -> Result<Vec<&str>, TreeError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(vec![]);
    }

    let parts = trimmed.split('/').collect::<Vec<&str>>();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(TreeError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

impl PathTree {
    pub fn new(root_dir: &Path) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
            // Root node name and final path are empty, which is a valid path
            root: Node {
                name: "".to_string(),
                final_path: "".to_string(),
                is_directory: true,
                mark: None,
                children: HashMap::new(),
            },
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Nodes from root to the leaf of `path`, `None` for each segment not
    /// (yet) known by the tree
    pub fn node_chain(&self, path: &str) -> Result<Vec<Option<&Node>>, TreeError> {
        let mut chain = vec![Some(&self.root)];
        let mut current = Some(&self.root);
        for part in parts(path)? {
            current = current.and_then(|node| node.children.get(part));
            chain.push(current);
        }
        Ok(chain)
    }

    pub fn get(&self, path: &str) -> Result<Option<&Node>, TreeError> {
        Ok(self.node_chain(path)?.pop().flatten())
    }

    /// Resolve `path`, creating missing nodes. A created leaf is a directory
    /// if its final path is a directory on disk, intermediate nodes are
    /// directories.
    pub fn get_or_create(&mut self, path: &str) -> Result<&Node, TreeError> {
        let parts = parts(path)?;
        Ok(self.resolve(&parts, None)?)
    }

    fn resolve(
        &mut self,
        parts: &[&str],
        leaf_is_directory: Option<bool>,
    ) -> Result<&mut Node, TreeError> {
        let root_dir = &self.root_dir;
        let mut current = &mut self.root;
        for (index, part) in parts.iter().enumerate() {
            let is_leaf = index + 1 == parts.len();
            let final_path = current.child_final_path(part);
            current = match current.children.entry(part.to_string()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let is_directory = match (is_leaf, leaf_is_directory) {
                        (false, _) => true,
                        (true, Some(is_directory)) => is_directory,
                        (true, None) => root_dir.join(&final_path).is_dir(),
                    };
                    entry.insert(Node::new(part, &final_path, is_directory)?)
                }
            };
        }
        Ok(current)
    }

    fn resolve_existing_mut(&mut self, parts: &[&str]) -> Option<&mut Node> {
        let mut current = &mut self.root;
        for part in parts {
            current = current.children.get_mut(*part)?;
        }
        Some(current)
    }

    /// Nearest mark found on `path` node or one of its ancestors
    pub fn ignore_mark(&self, path: &str) -> Result<Option<Mark>, TreeError> {
        Ok(self
            .node_chain(path)?
            .into_iter()
            .flatten()
            .filter_map(|node| node.mark)
            .last())
    }

    pub fn is_ignored(&self, path: &str) -> Result<bool, TreeError> {
        Ok(self.ignore_mark(path)?.is_some())
    }

    /// True when `path` node or one of its ancestors is marked as deleted
    pub fn is_deleted(&self, path: &str) -> Result<bool, TreeError> {
        Ok(self
            .node_chain(path)?
            .into_iter()
            .flatten()
            .any(|node| node.mark == Some(Mark::Deleted)))
    }

    /// True when a strict ancestor of `path` is marked as deleted
    pub fn has_deleted_ancestor(&self, path: &str) -> Result<bool, TreeError> {
        let mut chain = self.node_chain(path)?;
        chain.pop();
        Ok(chain
            .into_iter()
            .flatten()
            .any(|node| node.mark == Some(Mark::Deleted)))
    }

    pub fn mark_ignore(&mut self, path: &str, mark: Mark) -> Result<(), TreeError> {
        let parts = parts(path)?;
        let node = self.resolve(&parts, None)?;
        node.mark = Some(mark);
        Ok(())
    }

    /// Remove the subtree at `path` and return it
    pub fn detach(&mut self, path: &str) -> Result<Option<Node>, TreeError> {
        let parts = parts(path)?;
        let (name, parent_parts) = match parts.split_last() {
            Some(split) => split,
            None => return Err(TreeError::InvalidPath(path.to_string())),
        };
        Ok(self
            .resolve_existing_mut(parent_parts)
            .and_then(|parent| parent.children.remove(*name)))
    }

    /// Rename the node at `old_path` to `new_path`. The node keeps its final
    /// path and children.
    pub fn move_node(&mut self, old_path: &str, new_path: &str) -> Result<(), TreeError> {
        if self.get(new_path)?.is_some() {
            return Err(TreeError::ConflictingRename(
                old_path.to_string(),
                new_path.to_string(),
            ));
        }
        let new_parts = parts(new_path)?;
        let (new_name, new_parent_parts) = match new_parts.split_last() {
            Some(split) => split,
            None => return Err(TreeError::InvalidPath(new_path.to_string())),
        };

        self.get_or_create(old_path)?;
        let mut node = self
            .detach(old_path)?
            .ok_or_else(|| TreeError::InvalidPath(old_path.to_string()))?;
        node.name = new_name.to_string();

        let new_parent = self.resolve(new_parent_parts, Some(true))?;
        new_parent.children.insert(new_name.to_string(), node);
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut output = String::new();
        self.root.render(0, &mut output);
        output
    }
}
