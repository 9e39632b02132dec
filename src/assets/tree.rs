//! Directory listing abstraction used by the asset search
//!
//! The search only ever needs "what is in this directory", so that is the
//! whole trait. `OsTree` answers from the real filesystem, `MemoryTree`
//! from a map built in tests.

use log::debug;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Kind of a directory entry, after resolving symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Sockets, devices, dangling symlinks
    Other,
}

impl From<fs::FileType> for EntryKind {
    fn from(ft: fs::FileType) -> Self {
        if ft.is_dir() {
            EntryKind::Dir
        } else if ft.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: OsString,
    /// Kind of the entry's target (symlinks resolved)
    pub kind: EntryKind,
    /// Whether the entry itself is a symlink
    pub is_symlink: bool,
}

/// Source of directory listings
pub trait DirectoryTree {
    /// List the entries of `dir`, in any order
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<TreeEntry>>;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct OsTree;

impl DirectoryTree for OsTree {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<TreeEntry>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry in {:?}: {}", dir, e);
                    continue;
                }
            };

            // file_type() does not follow symlinks
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    debug!("Skipping {:?}: {}", entry.path(), e);
                    continue;
                }
            };

            let is_symlink = file_type.is_symlink();
            let kind = if is_symlink {
                fs::metadata(entry.path())
                    .map(|m| EntryKind::from(m.file_type()))
                    .unwrap_or(EntryKind::Other)
            } else {
                EntryKind::from(file_type)
            };

            entries.push(TreeEntry {
                name: entry.file_name(),
                kind,
                is_symlink,
            });
        }

        Ok(entries)
    }
}

/// In-memory directory tree
///
/// Parents are created implicitly, so `with_file("/r/a/b.vvm")` also adds
/// the directories `/r` and `/r/a`.
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    dirs: HashMap<PathBuf, Vec<TreeEntry>>,
    unreadable: HashSet<PathBuf>,
}

impl MemoryTree {
    /// Create a tree containing only the (empty) directory `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut tree = Self::default();
        tree.dirs.insert(root.into(), Vec::new());
        tree
    }

    /// Add a regular file
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.insert(path.as_ref(), EntryKind::File, false);
        self
    }

    /// Add a directory
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.insert(path.as_ref(), EntryKind::Dir, false);
        self
    }

    /// Add a symlink whose target has the given kind
    ///
    /// Symlinked directories have no listing; the search never enters them.
    pub fn with_symlink(mut self, path: impl AsRef<Path>, target: EntryKind) -> Self {
        self.insert(path.as_ref(), target, true);
        self
    }

    /// Make listing `path` fail with a permission error
    pub fn with_unreadable(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.insert(path, EntryKind::Dir, false);
        self.unreadable.insert(path.to_path_buf());
        self
    }

    fn insert(&mut self, path: &Path, kind: EntryKind, is_symlink: bool) {
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if !self.dirs.contains_key(parent) {
                self.insert(parent, EntryKind::Dir, false);
            }
            let siblings = self.dirs.entry(parent.to_path_buf()).or_default();
            if !siblings.iter().any(|e| e.name.as_os_str() == name) {
                siblings.push(TreeEntry {
                    name: name.to_os_string(),
                    kind,
                    is_symlink,
                });
            }
        }

        if kind == EntryKind::Dir && !is_symlink {
            self.dirs.entry(path.to_path_buf()).or_default();
        }
    }
}

impl DirectoryTree for MemoryTree {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<TreeEntry>> {
        if self.unreadable.contains(dir) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", dir.display()),
            ));
        }
        self.dirs.get(dir).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", dir.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_tree_creates_parents() {
        let tree = MemoryTree::new("/r").with_file("/r/a/b/model.vvm");

        let top = tree.read_dir(Path::new("/r")).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "a");
        assert_eq!(top[0].kind, EntryKind::Dir);

        let leaf = tree.read_dir(Path::new("/r/a/b")).unwrap();
        assert_eq!(leaf[0].name, "model.vvm");
        assert_eq!(leaf[0].kind, EntryKind::File);
    }

    #[test]
    fn test_memory_tree_missing_and_unreadable() {
        let tree = MemoryTree::new("/r").with_unreadable("/r/locked");
        assert_eq!(
            tree.read_dir(Path::new("/nope")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
        assert_eq!(
            tree.read_dir(Path::new("/r/locked")).unwrap_err().kind(),
            io::ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn test_os_tree_lists_kinds() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("file.bin"), b"x").unwrap();

        let mut entries = OsTree.read_dir(dir.path()).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "file.bin");
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[1].name, "sub");
        assert_eq!(entries[1].kind, EntryKind::Dir);
        assert!(!entries[1].is_symlink);
    }

    #[cfg(unix)]
    #[test]
    fn test_os_tree_resolves_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dangling")).unwrap();

        let entries = OsTree.read_dir(dir.path()).unwrap();
        let link = entries.iter().find(|e| e.name == "link").unwrap();
        assert!(link.is_symlink);
        assert_eq!(link.kind, EntryKind::Dir);

        let dangling = entries.iter().find(|e| e.name == "dangling").unwrap();
        assert_eq!(dangling.kind, EntryKind::Other);
    }
}
