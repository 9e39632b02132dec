//! Recursive search for engine assets under a root directory
//!
//! Traversal order is fixed so that repeated searches over an unchanged tree
//! return the same path:
//! - pre-order, depth first
//! - entries of a directory are visited in byte order of their names
//! - every entry of a directory is checked for a match before any of its
//!   subdirectories is entered, so a shallower match in the same branch wins
//! - symlinked directories are never entered (no cycles); a symlink can still
//!   be a match if its target has the wanted kind
//! - directories that cannot be listed are skipped

use super::tree::{DirectoryTree, EntryKind, OsTree};
use super::{AssetNames, EngineAssets};
use crate::error::AssetKind;
use crate::{Result, VvspeakError};
use log::{debug, info, warn};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Search `root` for an entry called `name` whose kind is `want`
///
/// Returns `None` when the tree is exhausted, including when `root` itself
/// does not exist or cannot be listed.
pub fn search(
    tree: &dyn DirectoryTree,
    root: &Path,
    name: &str,
    want: EntryKind,
) -> Option<PathBuf> {
    search_dir(tree, root, OsStr::new(name), want)
}

fn search_dir(
    tree: &dyn DirectoryTree,
    dir: &Path,
    name: &OsStr,
    want: EntryKind,
) -> Option<PathBuf> {
    let mut entries = match tree.read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read {}: {}", dir.display(), e);
            return None;
        }
    };
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    if let Some(hit) = entries
        .iter()
        .find(|e| e.name.as_os_str() == name && e.kind == want)
    {
        return Some(dir.join(&hit.name));
    }

    entries
        .iter()
        .filter(|e| e.kind == EntryKind::Dir && !e.is_symlink)
        .find_map(|e| search_dir(tree, &dir.join(&e.name), name, want))
}

/// Finds engine assets, failing with `AssetNotFound` when one is missing
pub struct AssetLocator<T: DirectoryTree = OsTree> {
    tree: T,
}

impl AssetLocator<OsTree> {
    /// Locator over the real filesystem
    pub fn new() -> Self {
        Self { tree: OsTree }
    }
}

impl Default for AssetLocator<OsTree> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DirectoryTree> AssetLocator<T> {
    /// Locator over an arbitrary tree
    pub fn with_tree(tree: T) -> Self {
        Self { tree }
    }

    /// Find a regular file named `file_name` anywhere under `root`
    pub fn find_by_file_name(
        &self,
        root: &Path,
        file_name: &str,
        kind: AssetKind,
    ) -> Result<PathBuf> {
        self.find(root, file_name, EntryKind::File, kind)
    }

    /// Find a directory named `dir_name` anywhere under `root`
    pub fn find_by_dir_name(
        &self,
        root: &Path,
        dir_name: &str,
        kind: AssetKind,
    ) -> Result<PathBuf> {
        self.find(root, dir_name, EntryKind::Dir, kind)
    }

    fn find(&self, root: &Path, name: &str, want: EntryKind, kind: AssetKind) -> Result<PathBuf> {
        info!("Searching for {} '{}' under {} ...", kind, name, root.display());

        match search(&self.tree, root, name, want) {
            Some(path) => {
                info!("Found {} at: {}", kind, path.display());
                Ok(path)
            }
            None => Err(VvspeakError::AssetNotFound {
                kind,
                root: root.to_path_buf(),
                name: name.to_string(),
            }),
        }
    }

    /// Resolve every asset the engine needs, stopping at the first missing one
    pub fn resolve(&self, root: &Path, names: &AssetNames) -> Result<EngineAssets> {
        debug!("Resolving engine assets under {}", root.display());

        let assets = EngineAssets {
            runtime_library: self.find_by_file_name(
                root,
                &names.runtime_library,
                AssetKind::RuntimeLibrary,
            )?,
            dictionary_dir: self.find_by_dir_name(
                root,
                &names.dictionary_dir,
                AssetKind::Dictionary,
            )?,
            voice_model: self.find_by_file_name(root, &names.voice_model, AssetKind::VoiceModel)?,
            core_library: self.find_by_file_name(
                root,
                &names.core_library,
                AssetKind::CoreLibrary,
            )?,
        };

        info!("onnxruntime : {}", assets.runtime_library.display());
        info!("open_jtalk  : {}", assets.dictionary_dir.display());
        info!("vvm         : {}", assets.voice_model.display());
        info!("core        : {}", assets.core_library.display());

        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tree::MemoryTree;

    #[test]
    fn test_shallow_match_wins_within_branch() {
        let tree = MemoryTree::new("/r")
            .with_file("/r/0.vvm")
            .with_file("/r/a/0.vvm");
        assert_eq!(
            search(&tree, Path::new("/r"), "0.vvm", EntryKind::File),
            Some(PathBuf::from("/r/0.vvm"))
        );
    }

    #[test]
    fn test_lexical_order_across_branches() {
        let tree = MemoryTree::new("/r")
            .with_file("/r/b/0.vvm")
            .with_file("/r/a/deep/er/0.vvm");
        assert_eq!(
            search(&tree, Path::new("/r"), "0.vvm", EntryKind::File),
            Some(PathBuf::from("/r/a/deep/er/0.vvm"))
        );
    }

    #[test]
    fn test_kind_must_match() {
        let tree = MemoryTree::new("/r")
            .with_dir("/r/a/open_jtalk_dic_utf_8-1.11")
            .with_file("/r/b/open_jtalk_dic_utf_8-1.11");

        assert_eq!(
            search(&tree, Path::new("/r"), "open_jtalk_dic_utf_8-1.11", EntryKind::File),
            Some(PathBuf::from("/r/b/open_jtalk_dic_utf_8-1.11"))
        );
        assert_eq!(
            search(&tree, Path::new("/r"), "open_jtalk_dic_utf_8-1.11", EntryKind::Dir),
            Some(PathBuf::from("/r/a/open_jtalk_dic_utf_8-1.11"))
        );
    }

    #[test]
    fn test_symlinked_dirs_not_entered() {
        let tree = MemoryTree::new("/r")
            .with_symlink("/r/loop", EntryKind::Dir)
            .with_file("/r/z/0.vvm");
        assert_eq!(
            search(&tree, Path::new("/r"), "0.vvm", EntryKind::File),
            Some(PathBuf::from("/r/z/0.vvm"))
        );
    }

    #[test]
    fn test_symlink_can_match() {
        let tree = MemoryTree::new("/r").with_symlink("/r/models/0.vvm", EntryKind::File);
        assert_eq!(
            search(&tree, Path::new("/r"), "0.vvm", EntryKind::File),
            Some(PathBuf::from("/r/models/0.vvm"))
        );
    }

    #[test]
    fn test_unreadable_dir_skipped() {
        let tree = MemoryTree::new("/r")
            .with_unreadable("/r/a")
            .with_file("/r/b/0.vvm");
        assert_eq!(
            search(&tree, Path::new("/r"), "0.vvm", EntryKind::File),
            Some(PathBuf::from("/r/b/0.vvm"))
        );
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let locator = AssetLocator::with_tree(MemoryTree::new("/r"));
        let err = locator
            .find_by_file_name(Path::new("/elsewhere"), "0.vvm", AssetKind::VoiceModel)
            .unwrap_err();
        assert!(matches!(
            err,
            VvspeakError::AssetNotFound { kind: AssetKind::VoiceModel, .. }
        ));
    }
}
