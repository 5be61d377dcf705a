//! In-memory file trees
//!
//! A [`WorkingTree`] maps relative paths to file contents and remembers which
//! source archive supplied each file. Trees are plain values: merging and
//! module assembly transform them without touching the filesystem, and only
//! the load/write helpers here perform I/O.

use crate::archive::Container;
use crate::report::{Warning, WarningKind};
use crate::PackResult;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Seek};
use std::path::{Component, Path};
use walkdir::WalkDir;

/// A file in a working tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
    /// File contents
    pub content: Vec<u8>,
    /// Name of the archive or directory that supplied the file
    pub source: String,
}

/// Relative path → file mapping, iterated in sorted path order
#[derive(Debug, Clone, Default)]
pub struct WorkingTree {
    files: BTreeMap<String, TreeFile>,
    total_size: u64,
}

impl WorkingTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, replacing any previous file at the same path
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        content: Vec<u8>,
        source: impl Into<String>,
    ) -> Option<TreeFile> {
        self.total_size += content.len() as u64;
        let previous = self.files.insert(
            normalize(&path.into()),
            TreeFile {
                content,
                source: source.into(),
            },
        );
        if let Some(ref old) = previous {
            self.total_size -= old.content.len() as u64;
        }
        previous
    }

    /// Remove a file
    pub fn remove(&mut self, path: &str) -> Option<TreeFile> {
        let removed = self.files.remove(path);
        if let Some(ref file) = removed {
            self.total_size -= file.content.len() as u64;
        }
        removed
    }

    /// Check if a file exists at `path`
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Get a file
    pub fn get(&self, path: &str) -> Option<&TreeFile> {
        self.files.get(path)
    }

    /// Get the contents of a file
    pub fn content(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|f| f.content.as_slice())
    }

    /// All paths in sorted order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// All files in sorted path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeFile)> {
        self.files.iter().map(|(p, f)| (p.as_str(), f))
    }

    /// Get the number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Get total uncompressed size
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Load every regular file below `root`.
    ///
    /// Files that cannot be read are skipped and reported as warnings.
    pub fn from_dir(root: impl AsRef<Path>) -> PackResult<(Self, Vec<Warning>)> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a directory: {}", root.display()),
            )
            .into());
        }

        let source = root.display().to_string();
        let mut tree = Self::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let subject = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| source.clone());
                    warnings.push(Warning::new(
                        WarningKind::PartialCopy,
                        subject,
                        e.to_string(),
                    ));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");

            match fs::read(entry.path()) {
                Ok(content) => {
                    tracing::debug!("Loaded {} ({} bytes)", relative, content.len());
                    tree.insert(relative, content, source.as_str());
                }
                Err(e) => warnings.push(Warning::new(
                    WarningKind::PartialCopy,
                    relative,
                    format!("unreadable, skipped: {e}"),
                )),
            }
        }

        Ok((tree, warnings))
    }

    /// Load every file entry of a container.
    ///
    /// Directory markers are dropped; entries that escape the archive root or
    /// cannot be decompressed are skipped and reported as warnings.
    pub fn from_container<R: Read + Seek>(container: &mut Container<R>) -> (Self, Vec<Warning>) {
        let source = container.label().to_string();
        let mut tree = Self::new();
        let mut warnings = Vec::new();

        for entry in container.entries().to_vec() {
            if entry.is_directory || entry.path.ends_with('/') {
                continue;
            }
            if !entry.enclosed {
                warnings.push(Warning::new(
                    WarningKind::PartialCopy,
                    entry.path.as_str(),
                    "path escapes the archive root, skipped",
                ));
                continue;
            }
            match container.read_entry(&entry) {
                Ok(content) => {
                    tree.insert(entry.path, content, source.as_str());
                }
                Err(e) => warnings.push(Warning::new(
                    WarningKind::PartialCopy,
                    entry.path.as_str(),
                    e.to_string(),
                )),
            }
        }

        (tree, warnings)
    }

    /// Write every file below `dest`, creating parent directories.
    ///
    /// Per-file failures are skipped and reported as warnings.
    pub fn write_to_dir(&self, dest: impl AsRef<Path>) -> Vec<Warning> {
        let dest = dest.as_ref();
        let mut warnings = Vec::new();

        for (path, file) in self.iter() {
            if !is_relative_safe(path) {
                warnings.push(Warning::new(
                    WarningKind::PartialCopy,
                    path,
                    "path escapes the destination, skipped",
                ));
                continue;
            }
            let target = dest.join(path);
            let written = target
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| fs::write(&target, &file.content));
            if let Err(e) = written {
                warnings.push(Warning::new(
                    WarningKind::PartialCopy,
                    path,
                    format!("write failed, skipped: {e}"),
                ));
            }
        }

        warnings
    }
}

/// Normalize path separators to forward slashes and drop a leading `./`
pub(crate) fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").map(str::to_string).unwrap_or(path)
}

/// Whether `path` only contains normal components
pub(crate) fn is_relative_safe(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_replaces_and_tracks_size() {
        let mut tree = WorkingTree::new();
        assert!(tree.insert("a", vec![1, 2, 3], "one").is_none());
        let old = tree.insert("a", vec![1], "two").unwrap();
        assert_eq!(old.source, "one");
        assert_eq!(tree.total_size(), 1);
        assert_eq!(tree.get("a").unwrap().source, "two");
    }

    #[test]
    fn test_paths_are_sorted_and_normalized() {
        let mut tree = WorkingTree::new();
        tree.insert("z.txt", vec![], "s");
        tree.insert("res\\values\\a.xml", vec![], "s");
        tree.insert("./b.txt", vec![], "s");
        let paths: Vec<_> = tree.paths().collect();
        assert_eq!(paths, vec!["b.txt", "res/values/a.xml", "z.txt"]);
    }

    #[test]
    fn test_dir_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut tree = WorkingTree::new();
        tree.insert("lib/arm64-v8a/libx.so", b"elf".to_vec(), "s");
        tree.insert("classes.dex", b"dex".to_vec(), "s");

        let warnings = tree.write_to_dir(temp.path());
        assert!(warnings.is_empty());

        let (loaded, warnings) = WorkingTree::from_dir(temp.path()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.content("lib/arm64-v8a/libx.so").unwrap(), b"elf");
    }

    #[test]
    fn test_write_rejects_escaping_paths() {
        let temp = TempDir::new().unwrap();
        let mut tree = WorkingTree::new();
        tree.insert("../evil.txt", b"x".to_vec(), "s");
        let warnings = tree.write_to_dir(temp.path());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::PartialCopy);
    }

    #[test]
    fn test_from_dir_missing_root() {
        assert!(WorkingTree::from_dir("/nonexistent/apkpack/root").is_err());
    }
}
