//! Read-only access to zip containers
//!
//! A [`Container`] wraps a zip archive and exposes its entries in archive
//! order. Entry bytes are only read on request, so large payloads such as
//! OBB expansion files are never pulled into memory unless asked for.

use crate::{PackError, PackResult};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// One entry of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    /// Path of the entry inside the archive, as stored
    pub path: String,
    /// Whether the entry is a directory marker
    pub is_directory: bool,
    /// Uncompressed size in bytes
    pub size: u64,
    /// Whether the path stays inside the archive root (no `..`, not absolute)
    pub enclosed: bool,
    index: usize,
}

/// An opened zip container
pub struct Container<R = BufReader<File>> {
    label: String,
    archive: ZipArchive<R>,
    entries: Vec<ContainerEntry>,
}

impl Container<BufReader<File>> {
    /// Open a container from disk
    pub fn open(path: impl AsRef<Path>) -> PackResult<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let file = File::open(path).map_err(|e| PackError::bad_archive(&label, e))?;
        Self::from_reader(label, BufReader::new(file))
    }
}

impl Container<Cursor<Vec<u8>>> {
    /// Open a container held in memory (e.g. a sub-archive read from another container)
    pub fn from_bytes(label: impl Into<String>, bytes: Vec<u8>) -> PackResult<Self> {
        Self::from_reader(label, Cursor::new(bytes))
    }
}

impl<R: Read + Seek> Container<R> {
    /// Open a container from any seekable reader
    pub fn from_reader(label: impl Into<String>, reader: R) -> PackResult<Self> {
        let label = label.into();
        let mut archive =
            ZipArchive::new(reader).map_err(|e| PackError::bad_archive(&label, e))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive
                .by_index_raw(index)
                .map_err(|e| PackError::bad_archive(&label, e))?;
            entries.push(ContainerEntry {
                path: file.name().to_string(),
                is_directory: file.is_dir(),
                size: file.size(),
                enclosed: file.enclosed_name().is_some(),
                index,
            });
        }

        tracing::debug!("Opened container {} ({} entries)", label, entries.len());

        Ok(Self {
            label,
            archive,
            entries,
        })
    }

    /// Human readable name of the container (usually its path)
    pub fn label(&self) -> &str {
        &self.label
    }

    /// All entries in archive order
    pub fn entries(&self) -> &[ContainerEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the container has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by exact path
    pub fn entry(&self, path: &str) -> Option<&ContainerEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Read the bytes of the entry at `path`
    pub fn read(&mut self, path: &str) -> PackResult<Vec<u8>> {
        let index = self
            .entry(path)
            .map(|e| e.index)
            .ok_or_else(|| PackError::bad_archive(&self.label, format!("missing entry {path}")))?;
        self.read_index(index)
    }

    /// Read the bytes of an entry previously returned by [`Container::entries`]
    pub fn read_entry(&mut self, entry: &ContainerEntry) -> PackResult<Vec<u8>> {
        self.read_index(entry.index)
    }

    fn read_index(&mut self, index: usize) -> PackResult<Vec<u8>> {
        let mut file = self
            .archive
            .by_index(index)
            .map_err(|e| PackError::bad_archive(&self.label, e))?;

        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content).map_err(|e| {
            PackError::bad_archive(&self.label, format!("{}: {}", file.name(), e))
        })?;
        Ok(content)
    }
}
