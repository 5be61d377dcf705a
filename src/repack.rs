//! Serialization of working trees into zip containers

use crate::tree::WorkingTree;
use crate::{PackError, PackResult};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Serialize every file of `tree` into a deflate-compressed zip.
///
/// Entries are written in sorted path order with a fixed timestamp, so the
/// same tree always produces the same bytes.
pub fn repack(tree: &WorkingTree) -> PackResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let base_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for (path, file) in tree.iter() {
        let options = base_options.large_file(file.content.len() as u64 >= u64::from(u32::MAX));
        writer
            .start_file(path, options)
            .map_err(|e| PackError::Compression(format!("{path}: {e}")))?;
        writer.write_all(&file.content)?;
    }

    let bytes = writer
        .finish()
        .map_err(|e| PackError::Compression(e.to_string()))?
        .into_inner();

    tracing::debug!(
        "Repacked {} files ({} bytes) into {} bytes",
        tree.len(),
        tree.total_size(),
        bytes.len()
    );

    Ok(bytes)
}

/// Repack `tree` and write the container to `path`, returning its size
pub fn repack_to(tree: &WorkingTree, path: impl AsRef<Path>) -> PackResult<u64> {
    let path = path.as_ref();
    let bytes = repack(tree)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &bytes)?;
    tracing::info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes.len() as u64)
}
