//! Plumbing shared by the converters

use crate::config::ConverterConfig;
use crate::keystore::CredentialStore;
use crate::progress::{ProgressSink, TracingSink};
use crate::toolchain::Toolchain;
use crate::{PackError, PackResult};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

/// Everything a converter needs besides its input
#[derive(Clone)]
pub(crate) struct Services {
    pub config: ConverterConfig,
    pub toolchain: Toolchain,
    pub credentials: CredentialStore,
    pub sink: Arc<dyn ProgressSink>,
}

impl Services {
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            toolchain: Toolchain::new(&config),
            credentials: CredentialStore::new(config.keystore_dir()),
            sink: Arc::new(TracingSink),
            config,
        }
    }
}

/// File name without its extension
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Display name of an input
pub(crate) fn item_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Create `dir` and remove a previous artifact at `output`
pub(crate) fn prepare_output(dir: &Path, output: &Path) -> PackResult<()> {
    fs::create_dir_all(dir)?;
    if output.exists() {
        tracing::debug!("Replacing existing {}", output.display());
        fs::remove_file(output)?;
    }
    Ok(())
}

/// Size and hex SHA-256 of a produced artifact.
///
/// A missing or empty artifact means the producing step failed silently.
pub(crate) fn verify_output(path: &Path, producer: &str) -> PackResult<(u64, String)> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => {
            return Err(PackError::tool(
                producer,
                format!("no output at {}", path.display()),
            ))
        }
    };
    if size == 0 {
        return Err(PackError::tool(
            producer,
            format!("empty output at {}", path.display()),
        ));
    }

    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    let digest = format!("{:x}", hasher.finalize());

    tracing::info!(
        size,
        sha256 = %digest,
        "Verified {}",
        path.display()
    );
    Ok((size, digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_verify_output_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.bin");
        fs::write(&path, b"abc").unwrap();

        let (size, digest) = verify_output(&path, "test").unwrap();
        assert_eq!(size, 3);
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_output_rejects_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.bin");
        fs::write(&path, b"").unwrap();
        assert!(verify_output(&path, "test").is_err());
        assert!(verify_output(&temp.path().join("missing"), "test").is_err());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("dir/app.v2.xapk")), "app.v2");
        assert_eq!(item_name(Path::new("dir/app.xapk")), "app.xapk");
    }
}
