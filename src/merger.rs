//! Multi-way merge of split packages
//!
//! Sub-archives are merged in the order given (base first) into one
//! [`WorkingTree`]:
//!
//! - `META-INF/` entries are dropped, the merged package is re-signed later
//! - directory markers are never materialized
//! - a colliding `.dex` is renumbered to the lowest free `classesN.dex` (N ≥ 2)
//! - any other collision keeps the earlier file

use crate::archive::Container;
use crate::report::{Warning, WarningKind};
use crate::tree::{normalize, WorkingTree};
use crate::PackResult;
use std::io::{Read, Seek};

/// Prefix of signing metadata inside a package
const SIGNING_DIR: &str = "META-INF/";

/// Extension of bytecode containers
const DEX_EXT: &str = ".dex";

/// A merged tree plus the problems recovered along the way
#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub tree: WorkingTree,
    pub warnings: Vec<Warning>,
    /// `.dex` files that were renumbered, as (source path, new path)
    pub renamed_dex: Vec<(String, String)>,
}

/// Merge the packages `entries` of `container` into one tree.
///
/// Failing to read a listed entry from the outer container is a
/// [`crate::PackError::BadArchive`]; a listed entry that is not itself a zip
/// is skipped with a warning.
pub fn merge<R: Read + Seek>(
    container: &mut Container<R>,
    entries: &[String],
) -> PackResult<MergeOutcome> {
    let mut outcome = MergeOutcome::default();

    tracing::info!("Merging {} packages from {}", entries.len(), container.label());

    for name in entries {
        let bytes = container.read(name)?;
        tracing::info!("  - {} ({} bytes)", name, bytes.len());

        match Container::from_bytes(name.as_str(), bytes) {
            Ok(mut package) => merge_package(&mut outcome, &mut package),
            Err(e) => outcome.warnings.push(Warning::new(
                WarningKind::PartialCopy,
                name.as_str(),
                format!("not a valid package, skipped: {e}"),
            )),
        }
    }

    tracing::info!(
        "Merged tree: {} files, {} bytes",
        outcome.tree.len(),
        outcome.tree.total_size()
    );

    Ok(outcome)
}

/// Merge already-extracted packages, given as (name, zip bytes), base first
pub fn merge_sources<I, S>(sources: I) -> MergeOutcome
where
    I: IntoIterator<Item = (S, Vec<u8>)>,
    S: Into<String>,
{
    let mut outcome = MergeOutcome::default();
    for (name, bytes) in sources {
        let name = name.into();
        match Container::from_bytes(name.as_str(), bytes) {
            Ok(mut package) => merge_package(&mut outcome, &mut package),
            Err(e) => outcome.warnings.push(Warning::new(
                WarningKind::PartialCopy,
                name,
                format!("not a valid package, skipped: {e}"),
            )),
        }
    }
    outcome
}

/// Fold every entry of one package into the outcome's tree
fn merge_package<R: Read + Seek>(outcome: &mut MergeOutcome, package: &mut Container<R>) {
    let source = package.label().to_string();

    for entry in package.entries().to_vec() {
        let path = normalize(&entry.path);
        if path.starts_with(SIGNING_DIR) || entry.is_directory || path.ends_with('/') {
            continue;
        }
        if !entry.enclosed {
            outcome.warnings.push(Warning::new(
                WarningKind::PartialCopy,
                format!("{source}:{}", entry.path),
                "path escapes the package root, skipped",
            ));
            continue;
        }

        let renumber = outcome.tree.contains(&path);
        if renumber && !path.ends_with(DEX_EXT) {
            tracing::debug!("Keeping earlier copy of {}", path);
            continue;
        }

        match package.read_entry(&entry) {
            Ok(content) => {
                let target = if renumber {
                    let renamed = next_dex_name(&outcome.tree);
                    tracing::debug!("{}:{} -> {}", source, entry.path, renamed);
                    outcome
                        .renamed_dex
                        .push((format!("{source}:{}", entry.path), renamed.clone()));
                    renamed
                } else {
                    path
                };
                outcome.tree.insert(target, content, source.as_str());
            }
            Err(e) => outcome.warnings.push(Warning::new(
                WarningKind::PartialCopy,
                format!("{source}:{}", entry.path),
                e.to_string(),
            )),
        }
    }
}

/// Lowest `classesN.dex` with N ≥ 2 not present in the tree
fn next_dex_name(tree: &WorkingTree) -> String {
    let mut n = 2u64;
    loop {
        let name = format!("classes{n}{DEX_EXT}");
        if !tree.contains(&name) {
            return name;
        }
        n += 1;
    }
}
