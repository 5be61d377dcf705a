//! Bundle module assembly
//!
//! bundletool expects each module in a fixed layout:
//!
//! ```text
//! base/
//! ├── manifest/AndroidManifest.xml
//! ├── dex/classes.dex, classes2.dex, ...
//! ├── res/
//! ├── lib/
//! ├── assets/
//! ├── root/
//! └── resources.pb
//! ```
//!
//! [`assemble`] remaps the extracted contents of a proto-format APK (as
//! produced by `aapt2 convert --output-format proto`) into that layout.

use crate::report::{Warning, WarningKind};
use crate::repack::repack;
use crate::tree::WorkingTree;
use crate::PackResult;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Proto resource table, kept at the module root
pub const RESOURCES_PB: &str = "resources.pb";

/// Manifest file name inside packages and the manifest zone
pub const ANDROID_MANIFEST: &str = "AndroidManifest.xml";

/// Names bundletool reserves at the module level; stray entries with these
/// names (case-insensitive) are escaped before landing in `root/`
pub const RESERVED_NAMES: [&str; 8] = [
    "resources.arsc",
    "resources.pb",
    "manifest",
    "dex",
    "res",
    "lib",
    "assets",
    "root",
];

/// A directory zone of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Zone {
    Manifest,
    Dex,
    Res,
    Lib,
    Assets,
    Root,
}

impl Zone {
    /// Every zone, in layout order
    pub const ALL: [Zone; 6] = [
        Zone::Manifest,
        Zone::Dex,
        Zone::Res,
        Zone::Lib,
        Zone::Assets,
        Zone::Root,
    ];

    /// Directory name of the zone
    pub fn dir_name(&self) -> &'static str {
        match self {
            Zone::Manifest => "manifest",
            Zone::Dex => "dex",
            Zone::Res => "res",
            Zone::Lib => "lib",
            Zone::Assets => "assets",
            Zone::Root => "root",
        }
    }

    /// Zone for a directory name, exact match
    pub fn from_dir_name(name: &str) -> Option<Zone> {
        Zone::ALL.into_iter().find(|z| z.dir_name() == name)
    }

    /// Zones copied wholesale from a same-named package directory
    fn is_subtree_zone(&self) -> bool {
        matches!(self, Zone::Res | Zone::Lib | Zone::Assets)
    }
}

/// Files of one module, grouped by zone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleLayout {
    zones: BTreeMap<Zone, BTreeMap<String, Vec<u8>>>,
    resources_pb: Option<Vec<u8>>,
}

impl ModuleLayout {
    /// Create an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to a zone. Returns `false` and keeps the existing file if
    /// the path is already taken.
    pub fn put(&mut self, zone: Zone, path: impl Into<String>, content: Vec<u8>) -> bool {
        let files = self.zones.entry(zone).or_default();
        let path = path.into();
        if files.contains_key(&path) {
            return false;
        }
        files.insert(path, content);
        true
    }

    /// Replace a zone's contents wholesale
    pub fn replace_zone(&mut self, zone: Zone, files: BTreeMap<String, Vec<u8>>) {
        self.zones.insert(zone, files);
    }

    /// Files of a zone in sorted order
    pub fn zone_files(&self, zone: Zone) -> impl Iterator<Item = (&str, &[u8])> {
        self.zones
            .get(&zone)
            .into_iter()
            .flat_map(|files| files.iter().map(|(p, c)| (p.as_str(), c.as_slice())))
    }

    /// Get a file inside a zone
    pub fn get(&self, zone: Zone, path: &str) -> Option<&[u8]> {
        self.zones.get(&zone)?.get(path).map(Vec::as_slice)
    }

    /// Check if a zone holds any file
    pub fn has_zone(&self, zone: Zone) -> bool {
        self.zones.get(&zone).is_some_and(|f| !f.is_empty())
    }

    /// The module-level resource table
    pub fn resources_pb(&self) -> Option<&[u8]> {
        self.resources_pb.as_deref()
    }

    /// Set the module-level resource table
    pub fn set_resources_pb(&mut self, content: Vec<u8>) {
        self.resources_pb = Some(content);
    }

    /// Total number of files, `resources.pb` included
    pub fn file_count(&self) -> usize {
        self.zones.values().map(BTreeMap::len).sum::<usize>()
            + usize::from(self.resources_pb.is_some())
    }

    /// Flatten into module-relative paths (`dex/classes.dex`, `resources.pb`, ...)
    pub fn to_tree(&self) -> WorkingTree {
        let mut tree = WorkingTree::new();
        for (zone, files) in &self.zones {
            for (path, content) in files {
                tree.insert(
                    format!("{}/{}", zone.dir_name(), path),
                    content.clone(),
                    zone.dir_name(),
                );
            }
        }
        if let Some(ref pb) = self.resources_pb {
            tree.insert(RESOURCES_PB, pb.clone(), "module");
        }
        tree
    }

    /// Rebuild a layout from module-relative paths.
    ///
    /// Returns the paths that belong to no zone alongside the layout.
    pub fn from_tree(tree: &WorkingTree) -> (Self, Vec<String>) {
        let mut layout = Self::new();
        let mut unplaced = Vec::new();

        for (path, file) in tree.iter() {
            if path == RESOURCES_PB {
                layout.set_resources_pb(file.content.clone());
                continue;
            }
            match path.split_once('/') {
                Some((head, rest)) if !rest.is_empty() => match Zone::from_dir_name(head) {
                    Some(zone) => {
                        layout.put(zone, rest, file.content.clone());
                    }
                    None => unplaced.push(path.to_string()),
                },
                _ => unplaced.push(path.to_string()),
            }
        }

        (layout, unplaced)
    }

    /// Pack the module into the zip handed to `bundletool build-bundle`
    pub fn pack(&self) -> PackResult<Vec<u8>> {
        repack(&self.to_tree())
    }

    /// Write the module below `dir`.
    ///
    /// Existing zone directories are removed first so every zone is replaced
    /// wholesale. Per-file failures are skipped and reported as warnings.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Vec<Warning> {
        let dir = dir.as_ref();
        let mut warnings = Vec::new();

        for zone in Zone::ALL {
            let zone_dir = dir.join(zone.dir_name());
            if zone_dir.exists() {
                if let Err(e) = fs::remove_dir_all(&zone_dir) {
                    warnings.push(Warning::new(
                        WarningKind::PartialCopy,
                        zone_dir.display().to_string(),
                        format!("could not clear zone: {e}"),
                    ));
                }
            }
        }

        warnings.extend(self.to_tree().write_to_dir(dir));
        warnings
    }
}

/// An assembled module plus the problems recovered along the way
#[derive(Debug, Default)]
pub struct Assembly {
    pub layout: ModuleLayout,
    pub warnings: Vec<Warning>,
}

/// Remap an extracted package tree into the module layout.
///
/// Rules, in order:
/// 1. `AndroidManifest.xml` → `manifest/`
/// 2. top-level `*.dex` → `dex/`
/// 3. `res/`, `lib/`, `assets/` → same-named zone, wholesale
/// 4. `resources.pb` → module root
/// 5. everything else except `META-INF` → `root/`, reserved names escaped as `_name_`
pub fn assemble(tree: &WorkingTree) -> Assembly {
    let mut assembly = Assembly::default();
    let mut subtrees: BTreeMap<Zone, BTreeMap<String, Vec<u8>>> = BTreeMap::new();
    let mut escaped_items = BTreeSet::new();

    for (path, file) in tree.iter() {
        let (head, rest) = match path.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        match rest {
            None if head == ANDROID_MANIFEST => {
                assembly
                    .layout
                    .put(Zone::Manifest, ANDROID_MANIFEST, file.content.clone());
                continue;
            }
            None if head.ends_with(".dex") => {
                assembly.layout.put(Zone::Dex, head, file.content.clone());
                continue;
            }
            None if head == RESOURCES_PB => {
                assembly.layout.set_resources_pb(file.content.clone());
                continue;
            }
            Some(rest) => {
                if let Some(zone) = Zone::from_dir_name(head).filter(Zone::is_subtree_zone) {
                    subtrees
                        .entry(zone)
                        .or_default()
                        .insert(rest.to_string(), file.content.clone());
                    continue;
                }
            }
            None => {}
        }

        if head == "META-INF" {
            continue;
        }

        let root_name = if RESERVED_NAMES.contains(&head.to_lowercase().as_str()) {
            let escaped = format!("_{head}_");
            if escaped_items.insert(head.to_string()) {
                assembly.warnings.push(Warning::new(
                    WarningKind::ReservedName,
                    head,
                    format!("reserved module name, placed as root/{escaped}"),
                ));
            }
            escaped
        } else {
            head.to_string()
        };

        let target = match rest {
            Some(rest) => format!("{root_name}/{rest}"),
            None => root_name,
        };

        if !assembly.layout.put(Zone::Root, target.as_str(), file.content.clone()) {
            assembly.warnings.push(Warning::new(
                WarningKind::NameCollision,
                path,
                format!("root/{target} already taken, skipped"),
            ));
        }
    }

    for (zone, files) in subtrees {
        assembly.layout.replace_zone(zone, files);
    }

    tracing::info!(
        files = assembly.layout.file_count(),
        warnings = assembly.warnings.len(),
        "Assembled bundle module"
    );

    assembly
}

/// Load an extracted package directory and assemble it
pub fn assemble_dir(extracted: impl AsRef<Path>) -> PackResult<Assembly> {
    let (tree, mut warnings) = WorkingTree::from_dir(extracted)?;
    let mut assembly = assemble(&tree);
    warnings.append(&mut assembly.warnings);
    assembly.warnings = warnings;
    Ok(assembly)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(files: &[(&str, &[u8])]) -> WorkingTree {
        let mut tree = WorkingTree::new();
        for (path, content) in files {
            tree.insert(*path, content.to_vec(), "proto.apk");
        }
        tree
    }

    #[test]
    fn test_basic_remap() {
        let assembly = assemble(&tree(&[
            ("AndroidManifest.xml", b"manifest"),
            ("classes.dex", b"dex1"),
            ("classes2.dex", b"dex2"),
            ("res/layout/main.xml", b"layout"),
            ("lib/arm64-v8a/libnative.so", b"so"),
            ("assets/data.json", b"{}"),
            ("resources.pb", b"pb"),
            ("kotlin/kotlin.kotlin_builtins", b"kt"),
            ("META-INF/MANIFEST.MF", b"mf"),
        ]));
        let layout = &assembly.layout;

        assert!(assembly.warnings.is_empty());
        assert_eq!(layout.get(Zone::Manifest, "AndroidManifest.xml"), Some(&b"manifest"[..]));
        assert_eq!(layout.get(Zone::Dex, "classes2.dex"), Some(&b"dex2"[..]));
        assert_eq!(layout.get(Zone::Res, "layout/main.xml"), Some(&b"layout"[..]));
        assert_eq!(layout.get(Zone::Lib, "arm64-v8a/libnative.so"), Some(&b"so"[..]));
        assert_eq!(layout.get(Zone::Assets, "data.json"), Some(&b"{}"[..]));
        assert_eq!(layout.resources_pb(), Some(&b"pb"[..]));
        assert_eq!(
            layout.get(Zone::Root, "kotlin/kotlin.kotlin_builtins"),
            Some(&b"kt"[..])
        );
        assert_eq!(layout.file_count(), 8);
    }

    #[test]
    fn test_missing_manifest_is_tolerated() {
        let assembly = assemble(&tree(&[("classes.dex", b"d")]));
        assert!(!assembly.layout.has_zone(Zone::Manifest));
        assert!(assembly.layout.has_zone(Zone::Dex));
    }

    #[test]
    fn test_reserved_names_are_escaped() {
        let assembly = assemble(&tree(&[
            ("res/values/strings.xml", b"real"),
            ("res", b"stray"),
            ("resources.arsc", b"arsc"),
            ("Root/x.txt", b"x"),
            ("Root/y.txt", b"y"),
        ]));
        let layout = &assembly.layout;

        assert_eq!(layout.get(Zone::Res, "values/strings.xml"), Some(&b"real"[..]));
        assert_eq!(layout.get(Zone::Root, "_res_"), Some(&b"stray"[..]));
        assert_eq!(layout.get(Zone::Root, "_resources.arsc_"), Some(&b"arsc"[..]));
        assert_eq!(layout.get(Zone::Root, "_Root_/y.txt"), Some(&b"y"[..]));

        // one warning per escaped top-level item
        let reserved: Vec<_> = assembly
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::ReservedName)
            .map(|w| w.subject.as_str())
            .collect();
        assert_eq!(reserved, vec!["Root", "res", "resources.arsc"]);
    }

    #[test]
    fn test_escape_collision_keeps_first() {
        let assembly = assemble(&tree(&[("_dex_", b"literal"), ("dex", b"stray")]));
        assert_eq!(assembly.layout.get(Zone::Root, "_dex_"), Some(&b"literal"[..]));
        assert!(assembly
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::NameCollision));
    }

    #[test]
    fn test_nested_dex_is_not_code() {
        let assembly = assemble(&tree(&[("extra/payload.dex", b"p")]));
        assert!(!assembly.layout.has_zone(Zone::Dex));
        assert_eq!(
            assembly.layout.get(Zone::Root, "extra/payload.dex"),
            Some(&b"p"[..])
        );
    }

    #[test]
    fn test_tree_round_trip() {
        let assembly = assemble(&tree(&[
            ("AndroidManifest.xml", b"m"),
            ("classes.dex", b"d"),
            ("resources.pb", b"pb"),
        ]));
        let flat = assembly.layout.to_tree();
        assert!(flat.contains("manifest/AndroidManifest.xml"));
        assert!(flat.contains("dex/classes.dex"));

        let (rebuilt, unplaced) = ModuleLayout::from_tree(&flat);
        assert!(unplaced.is_empty());
        assert_eq!(rebuilt, assembly.layout);
    }
}
