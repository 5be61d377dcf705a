//! Tests for apkpack module assembly

use apkpack::module::{RESERVED_NAMES, RESOURCES_PB};
use apkpack::{assemble, assemble_dir, Container, ModuleLayout, WarningKind, WorkingTree, Zone};
use std::fs;
use tempfile::TempDir;

fn tree(files: &[(&str, &[u8])]) -> WorkingTree {
    let mut tree = WorkingTree::new();
    for (path, content) in files {
        tree.insert(*path, content.to_vec(), "proto.apk");
    }
    tree
}

fn zone_snapshot(layout: &ModuleLayout) -> Vec<(Zone, String, Vec<u8>)> {
    Zone::ALL
        .into_iter()
        .flat_map(|zone| {
            layout
                .zone_files(zone)
                .map(move |(path, content)| (zone, path.to_string(), content.to_vec()))
                .collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn test_full_package_layout() {
    let assembly = assemble(&tree(&[
        ("AndroidManifest.xml", b"manifest"),
        ("classes.dex", b"dex1"),
        ("classes2.dex", b"dex2"),
        ("res/layout/main.xml", b"layout"),
        ("lib/arm64-v8a/libnative.so", b"so"),
        ("assets/data.bin", b"data"),
        ("resources.pb", b"pb"),
        ("kotlin/kotlin.kotlin_builtins", b"kb"),
        ("META-INF/CERT.SF", b"sig"),
    ]));

    let layout = &assembly.layout;
    assert!(assembly.warnings.is_empty());
    assert_eq!(layout.get(Zone::Manifest, "AndroidManifest.xml"), Some(&b"manifest"[..]));
    assert_eq!(layout.get(Zone::Dex, "classes2.dex"), Some(&b"dex2"[..]));
    assert_eq!(layout.get(Zone::Res, "layout/main.xml"), Some(&b"layout"[..]));
    assert_eq!(layout.get(Zone::Lib, "arm64-v8a/libnative.so"), Some(&b"so"[..]));
    assert_eq!(layout.get(Zone::Assets, "data.bin"), Some(&b"data"[..]));
    assert_eq!(layout.get(Zone::Root, "kotlin/kotlin.kotlin_builtins"), Some(&b"kb"[..]));
    assert_eq!(layout.resources_pb(), Some(&b"pb"[..]));
    assert_eq!(layout.file_count(), 8);
}

#[test]
fn test_stray_res_entry_is_escaped() {
    let assembly = assemble(&tree(&[
        ("res", b"stray"),
        ("res/values/strings.xml", b"strings"),
    ]));

    let layout = &assembly.layout;
    assert_eq!(layout.get(Zone::Res, "values/strings.xml"), Some(&b"strings"[..]));
    assert_eq!(layout.get(Zone::Root, "_res_"), Some(&b"stray"[..]));
    assert_eq!(assembly.warnings.len(), 1);
    assert_eq!(assembly.warnings[0].kind, WarningKind::ReservedName);
}

#[test]
fn test_reserved_names_case_insensitive() {
    let assembly = assemble(&tree(&[("Resources.ARSC", b"arsc"), ("Root/x.txt", b"x")]));

    assert_eq!(assembly.layout.get(Zone::Root, "_Resources.ARSC_"), Some(&b"arsc"[..]));
    assert_eq!(assembly.layout.get(Zone::Root, "_Root_/x.txt"), Some(&b"x"[..]));
    assert_eq!(assembly.warnings.len(), 2);
    assert!(RESERVED_NAMES.contains(&"resources.arsc"));
}

#[test]
fn test_escape_collision_first_wins() {
    let assembly = assemble(&tree(&[("_lib_", b"plain"), ("lib", b"stray")]));

    assert_eq!(assembly.layout.get(Zone::Root, "_lib_"), Some(&b"plain"[..]));
    assert!(assembly
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::NameCollision));
}

#[test]
fn test_missing_manifest_tolerated() {
    let assembly = assemble(&tree(&[("classes.dex", b"d")]));
    assert!(!assembly.layout.has_zone(Zone::Manifest));
    assert!(assembly.layout.has_zone(Zone::Dex));
}

#[test]
fn test_pack_round_trip_is_byte_identical() {
    let assembly = assemble(&tree(&[
        ("AndroidManifest.xml", b"manifest"),
        ("classes.dex", &[0xde, 0x0a, 0x00, 0xff]),
        ("res/drawable/icon.png", &[0x89, b'P', b'N', b'G']),
        ("lib/x86_64/libz.so", b"elf"),
        ("assets/fonts/a.ttf", b"font"),
        ("resources.pb", b"table"),
    ]));

    let bytes = assembly.layout.pack().unwrap();
    let mut container = Container::from_bytes("base.zip", bytes).unwrap();
    let (reloaded, warnings) = WorkingTree::from_container(&mut container);
    assert!(warnings.is_empty());

    let (layout, unplaced) = ModuleLayout::from_tree(&reloaded);
    assert!(unplaced.is_empty());
    assert_eq!(zone_snapshot(&layout), zone_snapshot(&assembly.layout));
    assert_eq!(layout.resources_pb(), Some(&b"table"[..]));
    assert!(container.entry(RESOURCES_PB).is_some());
    for zone in [Zone::Manifest, Zone::Dex, Zone::Res, Zone::Lib, Zone::Assets] {
        assert!(layout.has_zone(zone), "zone {} missing", zone.dir_name());
    }
}

#[test]
fn test_pack_is_deterministic() {
    let files: &[(&str, &[u8])] = &[("b.txt", b"b"), ("classes.dex", b"d"), ("a.txt", b"a")];
    let first = assemble(&tree(files)).layout.pack().unwrap();
    let second = assemble(&tree(files)).layout.pack().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_assemble_dir_and_write() {
    let temp = TempDir::new().unwrap();
    let extracted = temp.path().join("extracted");
    fs::create_dir_all(extracted.join("res/values")).unwrap();
    fs::create_dir_all(extracted.join("assets")).unwrap();
    fs::write(extracted.join("AndroidManifest.xml"), b"m").unwrap();
    fs::write(extracted.join("classes.dex"), b"d").unwrap();
    fs::write(extracted.join("res/values/strings.xml"), b"s").unwrap();
    fs::write(extracted.join("assets/a.txt"), b"a").unwrap();
    fs::write(extracted.join("resources.pb"), b"pb").unwrap();

    let assembly = assemble_dir(&extracted).unwrap();
    assert!(assembly.warnings.is_empty());

    let module = temp.path().join("base");
    fs::create_dir_all(module.join("res/stale")).unwrap();
    fs::write(module.join("res/stale/old.xml"), b"old").unwrap();

    let warnings = assembly.layout.write_to_dir(&module);
    assert!(warnings.is_empty());
    assert_eq!(fs::read(module.join("manifest/AndroidManifest.xml")).unwrap(), b"m");
    assert_eq!(fs::read(module.join("dex/classes.dex")).unwrap(), b"d");
    assert_eq!(fs::read(module.join("res/values/strings.xml")).unwrap(), b"s");
    assert_eq!(fs::read(module.join("resources.pb")).unwrap(), b"pb");
    assert!(!module.join("res/stale").exists());
}
