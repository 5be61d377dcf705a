//! Tests for apkpack keystore module

use apkpack::{CredentialGenerator, CredentialRecord, CredentialStore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use tempfile::TempDir;

fn record_in(store: &CredentialStore, name: &str, seed: u64) -> CredentialRecord {
    CredentialGenerator::new(StdRng::seed_from_u64(seed)).draft(store.keystore_path(name), 10_000)
}

#[test]
fn test_save_and_load_round_trip() {
    let temp = TempDir::new().unwrap();
    let store = CredentialStore::new(temp.path());
    let record = record_in(&store, "app", 1);

    let path = store.save("app", &record).unwrap();
    assert_eq!(path, temp.path().join("app.json"));

    let loaded = CredentialStore::load(&path).unwrap();
    assert_eq!(loaded, record);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    for key in [
        "keystore_file",
        "store_password",
        "key_alias",
        "key_password",
        "dname",
        "dname_info",
        "validity_days",
        "created_at",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert!(json["dname_info"].get("cn").is_some());
}

#[test]
fn test_find_by_name_requires_keystore() {
    let temp = TempDir::new().unwrap();
    let store = CredentialStore::new(temp.path());
    let record = record_in(&store, "app", 2);
    store.save("app", &record).unwrap();

    assert!(store.find_by_name("app").is_none());

    fs::write(store.keystore_path("app"), b"jks").unwrap();
    let found = store.find_by_name("app").unwrap();
    assert_eq!(found.key_alias, record.key_alias);
}

#[test]
fn test_fallback_scan_is_lexicographic() {
    let temp = TempDir::new().unwrap();
    let store = CredentialStore::new(temp.path());

    for (name, seed) in [("zeta", 3), ("alpha", 4), ("mid", 5)] {
        let record = record_in(&store, name, seed);
        store.save(name, &record).unwrap();
        fs::write(store.keystore_path(name), b"jks").unwrap();
    }
    // unreadable records are skipped
    fs::write(temp.path().join("aaa.json"), b"{broken").unwrap();

    let first = store.first_available().unwrap();
    assert_eq!(first.keystore_file, store.keystore_path("alpha"));

    let fallback = store.find_for("unknown").unwrap();
    assert_eq!(fallback.keystore_file, store.keystore_path("alpha"));

    let named = store.find_for("zeta").unwrap();
    assert_eq!(named.keystore_file, store.keystore_path("zeta"));
}

#[test]
fn test_no_usable_credential() {
    let temp = TempDir::new().unwrap();
    let store = CredentialStore::new(temp.path().join("missing"));
    assert!(store.first_available().is_none());
    assert!(store.find_for("app").is_none());
}

#[test]
fn test_relative_keystore_resolved_in_store() {
    let temp = TempDir::new().unwrap();
    let store = CredentialStore::new(temp.path());
    let mut record = record_in(&store, "app", 6);
    record.keystore_file = "keystore/app.jks".into();
    store.save("app", &record).unwrap();
    fs::write(temp.path().join("app.jks"), b"jks").unwrap();

    let found = store.find_by_name("app").unwrap();
    assert_eq!(found.keystore_file, temp.path().join("app.jks"));
}

#[test]
fn test_record_defaults_for_older_files() {
    let json = r#"{
        "keystore_file": "k.jks",
        "store_password": "p",
        "key_alias": "key_12345",
        "key_password": "p",
        "dname": "CN=A"
    }"#;
    let record: CredentialRecord = serde_json::from_str(json).unwrap();
    assert_eq!(record.validity_days, 10_000);
    assert!(record.created_at.is_empty());
}
