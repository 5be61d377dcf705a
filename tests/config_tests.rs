//! Tests for apkpack config module

use apkpack::{ConverterConfig, PackError, Tool};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_defaults() {
    let config = ConverterConfig::new("/work");
    assert_eq!(config.apk_out_dir(), std::path::Path::new("/work/apk2"));
    assert_eq!(config.keystore_dir(), std::path::Path::new("/work/keystore"));
    assert!(config.signing.auto_sign);
    assert_eq!(config.signing.validity_days, 10_000);
    assert_eq!(config.metadata_timeout(), Duration::from_secs(10));
    assert!(config
        .tool_path(Tool::Bundletool)
        .ends_with("tools/bundletool.jar"));
}

#[test]
fn test_parse_partial_config() {
    let toml = r#"
[dirs]
apk_out = "merged"

[tools]
aapt2 = "/opt/sdk/aapt2"

[signing]
auto_sign = false

[timeouts]
metadata_secs = 3
"#;
    let config = ConverterConfig::parse(toml, "/base").unwrap();
    assert_eq!(config.apk_out_dir(), std::path::Path::new("/base/merged"));
    assert_eq!(config.split_apk_dir(), std::path::Path::new("/base/split_apk"));
    assert_eq!(config.tool_path(Tool::Aapt2), std::path::Path::new("/opt/sdk/aapt2"));
    assert!(!config.signing.auto_sign);
    assert_eq!(config.signing.validity_days, 10_000);
    assert_eq!(config.metadata_timeout(), Duration::from_secs(3));
}

#[test]
fn test_parse_invalid_toml() {
    let err = ConverterConfig::parse("[dirs\napk = ", "/base").unwrap_err();
    assert!(matches!(err, PackError::TomlParse(_)));
}

#[test]
fn test_from_file_resolves_relative_to_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("apkpack.toml");
    fs::write(&path, "[dirs]\nkeystore = \"keys\"\n").unwrap();

    assert_eq!(ConverterConfig::find_in_dir(temp.path()), Some(path.clone()));
    let config = ConverterConfig::from_file(&path).unwrap();
    assert_eq!(config.keystore_dir(), temp.path().join("keys"));
}

#[test]
fn test_from_file_missing() {
    let err = ConverterConfig::from_file("/nonexistent/apkpack.toml").unwrap_err();
    assert!(matches!(err, PackError::Config(_)));
}

#[test]
fn test_validate_lists_missing_required_tools() {
    let temp = TempDir::new().unwrap();
    let config = ConverterConfig::new(temp.path());

    let missing: Vec<Tool> = config.missing_tools().into_iter().map(|(t, _)| t).collect();
    assert_eq!(
        missing,
        [Tool::Bundletool, Tool::Aapt2, Tool::Java, Tool::Keytool, Tool::Jarsigner]
    );

    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("bundletool"));
    assert!(!err.contains("zipalign"));
}

#[test]
fn test_validate_passes_with_overrides() {
    let temp = TempDir::new().unwrap();
    let mut config = ConverterConfig::new(temp.path());
    for tool in Tool::ALL {
        let path = temp.path().join("bin").join(tool.name());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"").unwrap();
        config = config.with_tool(tool, path);
    }
    assert!(config.validate().is_ok());
}

#[test]
fn test_ensure_dirs() {
    let temp = TempDir::new().unwrap();
    let config = ConverterConfig::new(temp.path());
    config.ensure_dirs().unwrap();
    for dir in ["apk", "aab", "apks", "split_apk", "apk2", "keystore"] {
        assert!(temp.path().join(dir).is_dir(), "{dir} not created");
    }
}
