//! Archive inspection for split-package containers
//!
//! Entries are classified purely by file name. The precedence order of the
//! rules in [`classify`] matters: it mirrors the naming conventions used by
//! bundletool (`.apks`), APKPure (`.xapk`) and APKMirror (`.apkm`), and
//! reordering them silently misclassifies real packages.

use crate::archive::Container;
use crate::PackResult;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};
use std::path::Path;

/// Split-package distribution formats accepted as input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageFormat {
    /// bundletool APK set
    Apks,
    /// APKPure container
    Xapk,
    /// APKMirror container
    Apkm,
}

impl PackageFormat {
    /// Supported file extensions, without the dot
    pub const EXTENSIONS: [&'static str; 3] = ["apks", "xapk", "apkm"];

    /// Detect the format from an extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "apks" => Some(Self::Apks),
            "xapk" => Some(Self::Xapk),
            "apkm" => Some(Self::Apkm),
            _ => None,
        }
    }

    /// Detect the format from a file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the format name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Apks => "apks",
            Self::Xapk => "xapk",
            Self::Apkm => "apkm",
        }
    }
}

/// Role of a container entry, derived from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryTag {
    Base,
    Universal,
    SplitConfig,
    /// `split_*` package that is not a configuration split
    Split,
    Manifest,
    Obb,
    Other,
}

/// Classify an entry name.
///
/// For `.apk` entries the first matching rule wins: universal/standalone,
/// base+master, `base.apk`, configuration split, other split, anything else.
pub fn classify(name: &str) -> EntryTag {
    let lower = name.to_lowercase();

    if lower.ends_with(".apk") {
        if lower.contains("universal") || lower.contains("standalone") {
            EntryTag::Universal
        } else if lower.contains("base") && lower.contains("master") {
            EntryTag::Base
        } else if lower.ends_with("base.apk") {
            EntryTag::Base
        } else if lower.contains("config.") || lower.contains("split_config") {
            EntryTag::SplitConfig
        } else if lower.contains("split_") {
            EntryTag::Split
        } else {
            EntryTag::Other
        }
    } else if lower == "manifest.json" || lower == "info.json" {
        EntryTag::Manifest
    } else if lower.ends_with(".obb") {
        EntryTag::Obb
    } else {
        EntryTag::Other
    }
}

/// What an inspection found in a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Format derived from the container's file name, if known
    pub format: Option<PackageFormat>,
    /// Whether a universal/standalone package was found
    pub has_universal: bool,
    /// Entry selected as the installable base
    pub base_entry: Option<String>,
    /// Split packages to merge on top of the base, in container order
    pub split_entries: Vec<String>,
    /// Every `.apk` entry, in container order
    pub all_apk_entries: Vec<String>,
    /// `manifest.json` / `info.json` entry
    pub manifest_entry: Option<String>,
    /// OBB expansion files (never merged)
    pub obb_entries: Vec<String>,
}

impl AnalysisResult {
    /// Build an analysis from entry names in container order
    pub fn from_names<'a>(
        format: Option<PackageFormat>,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut result = Self {
            format,
            ..Self::default()
        };

        for name in names {
            match classify(name) {
                EntryTag::Universal => {
                    result.all_apk_entries.push(name.to_string());
                    result.has_universal = true;
                    result.base_entry = Some(name.to_string());
                }
                EntryTag::Base => {
                    result.all_apk_entries.push(name.to_string());
                    if result.base_entry.is_none() {
                        result.base_entry = Some(name.to_string());
                    }
                }
                EntryTag::SplitConfig | EntryTag::Split => {
                    result.all_apk_entries.push(name.to_string());
                    result.split_entries.push(name.to_string());
                }
                EntryTag::Manifest => result.manifest_entry = Some(name.to_string()),
                EntryTag::Obb => result.obb_entries.push(name.to_string()),
                EntryTag::Other => {
                    if name.to_lowercase().ends_with(".apk") {
                        result.all_apk_entries.push(name.to_string());
                    }
                }
            }
        }

        if result.base_entry.is_none() && !result.all_apk_entries.is_empty() {
            let fallback = result
                .all_apk_entries
                .iter()
                .find(|name| {
                    let lower = name.to_lowercase();
                    !lower.contains("config") && !lower.contains("split_")
                })
                .unwrap_or(&result.all_apk_entries[0])
                .clone();
            result.split_entries.retain(|s| *s != fallback);
            result.base_entry = Some(fallback);
        }

        result
    }

    /// Number of `.apk` entries found
    pub fn apk_count(&self) -> usize {
        self.all_apk_entries.len()
    }
}

/// Inspect an opened container
pub fn inspect<R: Read + Seek>(container: &Container<R>) -> AnalysisResult {
    let format = PackageFormat::from_path(Path::new(container.label()));
    let names = container
        .entries()
        .iter()
        .filter(|e| !e.is_directory)
        .map(|e| e.path.as_str());
    let result = AnalysisResult::from_names(format, names);

    tracing::info!(
        apks = result.apk_count(),
        splits = result.split_entries.len(),
        universal = result.has_universal,
        "Inspected {}",
        container.label()
    );

    result
}

/// Open a container from disk and inspect it
pub fn inspect_path(path: impl AsRef<Path>) -> PackResult<AnalysisResult> {
    let container = Container::open(path)?;
    Ok(inspect(&container))
}

/// Package identity read from store metadata or `aapt2 dump badging`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub package_name: String,
    pub version_code: String,
    pub version_name: String,
    /// Display name, when the metadata carries one
    #[serde(default)]
    pub name: String,
}

impl PackageInfo {
    /// Parse a store `manifest.json` / `info.json`.
    ///
    /// Both snake_case and camelCase keys are accepted, and the version code
    /// may be a string or a number.
    pub fn from_store_manifest(bytes: &[u8]) -> PackResult<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;

        let field = |keys: &[&str]| -> String {
            keys.iter()
                .filter_map(|k| value.get(*k))
                .find_map(|v| match v {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .unwrap_or_default()
        };

        Ok(Self {
            package_name: field(&["package_name", "packageName"]),
            version_code: field(&["version_code", "versionCode"]),
            version_name: field(&["version_name", "versionName"]),
            name: field(&["name", "app_name"]),
        })
    }

    /// Parse the output of `aapt2 dump badging`
    pub fn from_badging(output: &str) -> Self {
        Self {
            package_name: quoted_after(output, "package: name='").unwrap_or_default(),
            version_code: quoted_after(output, "versionCode='").unwrap_or_default(),
            version_name: quoted_after(output, "versionName='").unwrap_or_default(),
            name: quoted_after(output, "application-label:'").unwrap_or_default(),
        }
    }

    /// Check if no package name is known
    pub fn is_empty(&self) -> bool {
        self.package_name.is_empty()
    }
}

/// Value between `prefix` and the next single quote
fn quoted_after(haystack: &str, prefix: &str) -> Option<String> {
    let start = haystack.find(prefix)? + prefix.len();
    let end = haystack[start..].find('\'')?;
    Some(haystack[start..start + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_precedence() {
        assert_eq!(classify("app-universal.apk"), EntryTag::Universal);
        assert_eq!(classify("standalone_base.apk"), EntryTag::Universal);
        assert_eq!(classify("base-master.apk"), EntryTag::Base);
        assert_eq!(classify("splits/base.apk"), EntryTag::Base);
        assert_eq!(classify("split_config.arm64_v8a.apk"), EntryTag::SplitConfig);
        assert_eq!(classify("config.xxhdpi.apk"), EntryTag::SplitConfig);
        assert_eq!(classify("split_feature.apk"), EntryTag::Split);
        assert_eq!(classify("com.example.APK"), EntryTag::Other);
        assert_eq!(classify("Manifest.JSON"), EntryTag::Manifest);
        assert_eq!(classify("Android/obb/main.1.com.x.obb"), EntryTag::Obb);
        assert_eq!(classify("icon.png"), EntryTag::Other);
    }

    #[test]
    fn test_manifest_must_be_top_level() {
        assert_eq!(classify("nested/manifest.json"), EntryTag::Other);
    }

    #[test]
    fn test_later_universal_replaces_base() {
        let result = AnalysisResult::from_names(None, ["base.apk", "universal.apk"]);
        assert!(result.has_universal);
        assert_eq!(result.base_entry.as_deref(), Some("universal.apk"));
    }

    #[test]
    fn test_second_base_is_not_a_split() {
        let result = AnalysisResult::from_names(None, ["base-master.apk", "other/base.apk"]);
        assert_eq!(result.base_entry.as_deref(), Some("base-master.apk"));
        assert!(result.split_entries.is_empty());
        assert_eq!(result.apk_count(), 2);
    }

    #[test]
    fn test_fallback_prefers_non_split() {
        let result =
            AnalysisResult::from_names(None, ["config.en.apk", "com.example.app.apk"]);
        assert_eq!(result.base_entry.as_deref(), Some("com.example.app.apk"));
        assert_eq!(result.split_entries, vec!["config.en.apk"]);
    }

    #[test]
    fn test_fallback_to_first_keeps_invariant() {
        let result = AnalysisResult::from_names(None, ["config.en.apk", "split_config.x86.apk"]);
        assert_eq!(result.base_entry.as_deref(), Some("config.en.apk"));
        assert_eq!(result.split_entries, vec!["split_config.x86.apk"]);
    }

    #[test]
    fn test_badging_parse() {
        let out = "package: name='com.example.app' versionCode='42' versionName='1.2.3' platformBuildVersionName='14'\napplication-label:'Example'\n";
        let info = PackageInfo::from_badging(out);
        assert_eq!(info.package_name, "com.example.app");
        assert_eq!(info.version_code, "42");
        assert_eq!(info.version_name, "1.2.3");
        assert_eq!(info.name, "Example");
    }

    #[test]
    fn test_store_manifest_camel_case_and_numbers() {
        let json = br#"{"packageName":"com.x","versionCode":7,"versionName":"0.7","app_name":"X"}"#;
        let info = PackageInfo::from_store_manifest(json).unwrap();
        assert_eq!(info.package_name, "com.x");
        assert_eq!(info.version_code, "7");
        assert_eq!(info.name, "X");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            PackageFormat::from_path(Path::new("app.XAPK")),
            Some(PackageFormat::Xapk)
        );
        assert_eq!(PackageFormat::from_path(Path::new("app.zip")), None);
    }
}
