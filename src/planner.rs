//! Extraction strategy selection

use crate::inspector::AnalysisResult;
use crate::{PackError, PackResult};
use serde::{Deserialize, Serialize};

/// How to turn a container into a single installable package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MergePlan {
    /// Copy one package out of the container as-is
    DirectExtract { entry: String },
    /// Merge the listed packages, base first
    MultiwayMerge { entries: Vec<String> },
}

impl MergePlan {
    /// Get the plan name
    pub fn name(&self) -> &'static str {
        match self {
            MergePlan::DirectExtract { .. } => "direct_extract",
            MergePlan::MultiwayMerge { .. } => "multiway_merge",
        }
    }

    /// Entries the plan reads, in order
    pub fn entries(&self) -> Vec<&str> {
        match self {
            MergePlan::DirectExtract { entry } => vec![entry.as_str()],
            MergePlan::MultiwayMerge { entries } => entries.iter().map(String::as_str).collect(),
        }
    }
}

/// Pick a plan for an analysis.
///
/// `label` only names the container in the error when nothing is installable.
pub fn plan(analysis: &AnalysisResult, label: &str) -> PackResult<MergePlan> {
    let no_package = || PackError::NoInstallablePackage(label.to_string());

    if analysis.has_universal {
        let entry = analysis.base_entry.clone().ok_or_else(no_package)?;
        return Ok(MergePlan::DirectExtract { entry });
    }

    if let [only] = analysis.all_apk_entries.as_slice() {
        return Ok(MergePlan::DirectExtract {
            entry: only.clone(),
        });
    }

    match &analysis.base_entry {
        Some(base) if analysis.split_entries.is_empty() => Ok(MergePlan::DirectExtract {
            entry: base.clone(),
        }),
        Some(base) => {
            let mut entries = Vec::with_capacity(analysis.split_entries.len() + 1);
            entries.push(base.clone());
            entries.extend(analysis.split_entries.iter().cloned());
            Ok(MergePlan::MultiwayMerge { entries })
        }
        None => Err(no_package()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(names: &[&str]) -> AnalysisResult {
        AnalysisResult::from_names(None, names.iter().copied())
    }

    #[test]
    fn test_single_apk_is_direct() {
        let plan = plan(&analysis(&["split_config.en.apk"]), "x").unwrap();
        assert_eq!(
            plan,
            MergePlan::DirectExtract {
                entry: "split_config.en.apk".into()
            }
        );
    }

    #[test]
    fn test_universal_wins_over_splits() {
        let plan = plan(
            &analysis(&["base.apk", "universal.apk", "split_config.en.apk"]),
            "x",
        )
        .unwrap();
        assert_eq!(
            plan,
            MergePlan::DirectExtract {
                entry: "universal.apk".into()
            }
        );
    }

    #[test]
    fn test_base_without_splits() {
        let plan = plan(&analysis(&["base.apk", "readme.apk"]), "x").unwrap();
        assert_eq!(plan.name(), "direct_extract");
        assert_eq!(plan.entries(), vec!["base.apk"]);
    }

    #[test]
    fn test_merge_order() {
        let plan = plan(
            &analysis(&["split_config.arm64.apk", "base.apk", "split_config.en.apk"]),
            "x",
        )
        .unwrap();
        assert_eq!(
            plan.entries(),
            vec!["base.apk", "split_config.arm64.apk", "split_config.en.apk"]
        );
    }

    #[test]
    fn test_nothing_installable() {
        let err = plan(&analysis(&["manifest.json", "icon.png"]), "empty.xapk").unwrap_err();
        assert!(matches!(err, PackError::NoInstallablePackage(ref l) if l == "empty.xapk"));
    }
}
