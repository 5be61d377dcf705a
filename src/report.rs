//! Warnings and per-conversion reports

use crate::inspector::PackageInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Category of a recovered, non-fatal problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A single entry could not be read or written and was skipped
    PartialCopy,
    /// A stray entry used a reserved module name and was escaped
    ReservedName,
    /// Two entries mapped to the same module path after escaping
    NameCollision,
    /// OBB expansion files are present but never merged
    ObbIgnored,
    /// zipalign failed, artifact left unaligned
    Alignment,
    /// No credential or signer failure, artifact left unsigned
    Signing,
    /// Package metadata could not be read
    Metadata,
}

/// A recovered problem recorded during a conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// Entry, file or tool the warning is about
    pub subject: String,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        let warning = Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        tracing::warn!(kind = ?warning.kind, subject = %warning.subject, "{}", warning.message);
        warning
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// How the output artifact was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionKind {
    /// A single package was copied out of the container
    DirectExtract,
    /// Base and split packages were merged and repacked
    MultiwayMerge,
    /// An APK was restructured into an App Bundle
    Bundle,
    /// An App Bundle was expanded into an APK set
    ApkSet,
}

/// Result of one successful conversion
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    /// Input artifact
    pub input: PathBuf,
    /// Produced artifact
    pub output: PathBuf,
    pub kind: ConversionKind,
    /// Output size in bytes
    pub size: u64,
    /// Hex SHA-256 of the output
    pub sha256: String,
    /// Aligned during this conversion
    pub aligned: bool,
    /// Signed during this conversion
    pub signed: bool,
    /// Package metadata, when it could be determined
    pub package: Option<PackageInfo>,
    pub warnings: Vec<Warning>,
    /// Per-phase timings
    #[serde(skip)]
    pub phases: Vec<(String, Duration)>,
}

impl ConversionReport {
    /// Output size in megabytes
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }

    /// Whether any warning of `kind` was recorded
    pub fn has_warning(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}
