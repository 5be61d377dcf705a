//! apkpack - Android package conversion
//!
//! This crate turns multi-artifact Android distributions into installable
//! packages, and restructures single packages into the layouts the Android
//! bundling tools expect.
//!
//! # Conversions
//!
//! - **Split package → APK**: `.apks`, `.xapk` and `.apkm` containers are
//!   inspected, a base package is chosen, and the base plus its splits are
//!   merged and repacked into one APK (then aligned and signed when the
//!   tools and a credential are available).
//! - **APK → AAB**: the APK is converted to proto format, remapped into a
//!   bundle module and built with bundletool.
//! - **AAB → APKS**: bundletool builds APK sets in any of its modes.
//!
//! # Quick Start
//!
//! ```no_run
//! use apkpack::{ConverterConfig, SplitApkConverter};
//! use std::path::Path;
//!
//! let config = ConverterConfig::new(".");
//! let report = SplitApkConverter::new(config.clone())
//!     .convert(Path::new("split_apk/app.xapk"), &config.apk_out_dir())?;
//! println!("{} ({} warnings)", report.output.display(), report.warnings.len());
//! # Ok::<(), apkpack::PackError>(())
//! ```
//!
//! # Configuration (apkpack.toml)
//!
//! ```toml
//! [dirs]
//! split_apk = "split_apk"
//! apk_out = "apk2"
//! keystore = "keystore"
//! tools = "tools"
//!
//! [signing]
//! auto_sign = true
//! ```
//!
//! # Error model
//!
//! Only a corrupt container, a container with nothing installable, an
//! unsupported input, or a missing required tool fail a conversion.
//! Everything else (unreadable entries, reserved names, failed alignment,
//! missing credentials) is recovered and reported as a [`Warning`] on the
//! [`ConversionReport`].

mod aab_converter;
mod apks_converter;
mod archive;
mod batch;
mod config;
mod converter;
mod error;
pub mod inspector;
pub mod keystore;
mod merger;
mod metrics;
pub mod module;
mod planner;
pub mod progress;
mod repack;
mod report;
mod split_converter;
pub mod toolchain;
mod tree;

pub use aab_converter::ApkToAabConverter;
pub use apks_converter::AabToApksConverter;
pub use archive::{Container, ContainerEntry};
pub use batch::{
    batch_aab_to_apks, batch_apk_to_aab, batch_split_to_apk, collect_inputs, BatchItem,
    BatchSummary, ModeSelection,
};
pub use config::{ConverterConfig, DirsConfig, SigningConfig, TimeoutConfig, Tool, ToolPaths};
pub use error::{PackError, PackResult};
pub use inspector::{
    classify, inspect, inspect_path, AnalysisResult, EntryTag, PackageFormat, PackageInfo,
};
pub use keystore::{CredentialGenerator, CredentialRecord, CredentialStore, DnameInfo};
pub use merger::{merge, merge_sources, MergeOutcome};
pub use metrics::ConversionMetrics;
pub use module::{assemble, assemble_dir, Assembly, ModuleLayout, Zone};
pub use planner::{plan, MergePlan};
pub use progress::{
    BarSink, CollectingSink, ProgressRecord, ProgressSink, Stage, TracingSink,
};
pub use repack::{repack, repack_to};
pub use report::{ConversionKind, ConversionReport, Warning, WarningKind};
pub use split_converter::{convert_split, SplitApkConverter};
pub use toolchain::{ApksOptions, BuildMode, Toolchain};
pub use tree::{TreeFile, WorkingTree};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
