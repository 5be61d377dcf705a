//! Directory batch drivers
//!
//! Each driver collects its inputs from the configured directory, converts
//! them one after another and records every outcome. A failing item never
//! stops the batch.

use crate::aab_converter::ApkToAabConverter;
use crate::apks_converter::AabToApksConverter;
use crate::config::ConverterConfig;
use crate::converter::item_name;
use crate::inspector::PackageFormat;
use crate::progress::ProgressSink;
use crate::report::ConversionReport;
use crate::split_converter::SplitApkConverter;
use crate::toolchain::ApksOptions;
use crate::{PackError, PackResult};
use console::style;
use glob::MatchOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of one batch item
#[derive(Debug)]
pub struct BatchItem {
    pub input: PathBuf,
    /// Display label (file name, plus mode for APK sets)
    pub label: String,
    pub result: PackResult<ConversionReport>,
}

impl BatchItem {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-item results of a batch run
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub items: Vec<BatchItem>,
}

impl BatchSummary {
    fn push(&mut self, input: &Path, label: String, result: PackResult<ConversionReport>) {
        if let Err(e) = &result {
            tracing::error!(item = %label, "Conversion failed: {}", e);
        }
        self.items.push(BatchItem {
            input: input.to_path_buf(),
            label,
            result,
        });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reports of the successful items
    pub fn succeeded(&self) -> Vec<&ConversionReport> {
        self.items
            .iter()
            .filter_map(|item| item.result.as_ref().ok())
            .collect()
    }

    /// Failed items with their errors
    pub fn failed(&self) -> Vec<(&BatchItem, &PackError)> {
        self.items
            .iter()
            .filter_map(|item| item.result.as_ref().err().map(|e| (item, e)))
            .collect()
    }

    /// Human-readable summary
    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.items.len() + 2);

        for item in &self.items {
            match &item.result {
                Ok(report) => {
                    let mut line = format!(
                        "{} {} -> {} ({:.2} MB)",
                        style("✓").green(),
                        item.label,
                        item_name(&report.output),
                        report.size_mb()
                    );
                    if !report.warnings.is_empty() {
                        line.push_str(&format!(
                            " {}",
                            style(format!("[{} warnings]", report.warnings.len())).yellow()
                        ));
                    }
                    lines.push(line);
                }
                Err(e) => lines.push(format!("{} {}: {}", style("✗").red(), item.label, e)),
            }
        }

        let succeeded = self.succeeded().len();
        let failed = self.items.len() - succeeded;
        lines.push(String::new());
        lines.push(format!(
            "{} succeeded, {} failed, {} total",
            style(succeeded).green().bold(),
            style(failed).red().bold(),
            self.items.len()
        ));
        lines.join("\n")
    }
}

/// Files in `dir` with one of `extensions` (case-insensitive), sorted
pub fn collect_inputs(dir: &Path, extensions: &[&str]) -> PackResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        tracing::warn!("Input directory not found: {}", dir.display());
        return Ok(Vec::new());
    }

    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let base = glob::Pattern::escape(&dir.to_string_lossy());

    let mut inputs = Vec::new();
    for ext in extensions {
        let pattern = format!("{base}/*.{ext}");
        let paths = glob::glob_with(&pattern, options)
            .map_err(|e| PackError::Config(format!("Invalid input pattern {pattern}: {e}")))?;
        inputs.extend(paths.filter_map(Result::ok).filter(|p| p.is_file()));
    }
    inputs.sort();
    inputs.dedup();

    tracing::info!("Found {} input(s) in {}", inputs.len(), dir.display());
    Ok(inputs)
}

/// Which APK sets to build per AAB
#[derive(Debug, Clone)]
pub enum ModeSelection {
    One(ApksOptions),
    All,
}

/// Merge every split package in the split-package directory
pub fn batch_split_to_apk(
    config: &ConverterConfig,
    sink: Arc<dyn ProgressSink>,
) -> PackResult<BatchSummary> {
    let inputs = collect_inputs(&config.split_apk_dir(), &PackageFormat::EXTENSIONS)?;
    let converter = SplitApkConverter::new(config.clone()).with_sink(sink);
    let output_dir = config.apk_out_dir();

    let mut summary = BatchSummary::default();
    for input in inputs {
        let result = converter.convert(&input, &output_dir);
        summary.push(&input, item_name(&input), result);
    }
    Ok(summary)
}

/// Bundle every APK in the APK directory
pub fn batch_apk_to_aab(
    config: &ConverterConfig,
    sink: Arc<dyn ProgressSink>,
) -> PackResult<BatchSummary> {
    config.validate()?;
    let inputs = collect_inputs(&config.apk_dir(), &["apk"])?;
    let converter = ApkToAabConverter::new(config.clone()).with_sink(sink);
    let output_dir = config.aab_dir();

    let mut summary = BatchSummary::default();
    for input in inputs {
        let result = converter.convert(&input, &output_dir);
        summary.push(&input, item_name(&input), result);
    }
    Ok(summary)
}

/// Build APK sets for every AAB in the AAB directory
pub fn batch_aab_to_apks(
    config: &ConverterConfig,
    modes: &ModeSelection,
    sink: Arc<dyn ProgressSink>,
) -> PackResult<BatchSummary> {
    config.validate()?;
    let inputs = collect_inputs(&config.aab_dir(), &["aab"])?;
    let converter = AabToApksConverter::new(config.clone()).with_sink(sink);
    let output_dir = config.apks_dir();

    let mut summary = BatchSummary::default();
    for input in inputs {
        match modes {
            ModeSelection::One(options) => {
                let result = converter.convert(&input, options, &output_dir);
                summary.push(&input, item_name(&input), result);
            }
            ModeSelection::All => {
                for (mode, result) in converter.convert_all_modes(&input, &output_dir) {
                    summary.push(&input, format!("{} [{}]", item_name(&input), mode), result);
                }
            }
        }
    }
    Ok(summary)
}
