//! Split package → single installable APK
//!
//! Pipeline per input: detect format, inspect, read store metadata, plan,
//! then either copy the chosen package out as-is or merge base and splits,
//! repack, align and sign. Alignment and signing problems degrade the
//! artifact and are reported as warnings.

use crate::archive::Container;
use crate::config::ConverterConfig;
use crate::converter::{file_stem, item_name, prepare_output, verify_output, Services};
use crate::inspector::{inspect, PackageFormat, PackageInfo};
use crate::keystore::CredentialRecord;
use crate::merger::merge;
use crate::metrics::ConversionMetrics;
use crate::planner::{plan, MergePlan};
use crate::progress::{ProgressSink, Reporter, Stage};
use crate::repack::repack_to;
use crate::report::{ConversionKind, ConversionReport, Warning, WarningKind};
use crate::{PackError, PackResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const STAGES: u32 = 9;

/// Converts APKS/XAPK/APKM containers into one APK
#[derive(Clone)]
pub struct SplitApkConverter {
    services: Services,
}

impl SplitApkConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            services: Services::new(config),
        }
    }

    /// Route progress records to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.services.sink = sink;
        self
    }

    /// Convert `input` into `<output_dir>/<stem>.apk`
    pub fn convert(&self, input: &Path, output_dir: &Path) -> PackResult<ConversionReport> {
        let mut reporter = Reporter::new(self.services.sink.as_ref(), item_name(input), STAGES);
        let result = self.run(input, output_dir, &mut reporter);
        match &result {
            Ok(report) => reporter.finish(
                true,
                &format!(
                    "{} ({:.2} MB, {} warnings)",
                    report.output.display(),
                    report.size_mb(),
                    report.warnings.len()
                ),
            ),
            Err(e) => reporter.finish(false, &e.to_string()),
        }
        result
    }

    fn run(
        &self,
        input: &Path,
        output_dir: &Path,
        reporter: &mut Reporter<'_>,
    ) -> PackResult<ConversionReport> {
        let mut metrics = ConversionMetrics::new(item_name(input));
        let mut warnings = Vec::new();

        reporter.stage(Stage::Detect, "detecting format");
        let format = PackageFormat::from_path(input)
            .ok_or_else(|| PackError::UnsupportedFormat(input.to_path_buf()))?;
        tracing::info!("Converting {} ({})", input.display(), format.name());

        reporter.stage(Stage::Inspect, "inspecting container");
        let (mut container, analysis) = metrics.time_phase("inspect", || {
            let container = Container::open(input)?;
            let analysis = inspect(&container);
            Ok::<_, PackError>((container, analysis))
        })?;

        if !analysis.obb_entries.is_empty() {
            warnings.push(Warning::new(
                WarningKind::ObbIgnored,
                container.label(),
                format!(
                    "{} OBB expansion file(s) present, not included",
                    analysis.obb_entries.len()
                ),
            ));
        }

        reporter.stage(Stage::Metadata, "reading store metadata");
        let package = match &analysis.manifest_entry {
            Some(entry) => {
                match container
                    .read(entry)
                    .and_then(|bytes| PackageInfo::from_store_manifest(&bytes))
                {
                    Ok(info) => {
                        tracing::info!(
                            package = %info.package_name,
                            version = %info.version_name,
                            "Store metadata"
                        );
                        Some(info)
                    }
                    Err(e) => {
                        warnings.push(Warning::new(
                            WarningKind::Metadata,
                            entry.as_str(),
                            format!("unreadable metadata: {e}"),
                        ));
                        None
                    }
                }
            }
            None => None,
        };

        reporter.stage(Stage::Plan, "choosing strategy");
        let merge_plan = plan(&analysis, container.label())?;
        tracing::info!(plan = merge_plan.name(), entries = ?merge_plan.entries(), "Planned");

        let output = output_dir.join(format!("{}.apk", file_stem(input)));
        prepare_output(output_dir, &output)?;

        let (kind, aligned, signed) = match merge_plan {
            MergePlan::DirectExtract { entry } => {
                reporter.stage(Stage::Extract, format!("extracting {entry}"));
                let bytes = metrics.time_phase("extract", || container.read(&entry))?;
                fs::write(&output, bytes)?;
                (ConversionKind::DirectExtract, false, false)
            }
            MergePlan::MultiwayMerge { entries } => {
                let work = TempDir::new()?;

                reporter.stage(Stage::Merge, format!("merging {} packages", entries.len()));
                let outcome = metrics.time_phase("merge", || merge(&mut container, &entries))?;
                warnings.extend(outcome.warnings);

                reporter.stage(Stage::Repack, "repacking");
                let unsigned = work.path().join("merged_unsigned.apk");
                metrics.time_phase("repack", || repack_to(&outcome.tree, &unsigned))?;

                reporter.stage(Stage::Align, "aligning");
                let aligned_path = work.path().join("merged_aligned.apk");
                let (current, aligned) = match metrics.time_phase("align", || {
                    self.services.toolchain.align(&unsigned, &aligned_path)
                }) {
                    Ok(()) => (aligned_path, true),
                    Err(e) if !e.is_fatal() => {
                        warnings.push(Warning::new(
                            WarningKind::Alignment,
                            item_name(&output),
                            format!("{e}; using unaligned package"),
                        ));
                        (unsigned, false)
                    }
                    Err(e) => return Err(e),
                };

                reporter.stage(Stage::Sign, "signing");
                let signed = metrics.time_phase("sign", || {
                    self.sign(&current, &output, &file_stem(input), &mut warnings)
                })?;

                (ConversionKind::MultiwayMerge, aligned, signed)
            }
        };

        reporter.stage(Stage::Verify, "verifying output");
        let (size, sha256) = verify_output(&output, "converter")?;

        metrics.log_report();
        Ok(ConversionReport {
            input: input.to_path_buf(),
            output,
            kind,
            size,
            sha256,
            aligned,
            signed,
            package,
            warnings,
            phases: metrics.into_phases(),
        })
    }

    /// Sign `input` into `output`, or copy it unsigned when no credential
    /// is usable. Returns whether the output is signed.
    fn sign(
        &self,
        input: &Path,
        output: &Path,
        name: &str,
        warnings: &mut Vec<Warning>,
    ) -> PackResult<bool> {
        let subject = item_name(output);

        let credential: Option<CredentialRecord> = if self.services.config.signing.auto_sign {
            self.services.credentials.find_for(name)
        } else {
            tracing::debug!("Signing disabled");
            None
        };

        let Some(credential) = credential else {
            if self.services.config.signing.auto_sign {
                warnings.push(Warning::new(
                    WarningKind::Signing,
                    subject,
                    format!(
                        "no usable credential in {}, package left unsigned",
                        self.services.credentials.dir().display()
                    ),
                ));
            }
            fs::copy(input, output)?;
            return Ok(false);
        };

        match self.services.toolchain.sign_apk(input, output, &credential) {
            Ok(()) => {
                tracing::info!("Signed with {}", credential.keystore_file.display());
                Ok(true)
            }
            Err(e) if !e.is_fatal() => {
                warnings.push(Warning::new(
                    WarningKind::Signing,
                    subject,
                    format!("{e}; package left unsigned"),
                ));
                if output.exists() {
                    fs::remove_file(output)?;
                }
                fs::copy(input, output)?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Convert one split package with default settings rooted at `base_dir`
pub fn convert_split(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    base_dir: impl Into<PathBuf>,
) -> PackResult<ConversionReport> {
    SplitApkConverter::new(ConverterConfig::new(base_dir))
        .convert(input.as_ref(), output_dir.as_ref())
}
