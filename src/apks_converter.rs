//! Android App Bundle → APK set

use crate::config::ConverterConfig;
use crate::converter::{file_stem, item_name, prepare_output, verify_output, Services};
use crate::metrics::ConversionMetrics;
use crate::progress::{ProgressSink, Reporter, Stage};
use crate::report::{ConversionKind, ConversionReport, Warning, WarningKind};
use crate::toolchain::{ApksOptions, BuildMode};
use crate::PackResult;
use std::path::Path;
use std::sync::Arc;

const STAGES: u32 = 3;

/// Builds APK sets from AABs with bundletool
#[derive(Clone)]
pub struct AabToApksConverter {
    services: Services,
}

impl AabToApksConverter {
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

    /// Build one APK set.
    ///
    /// The output is `<stem>.apks` for the default mode and
    /// `<stem>_<mode>.apks` otherwise. Without a credential bundletool
    /// falls back to its debug key, reported as a warning.
    pub fn convert(
        &self,
        aab: &Path,
        options: &ApksOptions,
        output_dir: &Path,
    ) -> PackResult<ConversionReport> {
        let item = format!("{} [{}]", item_name(aab), options.mode);
        let mut reporter = Reporter::new(self.services.sink.as_ref(), item, STAGES);
        let result = self.run(aab, options, output_dir, &mut reporter);
        match &result {
            Ok(report) => reporter.finish(
                true,
                &format!("{} ({:.2} MB)", report.output.display(), report.size_mb()),
            ),
            Err(e) => reporter.finish(false, &e.to_string()),
        }
        result
    }

    fn run(
        &self,
        aab: &Path,
        options: &ApksOptions,
        output_dir: &Path,
        reporter: &mut Reporter<'_>,
    ) -> PackResult<ConversionReport> {
        let mut metrics = ConversionMetrics::new(item_name(aab));
        let mut warnings = Vec::new();
        let stem = file_stem(aab);
        let output = output_dir.join(options.mode.output_name(&stem));

        reporter.stage(Stage::Credential, "resolving credential");
        let credential = if self.services.config.signing.auto_sign {
            self.services.credentials.find_for(&stem)
        } else {
            None
        };
        if credential.is_none() {
            warnings.push(Warning::new(
                WarningKind::Signing,
                item_name(&output),
                "no usable credential, APK set signed with the debug key",
            ));
        }

        reporter.stage(Stage::Build, format!("building {} APK set", options.mode));
        prepare_output(output_dir, &output)?;
        metrics.time_phase("build-apks", || {
            self.services
                .toolchain
                .build_apks(aab, &output, options, credential.as_ref())
        })?;

        reporter.stage(Stage::Verify, "verifying output");
        let (size, sha256) = verify_output(&output, "bundletool")?;

        metrics.log_report();
        Ok(ConversionReport {
            input: aab.to_path_buf(),
            output,
            kind: ConversionKind::ApkSet,
            size,
            sha256,
            aligned: false,
            signed: credential.is_some(),
            package: None,
            warnings,
            phases: metrics.into_phases(),
        })
    }

    /// Build an APK set for every mode; one mode failing does not stop the rest
    pub fn convert_all_modes(
        &self,
        aab: &Path,
        output_dir: &Path,
    ) -> Vec<(BuildMode, PackResult<ConversionReport>)> {
        BuildMode::ALL
            .into_iter()
            .map(|mode| {
                let options = ApksOptions::with_mode(mode);
                (mode, self.convert(aab, &options, output_dir))
            })
            .collect()
    }
}
