//! APK → Android App Bundle
//!
//! The APK is converted to proto format by aapt2, remapped into a bundle
//! module, zipped, and handed to `bundletool build-bundle`. The bundle is
//! then signed with the credential named after the APK, which is generated
//! on first use.

use crate::archive::Container;
use crate::config::ConverterConfig;
use crate::converter::{file_stem, item_name, prepare_output, verify_output, Services};
use crate::keystore::{CredentialGenerator, CredentialRecord};
use crate::metrics::ConversionMetrics;
use crate::module::assemble;
use crate::progress::{ProgressSink, Reporter, Stage};
use crate::report::{ConversionKind, ConversionReport, Warning, WarningKind};
use crate::tree::WorkingTree;
use crate::{PackError, PackResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const STAGES: u32 = 8;

/// Converts APKs into signed AABs
#[derive(Clone)]
pub struct ApkToAabConverter {
    services: Services,
    seed: Option<u64>,
}

impl ApkToAabConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            services: Services::new(config),
            seed: None,
        }
    }

    /// Route progress records to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.services.sink = sink;
        self
    }

    /// Generate credentials from a fixed seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Convert `apk` into `<output_dir>/<stem>.aab`
    pub fn convert(&self, apk: &Path, output_dir: &Path) -> PackResult<ConversionReport> {
        let mut reporter = Reporter::new(self.services.sink.as_ref(), item_name(apk), STAGES);
        let result = self.run(apk, output_dir, &mut reporter);
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
        apk: &Path,
        output_dir: &Path,
        reporter: &mut Reporter<'_>,
    ) -> PackResult<ConversionReport> {
        let toolchain = &self.services.toolchain;
        let mut metrics = ConversionMetrics::new(item_name(apk));
        let mut warnings = Vec::new();
        let stem = file_stem(apk);
        let work = TempDir::new()?;

        reporter.stage(Stage::Metadata, "reading package info");
        let package = match metrics.time_phase("badging", || toolchain.dump_badging(apk)) {
            Ok(info) => {
                tracing::info!(
                    package = %info.package_name,
                    version_code = %info.version_code,
                    version_name = %info.version_name,
                    "Package info"
                );
                Some(info)
            }
            Err(e) => {
                warnings.push(Warning::new(
                    WarningKind::Metadata,
                    item_name(apk),
                    format!("package info unavailable: {e}"),
                ));
                None
            }
        };

        reporter.stage(Stage::Convert, "converting to proto format");
        let proto = work.path().join("proto.apk");
        metrics.time_phase("proto", || toolchain.convert_to_proto(apk, &proto))?;

        reporter.stage(Stage::Assemble, "assembling module");
        let mut container = Container::open(&proto)?;
        let (tree, load_warnings) = WorkingTree::from_container(&mut container);
        warnings.extend(load_warnings);
        let assembly = metrics.time_phase("assemble", || assemble(&tree));
        warnings.extend(assembly.warnings);

        let module_zip = work.path().join("base.zip");
        fs::write(&module_zip, assembly.layout.pack()?)?;

        reporter.stage(Stage::Bundle, "building bundle");
        let output = output_dir.join(format!("{stem}.aab"));
        prepare_output(output_dir, &output)?;
        metrics.time_phase("bundle", || toolchain.build_bundle(&module_zip, &output))?;

        let mut signed = false;
        if self.services.config.signing.auto_sign {
            reporter.stage(Stage::Credential, "resolving credential");
            let credential = metrics.time_phase("credential", || self.credential_for(&stem));

            reporter.stage(Stage::Sign, "signing bundle");
            match credential {
                Ok(credential) => {
                    match metrics.time_phase("sign", || toolchain.sign_bundle(&output, &credential))
                    {
                        Ok(()) => signed = true,
                        Err(e) if !e.is_fatal() => warnings.push(Warning::new(
                            WarningKind::Signing,
                            item_name(&output),
                            format!("{e}; bundle left unsigned"),
                        )),
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => warnings.push(Warning::new(
                    WarningKind::Signing,
                    item_name(&output),
                    format!("no credential: {e}; bundle left unsigned"),
                )),
            }
        }

        reporter.stage(Stage::Verify, "verifying output");
        let (size, sha256) = verify_output(&output, "bundletool")?;

        metrics.log_report();
        Ok(ConversionReport {
            input: apk.to_path_buf(),
            output,
            kind: ConversionKind::Bundle,
            size,
            sha256,
            aligned: false,
            signed,
            package,
            warnings,
            phases: metrics.into_phases(),
        })
    }

    /// The credential named `name`, generated if it does not exist yet.
    ///
    /// A keystore file left without a usable record is never replaced; that
    /// case is a [`PackError::Signing`] error.
    pub fn credential_for(&self, name: &str) -> PackResult<CredentialRecord> {
        let store = &self.services.credentials;
        if let Some(record) = store.find_by_name(name) {
            tracing::info!("Using existing keystore {}", record.keystore_file.display());
            return Ok(record);
        }

        let keystore = store.keystore_path(name);
        if keystore.exists() {
            return Err(PackError::Signing(format!(
                "{} exists without a usable credential record",
                keystore.display()
            )));
        }

        let validity = self.services.config.signing.validity_days;
        let record = match self.seed {
            Some(seed) => {
                CredentialGenerator::new(StdRng::seed_from_u64(seed)).draft(keystore, validity)
            }
            None => CredentialGenerator::from_thread_rng().draft(keystore, validity),
        };

        self.services.toolchain.generate_keystore(&record)?;
        store.save(name, &record)?;
        tracing::info!(
            alias = %record.key_alias,
            dname = %record.dname,
            "Generated keystore {}",
            record.keystore_file.display()
        );
        Ok(record)
    }
}
