//! External tool invocations
//!
//! Every Android tool the converters need (aapt2, bundletool, zipalign,
//! apksigner, jarsigner, keytool) runs as a native process. This module
//! builds the command lines and maps failures onto [`PackError`].

use crate::config::{ConverterConfig, Tool};
use crate::inspector::PackageInfo;
use crate::keystore::CredentialRecord;
use crate::{PackError, PackResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Longest stderr excerpt carried in an error
const MAX_STDERR: usize = 4096;

/// bundletool `build-apks` mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    /// Split APKs targeted by device configuration
    #[default]
    Default,
    /// One APK containing every configuration
    Universal,
    /// System image APKs
    System,
    /// Compressed system image APKs
    SystemCompressed,
    /// Instant app APKs
    Instant,
    /// Persistent app APKs
    Persistent,
    /// Archived APKs
    Archive,
}

impl BuildMode {
    /// Every mode, in build order
    pub const ALL: [BuildMode; 7] = [
        BuildMode::Default,
        BuildMode::Universal,
        BuildMode::System,
        BuildMode::SystemCompressed,
        BuildMode::Instant,
        BuildMode::Persistent,
        BuildMode::Archive,
    ];

    /// Mode name as bundletool spells it
    pub fn name(&self) -> &'static str {
        match self {
            BuildMode::Default => "default",
            BuildMode::Universal => "universal",
            BuildMode::System => "system",
            BuildMode::SystemCompressed => "system_compressed",
            BuildMode::Instant => "instant",
            BuildMode::Persistent => "persistent",
            BuildMode::Archive => "archive",
        }
    }

    /// Output file name for an input stem
    pub fn output_name(&self, stem: &str) -> String {
        match self {
            BuildMode::Default => format!("{stem}.apks"),
            mode => format!("{stem}_{}.apks", mode.name()),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuildMode {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        BuildMode::ALL
            .into_iter()
            .find(|mode| mode.name() == lower)
            .ok_or_else(|| PackError::Config(format!("Unknown build mode: {s}")))
    }
}

/// Options for `build-apks`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApksOptions {
    pub mode: BuildMode,
    /// Device specification JSON to target a single device
    pub device_spec: Option<PathBuf>,
    pub local_testing: bool,
    pub verbose: bool,
}

impl ApksOptions {
    /// Options for a given mode
    pub fn with_mode(mode: BuildMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }
}

/// Extension trait to add `wait_timeout` to `Child`
trait ChildExt {
    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ExitStatus>>;
}

impl ChildExt for Child {
    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(50);

        loop {
            match self.try_wait()? {
                Some(status) => return Ok(Some(status)),
                None if start.elapsed() >= timeout => return Ok(None),
                None => std::thread::sleep(poll_interval),
            }
        }
    }
}

fn stderr_excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    match text.char_indices().nth(MAX_STDERR) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Resolved tool locations plus the command builders that use them
#[derive(Debug, Clone)]
pub struct Toolchain {
    paths: HashMap<Tool, PathBuf>,
    metadata_timeout: Duration,
}

impl Toolchain {
    /// Resolve every tool from the configuration
    pub fn new(config: &ConverterConfig) -> Self {
        let paths = Tool::ALL
            .into_iter()
            .map(|tool| (tool, config.tool_path(tool)))
            .collect();
        Self {
            paths,
            metadata_timeout: config.metadata_timeout(),
        }
    }

    /// Path of a tool
    pub fn path(&self, tool: Tool) -> &Path {
        self.paths
            .get(&tool)
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new(tool.name()))
    }

    /// Whether a tool is present on disk
    pub fn has(&self, tool: Tool) -> bool {
        self.path(tool).exists()
    }

    fn command(&self, tool: Tool) -> Command {
        Command::new(self.path(tool))
    }

    fn bundletool(&self) -> Command {
        let mut cmd = self.command(Tool::Java);
        cmd.arg("-jar").arg(self.path(Tool::Bundletool));
        cmd
    }

    /// Run to completion, failing on a non-zero exit
    fn run(&self, tool: Tool, cmd: &mut Command) -> PackResult<Output> {
        // arguments may carry keystore passwords
        tracing::debug!("Running {} ({})", tool.name(), self.path(tool).display());
        let output = cmd.output().map_err(|e| {
            PackError::tool(
                tool.name(),
                format!("failed to run {}: {}", self.path(tool).display(), e),
            )
        })?;

        if !output.status.success() {
            let stderr = stderr_excerpt(&output.stderr);
            return Err(PackError::tool(
                tool.name(),
                format!("exited with {}: {}", output.status, stderr),
            ));
        }
        Ok(output)
    }

    /// Convert an APK to proto format (`aapt2 convert`)
    pub fn convert_to_proto(&self, apk: &Path, output: &Path) -> PackResult<()> {
        tracing::info!("Converting {} to proto format", apk.display());
        let mut cmd = self.command(Tool::Aapt2);
        cmd.arg("convert")
            .arg("-o")
            .arg(output)
            .args(["--output-format", "proto"])
            .arg(apk);
        self.run(Tool::Aapt2, &mut cmd)?;
        Ok(())
    }

    /// Query package identity with `aapt2 dump badging`, bounded by the
    /// metadata timeout
    pub fn dump_badging(&self, apk: &Path) -> PackResult<PackageInfo> {
        let mut child = self
            .command(Tool::Aapt2)
            .args(["dump", "badging"])
            .arg(apk)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PackError::tool(Tool::Aapt2.name(), format!("failed to spawn: {e}")))?;

        // Drain stdout concurrently so a large dump cannot fill the pipe
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| PackError::tool(Tool::Aapt2.name(), "stdout not captured"))?;
        let reader = std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            buf
        });

        let status = match child.wait_timeout(self.metadata_timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PackError::Timeout {
                    tool: Tool::Aapt2.name().to_string(),
                    seconds: self.metadata_timeout.as_secs(),
                });
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        let output = reader
            .join()
            .map_err(|_| PackError::tool(Tool::Aapt2.name(), "output reader panicked"))?;

        if !status.success() {
            return Err(PackError::tool(
                Tool::Aapt2.name(),
                format!("dump badging exited with {status}"),
            ));
        }

        Ok(PackageInfo::from_badging(&String::from_utf8_lossy(&output)))
    }

    /// Build an AAB from a module zip (`bundletool build-bundle`)
    pub fn build_bundle(&self, module_zip: &Path, output: &Path) -> PackResult<()> {
        if output.exists() {
            std::fs::remove_file(output)?;
        }

        tracing::info!("Building bundle {}", output.display());
        let mut cmd = self.bundletool();
        cmd.arg("build-bundle")
            .arg(format!("--modules={}", module_zip.display()))
            .arg(format!("--output={}", output.display()));
        self.run(Tool::Bundletool, &mut cmd)?;

        if !output.exists() {
            return Err(PackError::tool(
                Tool::Bundletool.name(),
                format!("no bundle produced at {}", output.display()),
            ));
        }
        Ok(())
    }

    /// Build an APK set from an AAB (`bundletool build-apks`).
    ///
    /// Without a credential bundletool signs with its debug key.
    pub fn build_apks(
        &self,
        aab: &Path,
        output: &Path,
        options: &ApksOptions,
        credential: Option<&CredentialRecord>,
    ) -> PackResult<()> {
        let mut cmd = self.bundletool();
        cmd.arg("build-apks")
            .arg(format!("--bundle={}", aab.display()))
            .arg(format!("--output={}", output.display()))
            .arg("--overwrite");

        if options.mode != BuildMode::Default {
            cmd.arg(format!("--mode={}", options.mode.name()));
        }
        if let Some(spec) = &options.device_spec {
            cmd.arg(format!("--device-spec={}", spec.display()));
        }
        if options.local_testing {
            cmd.arg("--local-testing");
        }
        if options.verbose {
            cmd.arg("--verbose");
        }
        cmd.arg(format!("--aapt2={}", self.path(Tool::Aapt2).display()));

        if let Some(cred) = credential {
            cmd.arg(format!("--ks={}", cred.keystore_file.display()))
                .arg(format!("--ks-pass=pass:{}", cred.store_password))
                .arg(format!("--ks-key-alias={}", cred.key_alias))
                .arg(format!("--key-pass=pass:{}", cred.key_password));
        }

        tracing::info!(
            mode = options.mode.name(),
            "Building APK set {}",
            output.display()
        );
        self.run(Tool::Bundletool, &mut cmd)?;
        Ok(())
    }

    /// Align an APK on 4-byte boundaries (`zipalign -f -p 4`)
    pub fn align(&self, input: &Path, output: &Path) -> PackResult<()> {
        if !self.has(Tool::Zipalign) {
            return Err(PackError::Alignment(format!(
                "zipalign not found at {}",
                self.path(Tool::Zipalign).display()
            )));
        }

        let mut cmd = self.command(Tool::Zipalign);
        cmd.args(["-f", "-p", "4"]).arg(input).arg(output);
        self.run(Tool::Zipalign, &mut cmd)
            .map_err(|e| PackError::Alignment(e.to_string()))?;
        Ok(())
    }

    /// Sign an APK into `output`.
    ///
    /// Uses apksigner when available; otherwise copies the input and signs
    /// the copy in place with jarsigner.
    pub fn sign_apk(
        &self,
        input: &Path,
        output: &Path,
        credential: &CredentialRecord,
    ) -> PackResult<()> {
        if self.has(Tool::Apksigner) {
            let mut cmd = self.command(Tool::Apksigner);
            cmd.arg("sign")
                .arg("--ks")
                .arg(&credential.keystore_file)
                .arg("--ks-pass")
                .arg(format!("pass:{}", credential.store_password))
                .arg("--ks-key-alias")
                .arg(&credential.key_alias)
                .arg("--key-pass")
                .arg(format!("pass:{}", credential.key_password))
                .arg("--out")
                .arg(output)
                .arg(input);
            return self
                .run(Tool::Apksigner, &mut cmd)
                .map(|_| ())
                .map_err(|e| PackError::Signing(e.to_string()));
        }

        if input != output {
            std::fs::copy(input, output).map_err(|e| PackError::Signing(e.to_string()))?;
        }
        self.jarsign(output, credential)
    }

    /// Sign an AAB in place with jarsigner
    pub fn sign_bundle(&self, aab: &Path, credential: &CredentialRecord) -> PackResult<()> {
        tracing::info!("Signing {}", aab.display());
        self.jarsign(aab, credential)
    }

    fn jarsign(&self, target: &Path, credential: &CredentialRecord) -> PackResult<()> {
        let mut cmd = self.command(Tool::Jarsigner);
        cmd.args(["-sigalg", "SHA256withRSA", "-digestalg", "SHA-256"])
            .arg("-keystore")
            .arg(&credential.keystore_file)
            .arg("-storepass")
            .arg(&credential.store_password)
            .arg("-keypass")
            .arg(&credential.key_password)
            .arg(target)
            .arg(&credential.key_alias);
        self.run(Tool::Jarsigner, &mut cmd)
            .map(|_| ())
            .map_err(|e| PackError::Signing(e.to_string()))
    }

    /// Create the keystore described by `record` (`keytool -genkeypair`)
    pub fn generate_keystore(&self, record: &CredentialRecord) -> PackResult<()> {
        if let Some(parent) = record.keystore_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!("Generating keystore {}", record.keystore_file.display());
        let mut cmd = self.command(Tool::Keytool);
        cmd.arg("-genkeypair")
            .arg("-alias")
            .arg(&record.key_alias)
            .args(["-keyalg", "RSA", "-keysize", "2048"])
            .arg("-validity")
            .arg(record.validity_days.to_string())
            .arg("-keystore")
            .arg(&record.keystore_file)
            .arg("-storepass")
            .arg(&record.store_password)
            .arg("-keypass")
            .arg(&record.key_password)
            .arg("-dname")
            .arg(&record.dname);
        self.run(Tool::Keytool, &mut cmd)?;

        if !record.keystore_file.exists() {
            return Err(PackError::tool(
                Tool::Keytool.name(),
                format!("keystore not created at {}", record.keystore_file.display()),
            ));
        }
        Ok(())
    }
}
