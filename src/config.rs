//! Converter configuration
//!
//! Configuration is read from an `apkpack.toml` file. Every section is
//! optional; defaults follow the directory layout the tool expects next to
//! the config file:
//!
//! ```toml
//! [dirs]                      # relative to the config file's directory
//! apk = "apk"                 # APK inputs for APK -> AAB
//! aab = "aab"                 # AAB outputs, and inputs for AAB -> APKS
//! apks = "apks"               # APK set outputs
//! split_apk = "split_apk"     # APKS/XAPK/APKM inputs
//! apk_out = "apk2"            # merged APK outputs
//! keystore = "keystore"       # credential records and keystores
//! tools = "tools"             # bundled toolchain root
//!
//! [tools]                     # optional per-tool overrides
//! aapt2 = "/opt/android/build-tools/35.0.0/aapt2"
//!
//! [signing]
//! auto_sign = true
//! validity_days = 10000
//!
//! [timeouts]
//! metadata_secs = 10
//! ```

use crate::{PackError, PackResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Build-tools version of the bundled Android SDK layout
const BUILD_TOOLS_VERSION: &str = "35.0.0";

/// External tools the converters drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Bundletool,
    Aapt2,
    Java,
    Keytool,
    Jarsigner,
    Zipalign,
    Apksigner,
}

impl Tool {
    /// Every tool
    pub const ALL: [Tool; 7] = [
        Tool::Bundletool,
        Tool::Aapt2,
        Tool::Java,
        Tool::Keytool,
        Tool::Jarsigner,
        Tool::Zipalign,
        Tool::Apksigner,
    ];

    /// Get the tool name
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Bundletool => "bundletool",
            Tool::Aapt2 => "aapt2",
            Tool::Java => "java",
            Tool::Keytool => "keytool",
            Tool::Jarsigner => "jarsigner",
            Tool::Zipalign => "zipalign",
            Tool::Apksigner => "apksigner",
        }
    }

    /// Whether conversions cannot run without this tool.
    ///
    /// zipalign and apksigner are optional: without them artifacts stay
    /// unaligned, or are signed with jarsigner instead.
    pub fn is_required(&self) -> bool {
        !matches!(self, Tool::Zipalign | Tool::Apksigner)
    }

    /// Default location relative to the tools directory
    fn default_relative(&self) -> PathBuf {
        let build_tools = Path::new("android-sdk")
            .join("build-tools")
            .join(BUILD_TOOLS_VERSION);
        let jdk_bin = Path::new("jdk").join("bin");
        match self {
            Tool::Bundletool => PathBuf::from("bundletool.jar"),
            Tool::Aapt2 => build_tools.join(exe("aapt2")),
            Tool::Zipalign => build_tools.join(exe("zipalign")),
            Tool::Apksigner => build_tools.join(script("apksigner")),
            Tool::Java => jdk_bin.join(exe("java")),
            Tool::Keytool => jdk_bin.join(exe("keytool")),
            Tool::Jarsigner => jdk_bin.join(exe("jarsigner")),
        }
    }
}

/// Executable file name for the current platform
fn exe(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Wrapper script name for the current platform
fn script(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.bat")
    } else {
        name.to_string()
    }
}

/// Working directories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirsConfig {
    pub apk: PathBuf,
    pub aab: PathBuf,
    pub apks: PathBuf,
    pub split_apk: PathBuf,
    pub apk_out: PathBuf,
    pub keystore: PathBuf,
    pub tools: PathBuf,
}

impl Default for DirsConfig {
    fn default() -> Self {
        Self {
            apk: "apk".into(),
            aab: "aab".into(),
            apks: "apks".into(),
            split_apk: "split_apk".into(),
            apk_out: "apk2".into(),
            keystore: "keystore".into(),
            tools: "tools".into(),
        }
    }
}

/// Per-tool path overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub bundletool: Option<PathBuf>,
    pub aapt2: Option<PathBuf>,
    pub java: Option<PathBuf>,
    pub keytool: Option<PathBuf>,
    pub jarsigner: Option<PathBuf>,
    pub zipalign: Option<PathBuf>,
    pub apksigner: Option<PathBuf>,
}

impl ToolPaths {
    fn get(&self, tool: Tool) -> Option<&PathBuf> {
        match tool {
            Tool::Bundletool => self.bundletool.as_ref(),
            Tool::Aapt2 => self.aapt2.as_ref(),
            Tool::Java => self.java.as_ref(),
            Tool::Keytool => self.keytool.as_ref(),
            Tool::Jarsigner => self.jarsigner.as_ref(),
            Tool::Zipalign => self.zipalign.as_ref(),
            Tool::Apksigner => self.apksigner.as_ref(),
        }
    }
}

/// Signing behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Sign outputs (generating credentials where needed)
    pub auto_sign: bool,
    /// Validity of generated keys, in days
    pub validity_days: u32,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            auto_sign: true,
            validity_days: 10_000,
        }
    }
}

/// Time budgets for external tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// `aapt2 dump badging` budget, in seconds
    pub metadata_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { metadata_secs: 10 }
    }
}

/// Complete converter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,

    #[serde(default)]
    pub dirs: DirsConfig,

    #[serde(default)]
    pub tools: ToolPaths,

    #[serde(default)]
    pub signing: SigningConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl ConverterConfig {
    /// Default configuration rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str, base_dir: impl Into<PathBuf>) -> PackResult<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    /// Load configuration from a file; relative paths resolve against its directory
    pub fn from_file(path: impl AsRef<Path>) -> PackResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PackError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::parse(&content, base_dir)
    }

    /// Find a config file in a directory
    pub fn find_in_dir(dir: impl AsRef<Path>) -> Option<PathBuf> {
        let dir = dir.as_ref();
        ["apkpack.toml", ".apkpack/config.toml"]
            .into_iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Disable or enable signing
    pub fn with_auto_sign(mut self, auto_sign: bool) -> Self {
        self.signing.auto_sign = auto_sign;
        self
    }

    /// Override a tool location
    pub fn with_tool(mut self, tool: Tool, path: impl Into<PathBuf>) -> Self {
        let path = Some(path.into());
        match tool {
            Tool::Bundletool => self.tools.bundletool = path,
            Tool::Aapt2 => self.tools.aapt2 = path,
            Tool::Java => self.tools.java = path,
            Tool::Keytool => self.tools.keytool = path,
            Tool::Jarsigner => self.tools.jarsigner = path,
            Tool::Zipalign => self.tools.zipalign = path,
            Tool::Apksigner => self.tools.apksigner = path,
        }
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    /// APK inputs for APK -> AAB
    pub fn apk_dir(&self) -> PathBuf {
        self.resolve(&self.dirs.apk)
    }

    /// AAB outputs and AAB -> APKS inputs
    pub fn aab_dir(&self) -> PathBuf {
        self.resolve(&self.dirs.aab)
    }

    /// APK set outputs
    pub fn apks_dir(&self) -> PathBuf {
        self.resolve(&self.dirs.apks)
    }

    /// Split-package inputs
    pub fn split_apk_dir(&self) -> PathBuf {
        self.resolve(&self.dirs.split_apk)
    }

    /// Merged APK outputs
    pub fn apk_out_dir(&self) -> PathBuf {
        self.resolve(&self.dirs.apk_out)
    }

    /// Credential records and keystores
    pub fn keystore_dir(&self) -> PathBuf {
        self.resolve(&self.dirs.keystore)
    }

    /// Toolchain root
    pub fn tools_dir(&self) -> PathBuf {
        self.resolve(&self.dirs.tools)
    }

    /// Resolved path of a tool
    pub fn tool_path(&self, tool: Tool) -> PathBuf {
        match self.tools.get(tool) {
            Some(path) => self.resolve(path),
            None => self.tools_dir().join(tool.default_relative()),
        }
    }

    /// Budget for package metadata queries
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.metadata_secs)
    }

    /// Required tools that are missing, with the path that was checked
    pub fn missing_tools(&self) -> Vec<(Tool, PathBuf)> {
        Tool::ALL
            .into_iter()
            .filter(Tool::is_required)
            .map(|tool| (tool, self.tool_path(tool)))
            .filter(|(_, path)| !path.exists())
            .collect()
    }

    /// Check that every required tool exists
    pub fn validate(&self) -> PackResult<()> {
        let missing = self.missing_tools();
        if missing.is_empty() {
            tracing::info!("All required tools found");
            return Ok(());
        }

        let list = missing
            .iter()
            .map(|(tool, path)| format!("{}: {}", tool.name(), path.display()))
            .collect::<Vec<_>>()
            .join(", ");
        Err(PackError::Config(format!("Missing tools: {list}")))
    }

    /// Create every working directory
    pub fn ensure_dirs(&self) -> PackResult<()> {
        for dir in [
            self.apk_dir(),
            self.aab_dir(),
            self.apks_dir(),
            self.split_apk_dir(),
            self.apk_out_dir(),
            self.keystore_dir(),
        ] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
                tracing::info!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }
}
