//! Signing credentials
//!
//! A credential is a keystore file plus a JSON record next to it:
//!
//! ```json
//! {
//!   "keystore_file": "keystore/app.jks",
//!   "store_password": "…",
//!   "key_alias": "key_12345",
//!   "key_password": "…",
//!   "dname": "CN=…, OU=…, O=…, L=…, ST=…, C=…",
//!   "dname_info": { "cn": "…", "ou": "…", "o": "…", "l": "…", "st": "…", "c": "…" },
//!   "validity_days": 10000,
//!   "created_at": "2025-01-01T12:00:00.000000"
//! }
//! ```
//!
//! Lookups first try the record named after the artifact, then fall back to
//! the first usable record in lexicographic file order, so the same
//! directory always yields the same credential.

use crate::PackResult;
use rand::distributions::Alphanumeric;
use rand::rngs::ThreadRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Keystore file extension
pub const KEYSTORE_EXT: &str = "jks";

/// Credential record file extension
pub const RECORD_EXT: &str = "json";

fn default_validity_days() -> u32 {
    10_000
}

/// Components of a distinguished name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnameInfo {
    pub cn: String,
    pub ou: String,
    pub o: String,
    pub l: String,
    pub st: String,
    pub c: String,
}

impl DnameInfo {
    /// Render as an X.500 distinguished name
    pub fn to_dname(&self) -> String {
        format!(
            "CN={}, OU={}, O={}, L={}, ST={}, C={}",
            self.cn, self.ou, self.o, self.l, self.st, self.c
        )
    }
}

/// JSON sidecar describing a signing credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub keystore_file: PathBuf,
    pub store_password: String,
    pub key_alias: String,
    pub key_password: String,
    pub dname: String,
    #[serde(default)]
    pub dname_info: DnameInfo,
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,
    #[serde(default)]
    pub created_at: String,
}

/// Directory of credential records
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    /// Create a store over `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keystore path for an artifact name
    pub fn keystore_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{KEYSTORE_EXT}"))
    }

    /// Record path for an artifact name
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{RECORD_EXT}"))
    }

    /// Read a record from disk
    pub fn load(path: impl AsRef<Path>) -> PackResult<CredentialRecord> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write `record` as `<name>.json`, returning its path
    pub fn save(&self, name: &str, record: &CredentialRecord) -> PackResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.record_path(name);
        fs::write(&path, serde_json::to_string_pretty(record)?)?;
        tracing::debug!("Saved credential record: {}", path.display());
        Ok(path)
    }

    /// Resolve the keystore path of a record. A relative path that does not
    /// resolve from the working directory is looked up by file name in the
    /// store directory.
    pub fn keystore_of(&self, record: &CredentialRecord) -> PathBuf {
        let given = &record.keystore_file;
        if given.is_absolute() || given.exists() {
            return given.clone();
        }
        match given.file_name() {
            Some(name) => self.dir.join(name),
            None => self.dir.join(given),
        }
    }

    /// Load a record and check that its keystore exists
    fn load_usable(&self, path: &Path) -> Option<CredentialRecord> {
        match Self::load(path) {
            Ok(mut record) => {
                let keystore = self.keystore_of(&record);
                if keystore.exists() {
                    record.keystore_file = keystore;
                    Some(record)
                } else {
                    tracing::debug!(
                        "Keystore missing for {}: {}",
                        path.display(),
                        keystore.display()
                    );
                    None
                }
            }
            Err(e) => {
                tracing::debug!("Unreadable credential record {}: {}", path.display(), e);
                None
            }
        }
    }

    /// The record named after `name`, if its keystore exists
    pub fn find_by_name(&self, name: &str) -> Option<CredentialRecord> {
        let path = self.record_path(name);
        if !path.is_file() {
            return None;
        }
        self.load_usable(&path)
    }

    /// The first usable record in lexicographic file order
    pub fn first_available(&self) -> Option<CredentialRecord> {
        let pattern = format!(
            "{}/*.{RECORD_EXT}",
            glob::Pattern::escape(&self.dir.to_string_lossy())
        );

        let mut paths: Vec<PathBuf> = match glob::glob(&pattern) {
            Ok(paths) => paths.filter_map(Result::ok).collect(),
            Err(e) => {
                tracing::warn!("Invalid credential scan pattern {}: {}", pattern, e);
                return None;
            }
        };
        paths.sort();

        paths.iter().find_map(|path| self.load_usable(path))
    }

    /// The record named after `name`, else the first usable one
    pub fn find_for(&self, name: &str) -> Option<CredentialRecord> {
        if let Some(record) = self.find_by_name(name) {
            return Some(record);
        }
        let record = self.first_available()?;
        tracing::info!(
            "No credential named {}, using {}",
            name,
            record.keystore_file.display()
        );
        Some(record)
    }
}

const FIRST_NAMES: [&str; 23] = [
    "James", "John", "Robert", "Michael", "William", "David", "Richard", "Joseph", "Thomas",
    "Charles", "Christopher", "Daniel", "Matthew", "Anthony", "Mark", "Emma", "Olivia", "Ava",
    "Isabella", "Sophia", "Mia", "Charlotte", "Amelia",
];

const LAST_NAMES: [&str; 23] = [
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Thompson", "White",
];

const COMPANY_SUFFIXES: [&str; 10] = [
    "Inc", "LLC", "Corp", "Ltd", "Co", "Technologies", "Software", "Apps", "Mobile", "Digital",
];

const DEPARTMENTS: [&str; 8] = [
    "Development", "Engineering", "Mobile", "Android", "Software", "Technology", "Digital", "Apps",
];

const CITIES: [&str; 18] = [
    "San Francisco", "New York", "Los Angeles", "Seattle", "Austin", "Boston", "Chicago",
    "Denver", "Portland", "San Diego", "Atlanta", "Miami", "London", "Berlin", "Tokyo",
    "Singapore", "Sydney", "Toronto",
];

const STATES: [&str; 12] = [
    "California", "New York", "Texas", "Washington", "Massachusetts", "Colorado", "Oregon",
    "Florida", "Georgia", "Illinois", "Virginia", "Arizona",
];

const COUNTRIES: [&str; 10] = ["US", "GB", "DE", "JP", "SG", "AU", "CA", "FR", "NL", "SE"];

/// Random credential generator.
///
/// The randomness source is injected so generation is reproducible in tests.
pub struct CredentialGenerator<R> {
    rng: R,
}

impl CredentialGenerator<ThreadRng> {
    /// Generator backed by the thread-local RNG
    pub fn from_thread_rng() -> Self {
        Self::new(rand::thread_rng())
    }
}

impl<R: Rng> CredentialGenerator<R> {
    /// Create a generator over `rng`
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    fn pick(&mut self, table: &[&'static str]) -> &'static str {
        table[self.rng.gen_range(0..table.len())]
    }

    /// Alphanumeric password; no shell-sensitive characters
    pub fn password(&mut self, length: usize) -> String {
        (&mut self.rng)
            .sample_iter(Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }

    /// Key alias of the form `key_NNNNN`
    pub fn alias(&mut self) -> String {
        format!("key_{}", self.rng.gen_range(10_000..=99_999))
    }

    /// Plausible developer identity
    pub fn dname_info(&mut self) -> DnameInfo {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let suffix = self.pick(&COMPANY_SUFFIXES);
        DnameInfo {
            cn: format!("{first} {last}"),
            ou: self.pick(&DEPARTMENTS).to_string(),
            o: format!("{last} {suffix}"),
            l: self.pick(&CITIES).to_string(),
            st: self.pick(&STATES).to_string(),
            c: self.pick(&COUNTRIES).to_string(),
        }
    }

    /// Draft a record for a keystore that is yet to be created.
    ///
    /// PKCS12 keystores need the store and key passwords to match.
    pub fn draft(
        &mut self,
        keystore_file: impl Into<PathBuf>,
        validity_days: u32,
    ) -> CredentialRecord {
        let password = self.password(16);
        let key_alias = self.alias();
        let dname_info = self.dname_info();

        CredentialRecord {
            keystore_file: keystore_file.into(),
            store_password: password.clone(),
            key_alias,
            key_password: password,
            dname: dname_info.to_dname(),
            dname_info,
            validity_days,
            created_at: chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
        }
    }
}
