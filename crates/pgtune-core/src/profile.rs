//! Host description consumed by the calculator.
//!
//! [`SystemProfile`] is the validated, strongly typed input. Callers usually
//! assemble a loosely typed [`ProfileInput`] from flags, files and host
//! probing, then call [`ProfileInput::validate`] once before computing.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TuneError;
use crate::workload::Workload;

/// Default `random_page_cost`. PostgreSQL ships 4.0; 2-3 suits modern drives.
pub const DEFAULT_RANDOM_PAGE_COST: f64 = 3.0;

/// First engine version that replaced `checkpoint_segments` with `max_wal_size`.
pub const MAX_WAL_SIZE_SINCE: EngineVersion = EngineVersion { major: 9, minor: 5 };

/// CPU word width of the target host. Governs the `shared_buffers` cap.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Architecture {
    Bits32,
    Bits64,
    /// Unrecognized architecture, kept verbatim. Uncapped in tolerant mode.
    Other(String),
}

impl Architecture {
    /// Upper bound on `shared_buffers` in MB, if any.
    pub fn buffer_cap_mb(&self) -> Option<u64> {
        match self {
            Architecture::Bits32 => Some(2048),
            Architecture::Bits64 => Some(8192),
            Architecture::Other(_) => None,
        }
    }
}

impl From<&str> for Architecture {
    fn from(s: &str) -> Self {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "32-bit" | "i386" | "i686" => Architecture::Bits32,
            "64-bit" | "x86_64" | "amd64" | "aarch64" | "arm64" => Architecture::Bits64,
            _ => Architecture::Other(s.to_string()),
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Architecture::Bits32 => f.write_str("32-bit"),
            Architecture::Bits64 => f.write_str("64-bit"),
            Architecture::Other(name) => f.write_str(name),
        }
    }
}

/// Major.minor version of the target PostgreSQL server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
}

impl EngineVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn supports_max_wal_size(&self) -> bool {
        *self >= MAX_WAL_SIZE_SINCE
    }
}

impl FromStr for EngineVersion {
    type Err = TuneError;

    /// Parses `"9.4"`, `"10"`, `"16.2"`. A patch component (`"9.6.24"`) is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || TuneError::invalid("engine_version", format!("cannot parse '{}'", s));

        let mut parts = s.split('.');
        let major = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(bad)?
            .parse::<u32>()
            .map_err(|_| bad())?;
        let minor = match parts.next() {
            Some(p) => p.parse::<u32>().map_err(|_| bad())?,
            None => 0,
        };

        Ok(Self { major, minor })
    }
}

impl std::fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Durability mode for `synchronous_commit`.
///
/// `off` trades the last few commits on power loss for much higher commit
/// throughput; it never risks corruption.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynchronousCommit {
    #[default]
    On,
    Off,
    Local,
    RemoteWrite,
    RemoteApply,
}

impl SynchronousCommit {
    pub fn as_str(self) -> &'static str {
        match self {
            SynchronousCommit::On => "on",
            SynchronousCommit::Off => "off",
            SynchronousCommit::Local => "local",
            SynchronousCommit::RemoteWrite => "remote_write",
            SynchronousCommit::RemoteApply => "remote_apply",
        }
    }
}

impl FromStr for SynchronousCommit {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(SynchronousCommit::On),
            "off" => Ok(SynchronousCommit::Off),
            "local" => Ok(SynchronousCommit::Local),
            "remote_write" => Ok(SynchronousCommit::RemoteWrite),
            "remote_apply" => Ok(SynchronousCommit::RemoteApply),
            other => Err(TuneError::invalid(
                "synchronous_commit",
                format!("unknown mode '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for SynchronousCommit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values forwarded verbatim into the result.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerSettings {
    pub random_page_cost: f64,
    pub synchronous_commit: SynchronousCommit,
    pub data_directory: String,
}

impl ServerSettings {
    /// Settings with the stock defaults (`random_page_cost = 3.0`,
    /// `synchronous_commit = on`).
    pub fn new(data_directory: impl Into<String>) -> Self {
        Self {
            random_page_cost: DEFAULT_RANDOM_PAGE_COST,
            synchronous_commit: SynchronousCommit::default(),
            data_directory: data_directory.into(),
        }
    }
}

/// Validated description of the target host.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemProfile {
    /// Total physical memory in kB.
    pub memory_kb: u64,
    pub architecture: Architecture,
    /// Free space on the volume holding the write-ahead log, in kB.
    pub free_log_volume_kb: u64,
    pub engine_version: EngineVersion,
    pub workload: Workload,
    pub settings: ServerSettings,
}

impl SystemProfile {
    /// Total memory in whole megabytes.
    pub fn memory_mb(&self) -> u64 {
        self.memory_kb / 1024
    }
}

/// Engine version as it appears in JSON: `"9.6"` or `9.6`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionInput {
    Text(String),
    Number(f64),
}

impl VersionInput {
    fn parse(&self) -> Result<EngineVersion, TuneError> {
        match self {
            VersionInput::Text(s) => s.parse(),
            VersionInput::Number(n) => {
                // As a number, 9.45 sorts below 9.5; as major.minor it would
                // read as 9.45 > 9.5. Only one minor digit is unambiguous.
                let text = n.to_string();
                match text.split_once('.') {
                    Some((_, minor)) if minor.len() > 1 => Err(TuneError::invalid(
                        "engine_version",
                        format!("ambiguous numeric version {}, quote it as a string", text),
                    )),
                    _ => text.parse(),
                }
            }
        }
    }
}

impl From<&str> for VersionInput {
    fn from(s: &str) -> Self {
        VersionInput::Text(s.to_string())
    }
}

/// Unvalidated profile as supplied by the caller.
///
/// Every field is optional so partial sources (a file, the host probe,
/// command-line flags) can be layered with [`ProfileInput::merge`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileInput {
    pub memory_kb: Option<i64>,
    pub architecture: Option<String>,
    pub free_log_volume_kb: Option<i64>,
    pub engine_version: Option<VersionInput>,
    pub workload: Option<String>,
    pub random_page_cost: Option<f64>,
    pub synchronous_commit: Option<String>,
    pub data_directory: Option<String>,
}

impl ProfileInput {
    /// Overlays `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: ProfileInput) -> ProfileInput {
        ProfileInput {
            memory_kb: other.memory_kb.or(self.memory_kb),
            architecture: other.architecture.or(self.architecture),
            free_log_volume_kb: other.free_log_volume_kb.or(self.free_log_volume_kb),
            engine_version: other.engine_version.or(self.engine_version),
            workload: other.workload.or(self.workload),
            random_page_cost: other.random_page_cost.or(self.random_page_cost),
            synchronous_commit: other.synchronous_commit.or(self.synchronous_commit),
            data_directory: other.data_directory.or(self.data_directory),
        }
    }

    /// Parses a JSON profile document.
    #[cfg(feature = "json")]
    pub fn from_json(content: &str) -> Result<ProfileInput, TuneError> {
        serde_json::from_str(content).map_err(|e| TuneError::invalid("profile", e.to_string()))
    }

    /// Checks every field and builds a [`SystemProfile`].
    ///
    /// Fails on the first missing or malformed field. Pass-through settings
    /// fall back to their defaults when absent.
    pub fn validate(&self) -> Result<SystemProfile, TuneError> {
        let memory_kb = non_negative("memory_kb", self.memory_kb)?;
        if memory_kb == 0 {
            return Err(TuneError::invalid("memory_kb", "must be greater than zero"));
        }

        let architecture = match self.architecture.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => Architecture::from(a),
            _ => return Err(TuneError::invalid("architecture", "missing")),
        };

        let free_log_volume_kb = non_negative("free_log_volume_kb", self.free_log_volume_kb)?;

        let engine_version = self
            .engine_version
            .as_ref()
            .ok_or_else(|| TuneError::invalid("engine_version", "missing"))?
            .parse()?;

        let workload = self
            .workload
            .as_deref()
            .ok_or_else(|| TuneError::invalid("workload", "missing"))?
            .parse::<Workload>()?;

        let data_directory = match self.data_directory.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => return Err(TuneError::invalid("data_directory", "missing")),
        };
        let mut settings = ServerSettings::new(data_directory);

        if let Some(cost) = self.random_page_cost {
            if !cost.is_finite() || cost <= 0.0 {
                return Err(TuneError::invalid(
                    "random_page_cost",
                    format!("must be a positive number, got {}", cost),
                ));
            }
            settings.random_page_cost = cost;
        }

        if let Some(ref mode) = self.synchronous_commit {
            settings.synchronous_commit = mode.parse()?;
        }

        Ok(SystemProfile {
            memory_kb,
            architecture,
            free_log_volume_kb,
            engine_version,
            workload,
            settings,
        })
    }
}

fn non_negative(field: &'static str, value: Option<i64>) -> Result<u64, TuneError> {
    match value {
        None => Err(TuneError::invalid(field, "missing")),
        Some(v) if v < 0 => Err(TuneError::invalid(
            field,
            format!("must not be negative, got {}", v),
        )),
        Some(v) => Ok(v as u64),
    }
}
