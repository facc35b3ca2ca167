//! Host attribute probing.
//!
//! Fills the parts of a [`ProfileInput`] that can be read from the running
//! host: total memory from `/proc/meminfo` and the CPU word width of the
//! current build target. Free space on the WAL volume is not probed and must
//! be supplied by the caller.
//!
//! The calculator never calls into this module.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::TuneError;
use crate::profile::ProfileInput;

/// Abstraction for filesystem reads so probing can be tested without `/proc`.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// In-memory filesystem for tests.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: HashMap<PathBuf, String>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files
            .insert(path.as_ref().to_path_buf(), content.into());
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("mock file not found: {}", path.display()),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

/// Parses a memory string with a `kB` suffix (`"16384256kB"`, `"1024 kB"`).
pub fn parse_memory_string(s: &str) -> Result<u64, TuneError> {
    let s = s.trim();
    let digits = s
        .strip_suffix("kB")
        .or_else(|| s.strip_suffix("KB"))
        .unwrap_or(s)
        .trim();
    digits
        .parse::<u64>()
        .map_err(|_| TuneError::invalid("memory_kb", format!("cannot parse '{}'", s)))
}

/// Extracts `MemTotal` (kB) from `/proc/meminfo` content.
pub fn parse_meminfo_total_kb(content: &str) -> Result<u64, TuneError> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))
        .ok_or_else(|| TuneError::invalid("memory_kb", "MemTotal not found in meminfo"))
        .and_then(parse_memory_string)
}

/// Reads host attributes through a [`FileSystem`].
pub struct HostProbe<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
    arch: String,
}

impl<F: FileSystem> HostProbe<F> {
    /// Probe using `proc_path` as the `/proc` mount and the architecture of
    /// the current build target.
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    /// Overrides the reported architecture.
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    /// Returns a partial profile with `memory_kb` and `architecture` set.
    pub fn probe(&self) -> Result<ProfileInput, TuneError> {
        let meminfo_path = self.proc_path.join("meminfo");
        if !self.fs.exists(&meminfo_path) {
            return Err(TuneError::invalid(
                "memory_kb",
                format!("{} not available on this host", meminfo_path.display()),
            ));
        }
        let content = self.fs.read_to_string(&meminfo_path).map_err(|e| {
            TuneError::invalid(
                "memory_kb",
                format!("cannot read {}: {}", meminfo_path.display(), e),
            )
        })?;
        let memory_kb = parse_meminfo_total_kb(&content)?;
        let memory_kb = i64::try_from(memory_kb)
            .map_err(|_| TuneError::invalid("memory_kb", "MemTotal out of range"))?;

        debug!(
            "Probed host: MemTotal={}kB arch={} (from {})",
            memory_kb,
            self.arch,
            meminfo_path.display()
        );

        Ok(ProfileInput {
            memory_kb: Some(memory_kb),
            architecture: Some(self.arch.clone()),
            ..ProfileInput::default()
        })
    }
}
