//! Workload categories and the per-workload tuning policy.
//!
//! Every tunable that differs by workload lives in one [`WorkloadPolicy`]
//! record. [`Workload::policy`] is an exhaustive `match`, so adding a variant
//! without a policy does not compile.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TuneError;

/// Declared traffic pattern of the database server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Workload {
    /// Web application backend: many short queries.
    Web,
    /// Online transaction processing.
    Oltp,
    /// Data warehouse: few large analytic queries.
    Dw,
    /// Mix of transactional and reporting traffic.
    Mixed,
    /// Developer workstation sharing the host with other applications.
    Desktop,
}

/// How much memory the OS and database can use for disk caching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheRule {
    /// Dedicated server: three quarters of memory, or everything but 4 GiB
    /// on hosts above 16 GiB.
    Dedicated,
    /// Shared host: one quarter of memory regardless of size.
    Quarter,
}

/// Per-workload constants used by the calculator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkloadPolicy {
    /// Hard ceiling on `max_connections`.
    pub max_connections_cap: u64,
    /// Desired work memory per connection (MB), used to size the connection count.
    pub desired_work_mem_mb: u64,
    pub cache_rule: CacheRule,
    /// `shared_buffers = memory / divisor` on hosts above 950 MB.
    pub shared_buffers_divisor: u64,
    /// Upper bound on `work_mem` (MB).
    pub work_mem_ceiling_mb: f64,
    /// Fraction of the per-connection budget handed to `work_mem`.
    pub work_mem_scale: f64,
    /// `maintenance_work_mem = effective_cache / divisor`.
    pub maintenance_divisor: u64,
    /// WAL segments between checkpoints.
    pub checkpoint_segments: u32,
    pub checkpoint_completion_target: &'static str,
    pub default_statistics_target: u32,
    /// Fraction of free log volume space retained as WAL segments.
    pub wal_keep_modifier: f64,
}

const WEB: WorkloadPolicy = WorkloadPolicy {
    max_connections_cap: 500,
    desired_work_mem_mb: 10,
    cache_rule: CacheRule::Dedicated,
    shared_buffers_divisor: 4,
    work_mem_ceiling_mb: 20.0,
    work_mem_scale: 1.0,
    maintenance_divisor: 12,
    checkpoint_segments: 8,
    checkpoint_completion_target: "0.7",
    default_statistics_target: 100,
    wal_keep_modifier: 0.50,
};

const OLTP: WorkloadPolicy = WorkloadPolicy {
    checkpoint_segments: 16,
    checkpoint_completion_target: "0.9",
    ..WEB
};

const DW: WorkloadPolicy = WorkloadPolicy {
    max_connections_cap: 100,
    desired_work_mem_mb: 30,
    cache_rule: CacheRule::Dedicated,
    shared_buffers_divisor: 4,
    work_mem_ceiling_mb: 60.0,
    work_mem_scale: 0.85,
    maintenance_divisor: 6,
    checkpoint_segments: 64,
    checkpoint_completion_target: "0.9",
    default_statistics_target: 500,
    wal_keep_modifier: 0.50,
};

const MIXED: WorkloadPolicy = WorkloadPolicy {
    max_connections_cap: 200,
    desired_work_mem_mb: 15,
    cache_rule: CacheRule::Dedicated,
    shared_buffers_divisor: 4,
    work_mem_ceiling_mb: 30.0,
    work_mem_scale: 0.85,
    maintenance_divisor: 12,
    checkpoint_segments: 16,
    checkpoint_completion_target: "0.9",
    default_statistics_target: 100,
    wal_keep_modifier: 0.50,
};

const DESKTOP: WorkloadPolicy = WorkloadPolicy {
    max_connections_cap: 50,
    desired_work_mem_mb: 20,
    cache_rule: CacheRule::Quarter,
    shared_buffers_divisor: 16,
    work_mem_ceiling_mb: 20.0,
    work_mem_scale: 0.15,
    maintenance_divisor: 24,
    checkpoint_segments: 3,
    checkpoint_completion_target: "0.5",
    default_statistics_target: 100,
    wal_keep_modifier: 0.25,
};

impl Workload {
    /// All workloads, in declaration order.
    pub const ALL: [Workload; 5] = [
        Workload::Web,
        Workload::Oltp,
        Workload::Dw,
        Workload::Mixed,
        Workload::Desktop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Workload::Web => "web",
            Workload::Oltp => "oltp",
            Workload::Dw => "dw",
            Workload::Mixed => "mixed",
            Workload::Desktop => "desktop",
        }
    }

    /// Returns the tuning policy for this workload.
    pub fn policy(self) -> &'static WorkloadPolicy {
        match self {
            Workload::Web => &WEB,
            Workload::Oltp => &OLTP,
            Workload::Dw => &DW,
            Workload::Mixed => &MIXED,
            Workload::Desktop => &DESKTOP,
        }
    }
}

impl std::fmt::Display for Workload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Workload {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Workload::ALL
            .into_iter()
            .find(|w| w.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| TuneError::UnsupportedWorkload(name.to_string()))
    }
}
