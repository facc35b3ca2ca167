//! Tuning value derivation.
//!
//! Based on the guidelines from
//! <https://wiki.postgresql.org/wiki/Tuning_Your_PostgreSQL_Server>.
//!
//! Derivation order (sizes in MB):
//!
//! ```text
//! memory ──► effective_cache ──► max_connections ──► work_memory
//!    │              │                                    ▲
//!    │              └────────────────────────────────────┘
//!    │              └──► maintenance_work_memory
//!    └──► shared_buffers (architecture cap)
//! ```
//!
//! Checkpoint spacing, completion target and statistics target are pure
//! per-workload lookups. `wal_keep_segments` depends only on free log volume
//! space. The remaining values are forwarded from [`ServerSettings`].
//!
//! [`ServerSettings`]: crate::profile::ServerSettings

use tracing::debug;

use crate::error::TuneError;
use crate::profile::{Architecture, SystemProfile};
use crate::result::{CheckpointPolicy, TuningResult, WAL_SEGMENT_MB};
use crate::rounding::binary_round;
use crate::workload::{CacheRule, WorkloadPolicy};

/// Hosts above this size reserve a fixed amount for the OS instead of a quarter.
const LARGE_HOST_MB: u64 = 16384;

/// Memory left to the OS and other processes on large dedicated hosts.
const OS_RESERVE_MB: u64 = 4096;

/// Hosts at or below this size get a flat share of memory for `shared_buffers`.
/// "1GB" often reports as ~960 MB, hence not 1024.
const SMALL_HOST_MB: u64 = 950;

/// `shared_buffers` share on small hosts.
const SMALL_HOST_SHARE: f64 = 0.15;

/// Ceiling for `maintenance_work_mem`.
const MAINTENANCE_CEILING_MB: f64 = 4096.0;

/// Computes tuning values from a [`SystemProfile`].
///
/// Stateless: the same calculator can be shared across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct TuningCalculator {
    strict_architecture: bool,
}

impl TuningCalculator {
    /// Tolerant calculator: unknown architectures are left uncapped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict calculator: unknown architectures are rejected.
    pub fn strict() -> Self {
        Self {
            strict_architecture: true,
        }
    }

    /// Derives every tuning value. Never returns a partial result.
    pub fn compute(&self, profile: &SystemProfile) -> Result<TuningResult, TuneError> {
        if let Architecture::Other(ref name) = profile.architecture {
            if self.strict_architecture {
                return Err(TuneError::UnsupportedArchitecture(name.clone()));
            }
            debug!("Unknown architecture '{}', shared_buffers left uncapped", name);
        }

        let derivation = Derivation::new(profile);
        let max_connections = derivation.max_connections();
        if max_connections == 0 {
            return Err(TuneError::invalid(
                "memory_kb",
                format!(
                    "{}MB of effective cache leaves no room for a single {}MB connection slot",
                    derivation.effective_cache, derivation.policy.desired_work_mem_mb
                ),
            ));
        }

        let result = TuningResult {
            memory: derivation.memory,
            max_connections,
            shared_buffers: binary_round(derivation.shared_buffers()),
            effective_cache_size: binary_round(derivation.effective_cache as f64),
            work_memory: binary_round(derivation.work_memory(max_connections)),
            maintenance_work_memory: binary_round(derivation.maintenance_work_memory()),
            checkpoint_segments_or_max_wal_size: derivation.checkpoint_policy(),
            checkpoint_completion_target: derivation
                .policy
                .checkpoint_completion_target
                .to_string(),
            default_statistics_target: derivation.policy.default_statistics_target,
            random_page_cost: profile.settings.random_page_cost,
            synchronous_commit: profile.settings.synchronous_commit.to_string(),
            data_directory: profile.settings.data_directory.clone(),
            wal_keep_segments: derivation.wal_keep_segments(),
        };

        debug!(
            "Tuned {} workload: memory={}MB effective_cache={}MB max_connections={} \
             shared_buffers={}MB work_mem={}MB maintenance_work_mem={}MB {}",
            profile.workload,
            result.memory,
            derivation.effective_cache,
            result.max_connections,
            result.shared_buffers,
            result.work_memory,
            result.maintenance_work_memory,
            result.checkpoint_segments_or_max_wal_size,
        );

        Ok(result)
    }
}

/// Computes tuning values with a tolerant [`TuningCalculator`].
pub fn compute(profile: &SystemProfile) -> Result<TuningResult, TuneError> {
    TuningCalculator::new().compute(profile)
}

/// Intermediate values shared by several parameters.
struct Derivation<'a> {
    profile: &'a SystemProfile,
    policy: &'static WorkloadPolicy,
    memory: u64,
    effective_cache: u64,
}

impl<'a> Derivation<'a> {
    fn new(profile: &'a SystemProfile) -> Self {
        let policy = profile.workload.policy();
        let memory = profile.memory_mb();
        let effective_cache = effective_cache(memory, policy.cache_rule);
        Self {
            profile,
            policy,
            memory,
            effective_cache,
        }
    }

    /// Connection count that leaves roughly the desired work memory per
    /// connection, never above the workload cap.
    fn max_connections(&self) -> u64 {
        let by_cache = round_to_ten(self.effective_cache / self.policy.desired_work_mem_mb);
        by_cache.min(self.policy.max_connections_cap)
    }

    fn shared_buffers(&self) -> f64 {
        let buffers = if self.memory <= SMALL_HOST_MB {
            self.memory as f64 * SMALL_HOST_SHARE
        } else {
            (self.memory / self.policy.shared_buffers_divisor) as f64
        };

        match self.profile.architecture.buffer_cap_mb() {
            Some(cap) => buffers.min(cap as f64),
            None => buffers,
        }
    }

    /// Applied to each sort by each session; complex queries use several.
    ///
    /// `max_connections` must be non-zero.
    fn work_memory(&self, max_connections: u64) -> f64 {
        let per_connection = (self.effective_cache as f64 / max_connections as f64).ceil();
        (per_connection * self.policy.work_mem_scale).min(self.policy.work_mem_ceiling_mb)
    }

    /// Used by VACUUM, CREATE INDEX and friends.
    fn maintenance_work_memory(&self) -> f64 {
        let share = self.effective_cache / self.policy.maintenance_divisor;
        (share as f64).min(MAINTENANCE_CEILING_MB)
    }

    fn checkpoint_policy(&self) -> CheckpointPolicy {
        let segments = self.policy.checkpoint_segments;
        if self.profile.engine_version.supports_max_wal_size() {
            CheckpointPolicy::max_wal_size_for(segments)
        } else {
            CheckpointPolicy::LegacySegments(segments)
        }
    }

    /// Share of free log volume space, counted in 16 MB segments.
    fn wal_keep_segments(&self) -> u64 {
        let free_mb = self.profile.free_log_volume_kb as f64 / 1024.0;
        (free_mb * self.policy.wal_keep_modifier / WAL_SEGMENT_MB as f64).round() as u64
    }
}

/// Memory available for disk caching by the OS and the database after
/// accounting for the OS itself and other applications.
fn effective_cache(memory: u64, rule: CacheRule) -> u64 {
    match rule {
        CacheRule::Dedicated if memory > LARGE_HOST_MB => memory - OS_RESERVE_MB,
        CacheRule::Dedicated => memory * 3 / 4,
        CacheRule::Quarter => memory / 4,
    }
}

/// Rounds to the nearest multiple of ten, halves up.
fn round_to_ten(n: u64) -> u64 {
    (n + 5) / 10 * 10
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{EngineVersion, ServerSettings, SynchronousCommit};
    use crate::workload::Workload;

    const GIB_KB: u64 = 1024 * 1024;

    fn profile(memory_kb: u64, workload: Workload) -> SystemProfile {
        SystemProfile {
            memory_kb,
            architecture: Architecture::Bits64,
            free_log_volume_kb: 10 * GIB_KB,
            engine_version: EngineVersion::new(10, 0),
            workload,
            settings: ServerSettings::new("/var/lib/postgresql/10/main"),
        }
    }

    #[test]
    fn test_round_to_ten() {
        assert_eq!(round_to_ten(0), 0);
        assert_eq!(round_to_ten(4), 0);
        assert_eq!(round_to_ten(5), 10);
        assert_eq!(round_to_ten(76), 80);
        assert_eq!(round_to_ten(99), 100);
        assert_eq!(round_to_ten(6144), 6140);
    }

    #[test]
    fn test_effective_cache_tiers() {
        assert_eq!(effective_cache(1024, CacheRule::Dedicated), 768);
        assert_eq!(effective_cache(16384, CacheRule::Dedicated), 12288);
        assert_eq!(effective_cache(16385, CacheRule::Dedicated), 12289);
        assert_eq!(effective_cache(65536, CacheRule::Dedicated), 61440);
        assert_eq!(effective_cache(65536, CacheRule::Quarter), 16384);
        assert_eq!(effective_cache(1024, CacheRule::Quarter), 256);
    }

    #[test]
    fn test_oltp_one_gib_scenario() {
        let p = profile(GIB_KB, Workload::Oltp);
        let d = Derivation::new(&p);
        assert_eq!(d.memory, 1024);
        assert_eq!(d.effective_cache, 768);
        assert_eq!(d.shared_buffers(), 256.0);

        let r = compute(&p).unwrap();
        assert_eq!(r.memory, 1024);
        assert_eq!(r.max_connections, 80);
        assert_eq!(r.shared_buffers, 256);
        assert_eq!(r.effective_cache_size, 768);
        assert_eq!(r.work_memory, 10);
        assert_eq!(r.maintenance_work_memory, 64);
        assert_eq!(
            r.checkpoint_segments_or_max_wal_size,
            CheckpointPolicy::MaxWalSize(768)
        );
        assert_eq!(
            r.checkpoint_segments_or_max_wal_size.to_string(),
            "max_wal_size = 768MB"
        );
        assert_eq!(r.checkpoint_completion_target, "0.9");
        assert_eq!(r.default_statistics_target, 100);
        assert_eq!(r.wal_keep_segments, 320);
    }

    #[test]
    fn test_dw_one_gib_scenario() {
        let r = compute(&profile(GIB_KB, Workload::Dw)).unwrap();
        assert_eq!(r.default_statistics_target, 500);
        assert_eq!(r.checkpoint_completion_target, "0.9");
        assert_eq!(
            r.checkpoint_segments_or_max_wal_size,
            CheckpointPolicy::MaxWalSize(3072)
        );
        assert_eq!(r.max_connections, 30);
        assert_eq!(r.maintenance_work_memory, 128);
        // ceil(768 / 30) * 0.85 = 22.1
        assert_eq!(r.work_memory, 22);
    }

    #[test]
    fn test_small_host_shared_buffers_ignore_workload() {
        for workload in Workload::ALL {
            let p = profile(900 * 1024, workload);
            let d = Derivation::new(&p);
            assert_eq!(d.memory, 900);
            assert!((d.shared_buffers() - 135.0).abs() < 1e-9);
            assert_eq!(compute(&p).unwrap().shared_buffers, 128);
        }
    }

    #[test]
    fn test_desktop_profile() {
        let r = compute(&profile(GIB_KB, Workload::Desktop)).unwrap();
        assert_eq!(r.effective_cache_size, 256);
        assert_eq!(r.max_connections, 10);
        // ceil(256 / 10) * 0.15 = 3.9
        assert_eq!(r.work_memory, 4);
        assert_eq!(r.maintenance_work_memory, 10);
        assert_eq!(r.shared_buffers, 64);
        assert_eq!(r.checkpoint_completion_target, "0.5");
        assert_eq!(r.wal_keep_segments, 160);
        assert_eq!(
            r.checkpoint_segments_or_max_wal_size,
            CheckpointPolicy::MaxWalSize(144)
        );
    }

    #[test]
    fn test_large_host() {
        let r = compute(&profile(64 * GIB_KB, Workload::Oltp)).unwrap();
        assert_eq!(r.memory, 65536);
        assert_eq!(r.effective_cache_size, 61440);
        assert_eq!(r.max_connections, 500);
        assert_eq!(r.work_memory, 20);
        assert_eq!(r.shared_buffers, 8192);
        assert_eq!(r.maintenance_work_memory, 4096);
    }

    #[test]
    fn test_architecture_caps_shared_buffers() {
        let mut p = profile(64 * GIB_KB, Workload::Web);
        p.architecture = Architecture::Bits32;
        assert_eq!(compute(&p).unwrap().shared_buffers, 2048);

        p.architecture = Architecture::Other("ppc64le".to_string());
        assert_eq!(compute(&p).unwrap().shared_buffers, 16384);
    }

    #[test]
    fn test_strict_mode_rejects_unknown_architecture() {
        let mut p = profile(GIB_KB, Workload::Web);
        p.architecture = Architecture::Other("ppc64le".to_string());

        let err = TuningCalculator::strict().compute(&p).unwrap_err();
        assert_eq!(err, TuneError::UnsupportedArchitecture("ppc64le".to_string()));
        assert!(TuningCalculator::new().compute(&p).is_ok());

        p.architecture = Architecture::Bits32;
        assert!(TuningCalculator::strict().compute(&p).is_ok());
    }

    #[test]
    fn test_legacy_engine_uses_checkpoint_segments() {
        let mut p = profile(GIB_KB, Workload::Web);
        p.engine_version = EngineVersion::new(9, 4);
        let r = compute(&p).unwrap();
        assert_eq!(
            r.checkpoint_segments_or_max_wal_size,
            CheckpointPolicy::LegacySegments(8)
        );
        assert_eq!(
            r.checkpoint_segments_or_max_wal_size.to_string(),
            "checkpoint_segments = 8"
        );
    }

    #[test]
    fn test_exactly_one_checkpoint_key() {
        let versions = [(8, 4), (9, 3), (9, 4), (9, 5), (9, 6), (10, 0), (16, 2)];
        for (major, minor) in versions {
            for workload in Workload::ALL {
                let mut p = profile(4 * GIB_KB, workload);
                p.engine_version = EngineVersion::new(major, minor);
                let line = compute(&p)
                    .unwrap()
                    .checkpoint_segments_or_max_wal_size
                    .to_string();

                let modern = p.engine_version >= EngineVersion::new(9, 5);
                assert_eq!(line.starts_with("max_wal_size = "), modern);
                assert_eq!(line.starts_with("checkpoint_segments = "), !modern);
            }
        }
    }

    #[test]
    fn test_pass_through_settings() {
        let mut p = profile(GIB_KB, Workload::Mixed);
        p.settings.random_page_cost = 1.1;
        p.settings.synchronous_commit = SynchronousCommit::Off;
        p.settings.data_directory = "/data/pg".to_string();

        let r = compute(&p).unwrap();
        assert_eq!(r.random_page_cost, 1.1);
        assert_eq!(r.synchronous_commit, "off");
        assert_eq!(r.data_directory, "/data/pg");
    }

    #[test]
    fn test_wal_keep_segments() {
        let mut p = profile(GIB_KB, Workload::Web);
        p.free_log_volume_kb = 0;
        assert_eq!(compute(&p).unwrap().wal_keep_segments, 0);

        // 100 MB * 0.5 / 16 = 3.125
        p.free_log_volume_kb = 100 * 1024;
        assert_eq!(compute(&p).unwrap().wal_keep_segments, 3);

        // 56 MB * 0.5 / 16 = 1.75
        p.free_log_volume_kb = 56 * 1024;
        assert_eq!(compute(&p).unwrap().wal_keep_segments, 2);
    }

    #[test]
    fn test_mixed_work_memory() {
        let r = compute(&profile(GIB_KB, Workload::Mixed)).unwrap();
        assert_eq!(r.max_connections, 50);
        // ceil(768 / 50) * 0.85 = 13.6
        assert_eq!(r.work_memory, 14);
    }

    #[test]
    fn test_host_without_connection_slots_is_rejected() {
        let err = compute(&profile(32 * 1024, Workload::Oltp)).unwrap_err();
        assert!(matches!(err, TuneError::InvalidProfile { field: "memory_kb", .. }));

        // Desktop needs 100 MB of cache (400 MB of memory) for ten connections.
        assert!(compute(&profile(399 * 1024, Workload::Desktop)).is_err());
        assert_eq!(
            compute(&profile(400 * 1024, Workload::Desktop))
                .unwrap()
                .max_connections,
            10
        );
    }

    #[test]
    fn test_desktop_shared_buffers_step_above_small_host_limit() {
        let at_limit = compute(&profile(950 * 1024, Workload::Desktop)).unwrap();
        let above = compute(&profile(951 * 1024, Workload::Desktop)).unwrap();
        // 950 * 0.15 = 142.5, then 951 / 16 = 59
        assert_eq!(at_limit.shared_buffers, 144);
        assert_eq!(above.shared_buffers, 60);
    }

    #[test]
    fn test_caps_hold_for_all_sizes() {
        let mut memory_mb = 512;
        while memory_mb <= 4 * 1024 * 1024 {
            for workload in Workload::ALL {
                let mut p = profile(memory_mb * 1024, workload);
                let r = compute(&p).unwrap();
                assert!(r.max_connections <= workload.policy().max_connections_cap);
                assert!(r.shared_buffers <= 8192);
                assert!(r.maintenance_work_memory <= 4096);

                p.architecture = Architecture::Bits32;
                assert!(compute(&p).unwrap().shared_buffers <= 2048);
            }
            memory_mb = memory_mb * 5 / 4 + 1;
        }
    }

    #[test]
    fn test_monotonic_in_memory() {
        for workload in Workload::ALL {
            let mut prev: Option<(u64, TuningResult)> = None;
            for memory_mb in (512..70_000).step_by(7) {
                let r = compute(&profile(memory_mb * 1024 + 1, workload)).unwrap();
                if let Some((prev_mb, ref prev)) = prev {
                    assert!(
                        r.effective_cache_size >= prev.effective_cache_size,
                        "{} effective_cache_size dropped at {}MB",
                        workload,
                        memory_mb
                    );
                    let desktop_step = workload == Workload::Desktop
                        && prev_mb <= SMALL_HOST_MB
                        && memory_mb > SMALL_HOST_MB;
                    if !desktop_step {
                        assert!(
                            r.shared_buffers >= prev.shared_buffers,
                            "{} shared_buffers dropped at {}MB",
                            workload,
                            memory_mb
                        );
                    }
                    // Below 8 GiB the connection count is rounded to tens and
                    // the per-connection budget oscillates with it.
                    if prev_mb >= 8192 {
                        assert!(
                            r.work_memory >= prev.work_memory,
                            "{} work_memory dropped at {}MB",
                            workload,
                            memory_mb
                        );
                    }
                }
                prev = Some((memory_mb, r));
            }
        }
    }

    #[test]
    fn test_work_memory_follows_rounded_connection_count() {
        // 992 MB: 744 MB cache, 70 connections, ceil(10.6) = 11.
        // 1000 MB: 750 MB cache, 80 connections, ceil(9.4) = 10.
        let smaller = compute(&profile(992 * 1024, Workload::Oltp)).unwrap();
        let larger = compute(&profile(1000 * 1024, Workload::Oltp)).unwrap();
        assert_eq!((smaller.max_connections, smaller.work_memory), (70, 11));
        assert_eq!((larger.max_connections, larger.work_memory), (80, 10));
    }

    #[test]
    fn test_deterministic() {
        for workload in Workload::ALL {
            let p = profile(3 * GIB_KB + 12345, workload);
            let first = compute(&p).unwrap();
            let second = compute(&p).unwrap();
            assert_eq!(first, second);
            assert_eq!(format!("{:?}", first), format!("{:?}", second));
        }
    }
}
