//! Computed tuning values, ready for a configuration renderer.

use serde::{Serialize, Serializer};

/// Size of one WAL segment in MB.
pub const WAL_SEGMENT_MB: u64 = 16;

/// Checkpoint spacing, expressed with the key the target engine understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckpointPolicy {
    /// Pre-9.5 servers: `checkpoint_segments = n`.
    LegacySegments(u32),
    /// 9.5 and later: `max_wal_size = <mb>MB`.
    MaxWalSize(u64),
}

impl CheckpointPolicy {
    /// Three checkpoint cycles' worth of segments, as `max_wal_size`.
    pub fn max_wal_size_for(segments: u32) -> Self {
        CheckpointPolicy::MaxWalSize(3 * segments as u64 * WAL_SEGMENT_MB)
    }

    /// Configuration parameter name.
    pub fn key(&self) -> &'static str {
        match self {
            CheckpointPolicy::LegacySegments(_) => "checkpoint_segments",
            CheckpointPolicy::MaxWalSize(_) => "max_wal_size",
        }
    }
}

impl std::fmt::Display for CheckpointPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointPolicy::LegacySegments(n) => write!(f, "checkpoint_segments = {}", n),
            CheckpointPolicy::MaxWalSize(mb) => write!(f, "max_wal_size = {}MB", mb),
        }
    }
}

impl Serialize for CheckpointPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single value in the result mapping.
#[derive(Clone, Debug, PartialEq)]
pub enum SettingValue {
    Integer(u64),
    /// Size in MB.
    Megabytes(u64),
    Real(f64),
    Text(String),
    Checkpoint(CheckpointPolicy),
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingValue::Integer(v) => write!(f, "{}", v),
            SettingValue::Megabytes(v) => write!(f, "{}MB", v),
            SettingValue::Real(v) => write!(f, "{}", v),
            SettingValue::Text(v) => f.write_str(v),
            SettingValue::Checkpoint(policy) => write!(f, "{}", policy),
        }
    }
}

/// Every tuning value derived from one profile. All sizes are in MB.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TuningResult {
    /// Total memory.
    pub memory: u64,
    pub max_connections: u64,
    pub shared_buffers: u64,
    pub effective_cache_size: u64,
    pub work_memory: u64,
    pub maintenance_work_memory: u64,
    pub checkpoint_segments_or_max_wal_size: CheckpointPolicy,
    pub checkpoint_completion_target: String,
    pub default_statistics_target: u32,
    pub random_page_cost: f64,
    pub synchronous_commit: String,
    pub data_directory: String,
    pub wal_keep_segments: u64,
}

impl TuningResult {
    /// Key names, in output order.
    pub const KEYS: [&'static str; 13] = [
        "memory",
        "max_connections",
        "shared_buffers",
        "effective_cache_size",
        "work_memory",
        "maintenance_work_memory",
        "checkpoint_segments_or_max_wal_size",
        "checkpoint_completion_target",
        "default_statistics_target",
        "random_page_cost",
        "synchronous_commit",
        "data_directory",
        "wal_keep_segments",
    ];

    /// All thirteen `(key, value)` pairs in [`TuningResult::KEYS`] order.
    pub fn entries(&self) -> Vec<(&'static str, SettingValue)> {
        use SettingValue::*;

        let values = [
            Megabytes(self.memory),
            Integer(self.max_connections),
            Megabytes(self.shared_buffers),
            Megabytes(self.effective_cache_size),
            Megabytes(self.work_memory),
            Megabytes(self.maintenance_work_memory),
            Checkpoint(self.checkpoint_segments_or_max_wal_size),
            Text(self.checkpoint_completion_target.clone()),
            Integer(self.default_statistics_target as u64),
            Real(self.random_page_cost),
            Text(self.synchronous_commit.clone()),
            Text(self.data_directory.clone()),
            Integer(self.wal_keep_segments),
        ];

        Self::KEYS.into_iter().zip(values).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TuningResult {
        TuningResult {
            memory: 1024,
            max_connections: 80,
            shared_buffers: 256,
            effective_cache_size: 768,
            work_memory: 10,
            maintenance_work_memory: 64,
            checkpoint_segments_or_max_wal_size: CheckpointPolicy::max_wal_size_for(16),
            checkpoint_completion_target: "0.9".to_string(),
            default_statistics_target: 100,
            random_page_cost: 3.0,
            synchronous_commit: "on".to_string(),
            data_directory: "/var/lib/postgresql/10/main".to_string(),
            wal_keep_segments: 320,
        }
    }

    #[test]
    fn test_checkpoint_policy_rendering() {
        assert_eq!(
            CheckpointPolicy::max_wal_size_for(16).to_string(),
            "max_wal_size = 768MB"
        );
        assert_eq!(
            CheckpointPolicy::max_wal_size_for(64),
            CheckpointPolicy::MaxWalSize(3072)
        );
        assert_eq!(
            CheckpointPolicy::LegacySegments(8).to_string(),
            "checkpoint_segments = 8"
        );
        assert_eq!(CheckpointPolicy::LegacySegments(8).key(), "checkpoint_segments");
        assert_eq!(CheckpointPolicy::MaxWalSize(384).key(), "max_wal_size");
    }

    #[test]
    fn test_entries_cover_every_key() {
        let entries = sample().entries();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, TuningResult::KEYS.to_vec());

        assert_eq!(entries[1].1, SettingValue::Integer(80));
        assert_eq!(entries[2].1, SettingValue::Megabytes(256));
        assert_eq!(
            entries[6].1,
            SettingValue::Checkpoint(CheckpointPolicy::MaxWalSize(768))
        );
        assert_eq!(entries[6].1.to_string(), "max_wal_size = 768MB");
        assert_eq!(entries[9].1, SettingValue::Real(3.0));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_serialized_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 13);
        for key in TuningResult::KEYS {
            assert!(object.contains_key(key), "missing key {}", key);
        }
        assert_eq!(
            object["checkpoint_segments_or_max_wal_size"],
            serde_json::json!("max_wal_size = 768MB")
        );
    }
}
