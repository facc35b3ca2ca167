//! pgtune-core — PostgreSQL tuning calculator.
//!
//! Provides:
//! - `workload` — workload categories and their per-workload tuning policy
//! - `profile` — host description consumed by the calculator, plus input validation
//! - `calculator` — derivation of every tuning value from a profile
//! - `rounding` — binary rounding of raw megabyte quantities
//! - `result` — the computed settings mapping
//! - `render` — `postgresql.conf` fragment rendering
//! - `fmt` — shared formatting helpers (megabytes)
//! - `host` — host attribute probing (`/proc/meminfo`, CPU word width)
//!
//! The calculator performs no I/O. Host probing and rendering are separate
//! steps driven by the caller.

pub mod calculator;
pub mod error;
pub mod fmt;
pub mod host;
pub mod profile;
pub mod render;
pub mod result;
pub mod rounding;
pub mod workload;

pub use calculator::{TuningCalculator, compute};
pub use error::TuneError;
pub use profile::{
    Architecture, EngineVersion, ProfileInput, ServerSettings, SynchronousCommit, SystemProfile,
};
pub use result::{CheckpointPolicy, SettingValue, TuningResult};
pub use rounding::binary_round;
pub use workload::{Workload, WorkloadPolicy};
