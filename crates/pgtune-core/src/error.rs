//! Error type shared by profile validation and the calculator.

/// Errors raised while validating a profile or computing tuning values.
///
/// Every variant is fatal: no partial result is ever returned.
#[derive(Debug, Clone, PartialEq)]
pub enum TuneError {
    /// Workload name is not one of `web`, `oltp`, `dw`, `mixed`, `desktop`.
    UnsupportedWorkload(String),
    /// Architecture is unknown and the calculator runs in strict mode.
    UnsupportedArchitecture(String),
    /// A required input is missing, negative or malformed.
    InvalidProfile {
        field: &'static str,
        reason: String,
    },
}

impl TuneError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        TuneError::InvalidProfile {
            field,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for TuneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TuneError::UnsupportedWorkload(name) => write!(
                f,
                "unsupported workload '{}' (expected one of: web, oltp, dw, mixed, desktop)",
                name
            ),
            TuneError::UnsupportedArchitecture(arch) => {
                write!(f, "unsupported architecture '{}'", arch)
            }
            TuneError::InvalidProfile { field, reason } => {
                write!(f, "invalid profile: {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for TuneError {}
