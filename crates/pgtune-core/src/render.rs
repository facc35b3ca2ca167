//! Configuration rendering.
//!
//! Turns a [`TuningResult`] into `postgresql.conf` lines using the engine's
//! parameter names. Rendering is pure; writing the text is up to the caller.

use crate::fmt::{FmtStyle, format_megabytes};
use crate::result::{CheckpointPolicy, SettingValue, TuningResult};

/// Engine parameter name for a result key, `None` for keys that are not
/// settings.
fn conf_parameter(key: &'static str) -> Option<&'static str> {
    match key {
        "memory" => None,
        "work_memory" => Some("work_mem"),
        "maintenance_work_memory" => Some("maintenance_work_mem"),
        other => Some(other),
    }
}

/// Returns `(parameter, value)` pairs as they appear in `postgresql.conf`,
/// in result key order.
pub fn conf_settings(result: &TuningResult) -> Vec<(&'static str, String)> {
    result
        .entries()
        .into_iter()
        .filter_map(|(key, value)| {
            let name = conf_parameter(key)?;
            Some(match value {
                SettingValue::Checkpoint(policy) => {
                    let value = match policy {
                        CheckpointPolicy::LegacySegments(n) => n.to_string(),
                        CheckpointPolicy::MaxWalSize(mb) => {
                            format_megabytes(mb, FmtStyle::Compact)
                        }
                    };
                    (policy.key(), value)
                }
                SettingValue::Megabytes(mb) => (name, format_megabytes(mb, FmtStyle::Compact)),
                SettingValue::Integer(v) => (name, v.to_string()),
                SettingValue::Real(v) => (name, format_real(v)),
                SettingValue::Text(v) if name == "data_directory" => (name, quote(&v)),
                SettingValue::Text(v) => (name, v),
            })
        })
        .collect()
}

/// Renders a `postgresql.conf` fragment.
///
/// Each line of `header` becomes a `# ` comment at the top.
pub fn render_conf(result: &TuningResult, header: &[String]) -> String {
    let mut out = String::new();
    for line in header {
        out.push_str("# ");
        out.push_str(line);
        out.push('\n');
    }
    if !header.is_empty() {
        out.push('\n');
    }

    let settings = conf_settings(result);
    let width = settings.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in settings {
        out.push_str(&format!("{:width$} = {}\n", key, value, width = width));
    }
    out
}

/// Renders the result mapping as pretty-printed JSON.
#[cfg(feature = "json")]
pub fn render_json(result: &TuningResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

/// Single-quoted configuration string, with embedded quotes doubled.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Reals keep a decimal point so the engine never reads them as integers.
fn format_real(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}
