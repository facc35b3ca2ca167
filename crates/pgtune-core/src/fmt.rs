//! Shared formatting helpers.

/// Controls configuration-file vs human-readable output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FmtStyle {
    /// Configuration value: always whole megabytes (`"256MB"`).
    Compact,
    /// Human-readable: `"256 MiB"`, `"1.5 GiB"`.
    Detail,
}

/// Format a megabyte count.
///
/// Compact: `"256MB"`, `"16384MB"`
/// Detail:  `"256 MiB"`, `"16.0 GiB"`, `"1.2 TiB"`
pub fn format_megabytes(mb: u64, style: FmtStyle) -> String {
    match style {
        FmtStyle::Compact => format!("{}MB", mb),
        FmtStyle::Detail => {
            let f = mb as f64;
            if mb >= 1024 * 1024 {
                format!("{:.1} TiB", f / (1024.0 * 1024.0))
            } else if mb >= 1024 {
                format!("{:.1} GiB", f / 1024.0)
            } else {
                format!("{} MiB", mb)
            }
        }
    }
}

/// Format a kilobyte count as human-readable size.
pub fn format_kilobytes(kb: u64) -> String {
    if kb >= 1024 {
        format_megabytes(kb / 1024, FmtStyle::Detail)
    } else {
        format!("{} KiB", kb)
    }
}
