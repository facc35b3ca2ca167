//! pgtune - PostgreSQL configuration calculator.
//!
//! Builds a host profile from flags, environment variables, an optional JSON
//! profile file and optional host probing, then prints recommended
//! `postgresql.conf` settings.
//!
//! Usage:
//!   pgtune -w oltp -m 16G -f 200G -e 16 -D /var/lib/postgresql/16/main
//!   pgtune --probe -w web -f 50G -e 9.4 -D /srv/pg
//!   pgtune --profile host.json --format json
//!   pgtune --profile host.json -o /etc/postgresql/16/main/conf.d/tuning.conf

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use clap::{Parser, ValueEnum};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

use pgtune_core::fmt::format_kilobytes;
use pgtune_core::host::{HostProbe, RealFs};
use pgtune_core::render::{render_conf, render_json};
use pgtune_core::{ProfileInput, SystemProfile, TuningCalculator, TuningResult};

/// Output format for the computed settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// `postgresql.conf` fragment.
    Conf,
    /// JSON mapping of all computed values.
    Json,
}

/// PostgreSQL configuration calculator.
#[derive(Parser, Debug)]
#[command(name = "pgtune", about = "PostgreSQL configuration calculator", version)]
struct Args {
    /// Workload: web, oltp, dw, mixed or desktop.
    #[arg(short, long, env = "PGTUNE_WORKLOAD")]
    workload: Option<String>,

    /// Total host memory (e.g., "16G", "512M", "1048576K"; plain numbers are kB).
    #[arg(short, long, env = "PGTUNE_MEMORY", value_parser = parse_size_kb)]
    memory: Option<u64>,

    /// CPU architecture: "32-bit", "64-bit", or a kernel machine name (x86_64, i386).
    #[arg(short, long, env = "PGTUNE_ARCH")]
    arch: Option<String>,

    /// Free space on the WAL volume (same units as --memory).
    #[arg(short, long, env = "PGTUNE_FREE_LOG_SPACE", value_parser = parse_size_kb)]
    free_log_space: Option<u64>,

    /// Target PostgreSQL version (e.g., "9.4", "16").
    #[arg(short, long, env = "PGTUNE_ENGINE_VERSION")]
    engine_version: Option<String>,

    /// Planner cost of a non-sequential page fetch. Default: 3.0.
    #[arg(long, env = "PGTUNE_RANDOM_PAGE_COST")]
    random_page_cost: Option<f64>,

    /// Commit durability: on, off, local, remote_write, remote_apply. Default: on.
    #[arg(long, env = "PGTUNE_SYNCHRONOUS_COMMIT")]
    synchronous_commit: Option<String>,

    /// Server data directory, written verbatim.
    #[arg(short = 'D', long, env = "PGTUNE_DATA_DIRECTORY")]
    data_directory: Option<String>,

    /// JSON profile file. Flags override its values.
    #[arg(long, value_name = "FILE")]
    profile: Option<PathBuf>,

    /// Read memory and architecture from this host. Free space on the WAL
    /// volume is not read; -f or PGTUNE_FREE_LOG_SPACE is still required.
    #[arg(long)]
    probe: bool,

    /// Path to /proc filesystem (for --probe).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Reject architectures other than 32-bit and 64-bit.
    #[arg(long)]
    strict_arch: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Conf)]
    format: OutputFormat,

    /// Write output to FILE instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Parses a human-readable size string (e.g., "16G", "512M", "1024K") into kB.
fn parse_size_kb(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    let (num_str, multiplier) = if let Some(num) = s.strip_suffix('T') {
        (num, 1024 * 1024 * 1024)
    } else if let Some(num) = s.strip_suffix('G') {
        (num, 1024 * 1024)
    } else if let Some(num) = s.strip_suffix('M') {
        (num, 1024)
    } else if let Some(num) = s.strip_suffix('K') {
        (num, 1)
    } else {
        (s, 1)
    };

    num_str
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid size '{}': {}", s, e))?
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size '{}' is too large", s))
}

/// Initializes the tracing subscriber on stderr.
/// Default level is WARN. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["pgtune", "pgtune_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn kb_to_i64(field: &str, kb: u64) -> Result<i64, String> {
    i64::try_from(kb).map_err(|_| format!("{} is out of range", field))
}

/// Profile values given on the command line or via environment.
fn flags_input(args: &Args) -> Result<ProfileInput, String> {
    Ok(ProfileInput {
        memory_kb: args
            .memory
            .map(|kb| kb_to_i64("--memory", kb))
            .transpose()?,
        architecture: args.arch.clone(),
        free_log_volume_kb: args
            .free_log_space
            .map(|kb| kb_to_i64("--free-log-space", kb))
            .transpose()?,
        engine_version: args.engine_version.as_deref().map(Into::into),
        workload: args.workload.clone(),
        random_page_cost: args.random_page_cost,
        synchronous_commit: args.synchronous_commit.clone(),
        data_directory: args.data_directory.clone(),
    })
}

fn load_profile_file(path: &Path) -> Result<ProfileInput, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read profile '{}': {}", path.display(), e))?;
    ProfileInput::from_json(&content).map_err(|e| format!("{} ({})", e, path.display()))
}

/// Layers profile sources: file, then host probe, then flags.
fn build_profile(args: &Args) -> Result<SystemProfile, String> {
    let mut input = ProfileInput::default();

    if let Some(ref path) = args.profile {
        debug!("Loading profile from {}", path.display());
        input = input.merge(load_profile_file(path)?);
    }

    if args.probe {
        let probe = HostProbe::new(RealFs::new(), &args.proc_path);
        input = input.merge(probe.probe().map_err(|e| e.to_string())?);
    }

    input = input.merge(flags_input(args)?);
    input.validate().map_err(|e| e.to_string())
}

fn conf_header(profile: &SystemProfile) -> Vec<String> {
    vec![
        format!(
            "Generated by pgtune {} at {}",
            env!("CARGO_PKG_VERSION"),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        format!(
            "workload={} memory={} arch={} engine={} free_log_space={}",
            profile.workload,
            format_kilobytes(profile.memory_kb),
            profile.architecture,
            profile.engine_version,
            format_kilobytes(profile.free_log_volume_kb)
        ),
    ]
}

fn render(args: &Args, profile: &SystemProfile, result: &TuningResult) -> Result<String, String> {
    match args.format {
        OutputFormat::Conf => Ok(render_conf(result, &conf_header(profile))),
        OutputFormat::Json => render_json(result)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| format!("cannot encode JSON: {}", e)),
    }
}

fn run(args: &Args) -> Result<(), String> {
    let profile = build_profile(args)?;
    info!(
        "Profile: workload={} memory={} arch={} engine={}",
        profile.workload,
        format_kilobytes(profile.memory_kb),
        profile.architecture,
        profile.engine_version
    );

    let calculator = if args.strict_arch {
        TuningCalculator::strict()
    } else {
        TuningCalculator::new()
    };
    let result = calculator.compute(&profile).map_err(|e| e.to_string())?;
    let text = render(args, &profile, &result)?;

    match args.output {
        Some(ref path) => {
            std::fs::write(path, text)
                .map_err(|e| format!("cannot write '{}': {}", path.display(), e))?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
